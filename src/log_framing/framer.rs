//! One-line-lookahead classification of log lines.
//!
//! The footer is only recognisable as "the last line", so the framer holds
//! every line it reads until the next one arrives. A held line that gets a
//! successor is a body line; the line still held when the source runs dry is
//! the footer. Nothing beyond that single line is ever buffered, and the
//! source is read exactly once.

use std::io::{self, BufRead};

use log::trace;

use super::types::{FramedLine, LineType};
use crate::error_handling::types::ParseError;

/// Lazy, forward-only iterator of [`FramedLine`]s.
///
/// Yields the header first, then every body line, then the footer. An empty
/// source yields a single [`ParseError::EmptyLog`]; a read failure yields a
/// single [`ParseError::Io`]. Either ends the sequence.
pub struct LogFramer<I> {
    lines: I,
    line_number: usize,
    started: bool,
    finished: bool,
    pending: Option<(usize, String)>,
}

impl<R: BufRead> LogFramer<io::Lines<R>> {
    pub fn from_reader(reader: R) -> Self {
        LogFramer::new(reader.lines())
    }
}

impl<I> LogFramer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            line_number: 0,
            started: false,
            finished: false,
            pending: None,
        }
    }

    /// Next non-blank line with its 1-based number.
    fn next_line(&mut self) -> Option<io::Result<(usize, String)>> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            match line {
                Ok(raw) if raw.trim().is_empty() => {
                    trace!("skipping blank line {}", self.line_number);
                    continue;
                }
                Ok(raw) => return Some(Ok((self.line_number, raw))),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn fail(&mut self, err: ParseError) -> Option<Result<FramedLine, ParseError>> {
        self.finished = true;
        self.pending = None;
        Some(Err(err))
    }
}

impl<I> Iterator for LogFramer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<FramedLine, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            return match self.next_line() {
                None => self.fail(ParseError::EmptyLog),
                Some(Err(e)) => self.fail(ParseError::Io(e)),
                Some(Ok((n, raw))) => Some(Ok(FramedLine::new(LineType::Header, n, raw))),
            };
        }

        loop {
            match self.next_line() {
                Some(Ok(line)) => {
                    if let Some((n, raw)) = self.pending.replace(line) {
                        return Some(Ok(FramedLine::new(LineType::Body, n, raw)));
                    }
                }
                Some(Err(e)) => return self.fail(ParseError::Io(e)),
                None => {
                    self.finished = true;
                    return self
                        .pending
                        .take()
                        .map(|(n, raw)| Ok(FramedLine::new(LineType::Footer, n, raw)));
                }
            }
        }
    }
}

/// Keeps the body lines of a framed sequence, and any error.
pub fn body_lines<I>(framed: I) -> impl Iterator<Item = Result<FramedLine, ParseError>>
where
    I: Iterator<Item = Result<FramedLine, ParseError>>,
{
    framed.filter(|item| match item {
        Ok(line) => line.kind == LineType::Body,
        Err(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(text: &str) -> Vec<Result<FramedLine, ParseError>> {
        LogFramer::from_reader(Cursor::new(text.to_string())).collect()
    }

    fn kinds(text: &str) -> Vec<LineType> {
        frame(text)
            .into_iter()
            .map(|item| item.expect("framing ok").kind)
            .collect()
    }

    #[test]
    fn classifies_header_bodies_and_footer_in_order() {
        for body_count in 0..6 {
            let mut text = String::from("head\n");
            for i in 0..body_count {
                text.push_str(&format!("body{}\n", i));
            }
            text.push_str("foot\n");

            let items: Vec<FramedLine> = frame(&text).into_iter().map(|i| i.unwrap()).collect();
            assert_eq!(items.len(), body_count + 2);
            assert_eq!(items[0].kind, LineType::Header);
            assert_eq!(items[0].raw, "head");
            assert_eq!(items.last().unwrap().kind, LineType::Footer);
            assert_eq!(items.last().unwrap().raw, "foot");
            let bodies: Vec<&FramedLine> =
                items.iter().filter(|l| l.kind == LineType::Body).collect();
            assert_eq!(bodies.len(), body_count);
            for (i, body) in bodies.iter().enumerate() {
                assert_eq!(body.raw, format!("body{}", i));
                assert_eq!(body.line_number, i + 2);
            }
        }
    }

    #[test]
    fn header_and_footer_only_yields_no_body() {
        assert_eq!(kinds("head\nfoot"), vec![LineType::Header, LineType::Footer]);
    }

    #[test]
    fn empty_source_is_an_error() {
        let items = frame("");
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ParseError::EmptyLog)));
    }

    #[test]
    fn single_line_is_only_a_header() {
        assert_eq!(kinds("head\n"), vec![LineType::Header]);
    }

    #[test]
    fn blank_lines_are_never_classified() {
        assert_eq!(
            kinds("head\n\nbody\n   \nfoot\n\n"),
            vec![LineType::Header, LineType::Body, LineType::Footer]
        );
    }

    #[test]
    fn read_error_ends_the_sequence() {
        let lines = vec![
            Ok("head".to_string()),
            Ok("body".to_string()),
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad utf-8")),
            Ok("foot".to_string()),
        ];
        let items: Vec<_> = LogFramer::new(lines.into_iter()).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ParseError::Io(_))));
    }

    #[test]
    fn body_lines_drops_header_and_footer() {
        let raws: Vec<String> = body_lines(LogFramer::from_reader(Cursor::new("h\nb1\nb2\nf\n")))
            .map(|item| item.unwrap().raw)
            .collect();
        assert_eq!(raws, vec!["b1", "b2"]);
        let errors: Vec<_> = body_lines(LogFramer::from_reader(Cursor::new(""))).collect();
        assert!(matches!(errors[..], [Err(ParseError::EmptyLog)]));
    }

    #[test]
    fn framer_is_fused_after_footer() {
        let mut framer = LogFramer::from_reader(Cursor::new("head\nfoot\n"));
        assert!(framer.next().is_some());
        assert!(framer.next().is_some());
        assert!(framer.next().is_none());
        assert!(framer.next().is_none());
    }
}
