//! Re-openable line sources.
//!
//! Every extraction rescans its log from the first line, so a source must be
//! able to hand out a fresh reader any number of times.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use log::error;

use crate::error_handling::types::ParseError;

pub trait LineSource {
    /// A reader positioned at the first line of the log.
    fn open(&self) -> Result<Box<dyn BufRead + '_>, ParseError>;

    /// Name used in reports and log messages.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for FileSource {
    fn open(&self) -> Result<Box<dyn BufRead + '_>, ParseError> {
        let file = File::open(&self.path).map_err(|e| {
            error!("Failed to open {}: {}", self.path.display(), e);
            ParseError::Io(e)
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A log held in memory.
#[derive(Debug, Clone)]
pub struct TextSource {
    text: String,
}

impl TextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl LineSource for TextSource {
    fn open(&self) -> Result<Box<dyn BufRead + '_>, ParseError> {
        Ok(Box::new(Cursor::new(self.text.as_bytes())))
    }

    fn describe(&self) -> String {
        format!("<memory, {} bytes>", self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(source: &dyn LineSource) -> Vec<String> {
        source.open().unwrap().lines().map(|l| l.unwrap()).collect()
    }

    #[test]
    fn sources_can_be_reopened() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\nb\n").unwrap();
        let source = FileSource::new(file.path());
        assert_eq!(read_all(&source), vec!["a", "b"]);
        assert_eq!(read_all(&source), vec!["a", "b"]);

        let text = TextSource::new("x\ny");
        assert_eq!(read_all(&text), vec!["x", "y"]);
        assert_eq!(read_all(&text), vec!["x", "y"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let source = FileSource::new("/nonexistent/siftr.log");
        assert!(matches!(source.open(), Err(ParseError::Io(_))));
        assert_eq!(source.describe(), "/nonexistent/siftr.log");
    }
}
