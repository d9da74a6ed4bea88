use serde::{Deserialize, Serialize};

/// Position of a line within the framing of a siftr log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineType {
    /// First line: session metadata.
    Header,
    /// One observed TCP segment.
    Body,
    /// Last line: counters and the flow registry.
    Footer,
}

/// A raw line tagged with its framing role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedLine {
    pub kind: LineType,
    /// 1-based line number in the source.
    pub line_number: usize,
    pub raw: String,
}

impl FramedLine {
    pub fn new(kind: LineType, line_number: usize, raw: String) -> Self {
        Self {
            kind,
            line_number,
            raw,
        }
    }
}
