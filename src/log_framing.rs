//! Header / body / footer framing of a siftr log.

pub mod framer;
pub mod types;

pub use framer::{body_lines, LogFramer};
pub use types::{FramedLine, LineType};
