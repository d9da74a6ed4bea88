//! Review orchestration.
//!
//! - `line_source`: re-openable readers over a log (file or memory).
//! - `siftr_log`: first pass, file basics report and per-flow rescans.
//! - `controller_handler`: the run loop behind the binary.

pub mod controller_handler;
pub mod line_source;
pub mod siftr_log;


pub use controller_handler::Controller;
pub use line_source::{FileSource, LineSource, TextSource};
pub use siftr_log::SiftrLog;
