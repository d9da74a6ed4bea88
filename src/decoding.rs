//! Body record decoding.

pub mod field_decoder;
pub mod types;

pub use field_decoder::FieldDecoder;
pub use types::{BodyRecord, CongestionFields, Direction, SackBlock, SackFields, SackSpace};
