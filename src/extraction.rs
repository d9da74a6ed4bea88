//! Per-flow stream extraction.
//!
//! - `types`: series kinds, options, the pass summary and its outcome.
//! - `extractor`: the forward pass itself.

pub mod extractor;
pub mod types;

pub use extractor::FlowExtractor;
pub use types::{
    DecodePolicy, ExtractionOptions, ExtractionOutcome, ExtractionSummary, SeriesKind,
};
