//! Stateful per-flow signals derived during an extraction pass.
//!
//! - `duplicate_detector`: repeated data segments per direction.
//! - `recovery_segmenter`: congestion-recovery episode boundaries.

pub mod duplicate_detector;
pub mod recovery_segmenter;

pub use duplicate_detector::{DuplicateDetector, PacketKey, DEFAULT_DUPLICATE_WINDOW};
pub use recovery_segmenter::{RecoverySegmenter, RecoveryState, SegmenterEvent};
