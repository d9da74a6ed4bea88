use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analysis::DEFAULT_DUPLICATE_WINDOW;
use crate::extraction::{DecodePolicy, SeriesKind};
use crate::schema::SchemaVersion;

/// Runtime parameters of a review run.
///
/// Every field has a default, so a configuration file only needs to list
/// what it changes:
///
/// ```toml
/// output_dir = "plots"
/// series = ["cwnd", "recovery"]
/// stop_at_episode_end = true
/// decode_policy = "skip"
/// schema = "siftr2"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory receiving the series files. `None` falls back to
    /// `SIFTR_REVIEW_OUTPUT_DIR`, then to the current directory.
    pub output_dir: Option<PathBuf>,
    pub series: Vec<SeriesKind>,
    /// Data segments remembered per direction for duplicate detection.
    pub duplicate_window: usize,
    pub stop_at_episode_end: bool,
    pub decode_policy: DecodePolicy,
    /// Pins the log layout instead of deriving it from `siftrver`.
    pub schema: Option<SchemaVersion>,
    /// Also write `summary_<flowid>.json` per extracted flow.
    pub write_summary: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            series: vec![SeriesKind::Cwnd, SeriesKind::Packet],
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            stop_at_episode_end: false,
            decode_policy: DecodePolicy::Abort,
            schema: None,
            write_summary: false,
        }
    }
}
