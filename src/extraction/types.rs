use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::analysis::DEFAULT_DUPLICATE_WINDOW;
use crate::error_handling::types::ConfigError;
use crate::schema::registry::field;

/// Output series an extraction pass can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// Congestion window and slow-start threshold over time.
    Cwnd,
    /// SACK blocks of both SACK spaces, only for records that carry some.
    Sack,
    /// Every segment with duplicate marking and decoded flags.
    Packet,
    /// Records inside congestion-recovery episodes.
    Recovery,
}

const CWND_COLUMNS: &[&str] = &["DIRECTION", "relative_timestamp", "CWND", "SSTHRESH"];

const SACK_COLUMNS: &[&str] = &[
    "DIRECTION",
    "relative_timestamp",
    "th_seq",
    "th_ack",
    "data_sz",
    "tp_nsacks",
    "tp_sackblks[0]",
    "tp_sackblks[1]",
    "tp_sackblks[2]",
    "to_nsacks",
    "to_sackblks[0]",
    "to_sackblks[1]",
    "to_sackblks[2]",
];

const PACKET_COLUMNS: &[&str] = &[
    "DIRECTION",
    "relative_timestamp",
    "th_seq",
    "th_ack",
    "data_sz",
    "is_duplicate",
    "t_flags",
    "t_flags2",
];

const RECOVERY_COLUMNS: &[&str] = &[
    "episode",
    "DIRECTION",
    "relative_timestamp",
    "CWND",
    "SSTHRESH",
    "recovery_flags",
    "dupacks",
    "inflight_bytes",
    "sacked_bytes",
    "lost_bytes",
    "recover_fs",
];

impl SeriesKind {
    pub const ALL: [SeriesKind; 4] = [
        SeriesKind::Cwnd,
        SeriesKind::Sack,
        SeriesKind::Packet,
        SeriesKind::Recovery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeriesKind::Cwnd => "cwnd",
            SeriesKind::Sack => "sack",
            SeriesKind::Packet => "packet",
            SeriesKind::Recovery => "recovery",
        }
    }

    /// `<kind>_<flowid>.txt`
    pub fn file_name(&self, flow_id: u32) -> String {
        format!("{}_{}.txt", self.name(), flow_id)
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SeriesKind::Cwnd => CWND_COLUMNS,
            SeriesKind::Sack => SACK_COLUMNS,
            SeriesKind::Packet => PACKET_COLUMNS,
            SeriesKind::Recovery => RECOVERY_COLUMNS,
        }
    }

    /// Body field the schema must carry for this series to be produced.
    pub fn required_field(&self) -> Option<&'static str> {
        match self {
            SeriesKind::Cwnd | SeriesKind::Packet => None,
            SeriesKind::Sack => Some(field::TP_NSACKS),
            SeriesKind::Recovery => Some(field::RECOVER_FS),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeriesKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeriesKind::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownSeries(s.to_string()))
    }
}

/// What to do with a body line that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Stop the pass with the decode error.
    #[default]
    Abort,
    /// Count the line as a warning and carry on.
    Skip,
}

/// Per-pass knobs of the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    pub series: Vec<SeriesKind>,
    pub duplicate_window: usize,
    pub stop_at_episode_end: bool,
    pub decode_policy: DecodePolicy,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            series: vec![SeriesKind::Cwnd, SeriesKind::Packet],
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            stop_at_episode_end: false,
            decode_policy: DecodePolicy::Abort,
        }
    }
}

/// Statistics gathered by one extraction pass over one flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub flow_id: u32,
    pub endpoints: String,
    /// Records of this flow seen by the pass.
    pub records: u64,
    pub dir_in: u64,
    pub dir_out: u64,
    /// Rows written per requested series.
    pub rows: BTreeMap<SeriesKind, u64>,
    pub duplicates_in: u64,
    pub duplicates_out: u64,
    pub max_tp_sacks: u32,
    pub max_to_sacks: u32,
    pub data_packets: u64,
    pub fragments: u64,
    pub fragmentation_ratio: Option<f64>,
    pub recovery_episodes: u32,
    /// Absolute timestamp of the first record of the flow.
    pub first_timestamp: Option<f64>,
    /// Relative timestamp of the last record of the flow.
    pub last_relative_timestamp: Option<f64>,
    pub skipped_lines: u64,
    pub warnings: u64,
    pub stopped_early: bool,
}

impl ExtractionSummary {
    pub fn duplicates(&self) -> u64 {
        self.duplicates_in + self.duplicates_out
    }
}

/// Result of asking for one flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Extracted(ExtractionSummary),
    /// The flow id is absent from the registry. Nothing was written.
    FlowNotFound(u32),
}
