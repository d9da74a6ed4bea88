//! Typed view of one body record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the observed segment relative to the logging host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Segment received by the host.
    In,
    /// Segment sent by the host.
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "i",
            Direction::Out => "o",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SACK block, `[start, end)` in sequence space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SackBlock {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for SackBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.start, self.end)
    }
}

/// Reported block count plus the reserved slots of one SACK space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SackSpace {
    pub count: u32,
    pub blocks: [SackBlock; 3],
}

/// SACK state of the sender (`tp`) and of the received options (`to`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SackFields {
    pub tp: SackSpace,
    pub to: SackSpace,
}

/// Fields added by siftr 2.x.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionFields {
    pub snd_nxt: u32,
    pub snd_una: u32,
    pub pipe: i64,
    pub snd_cnt: i64,
    pub fun_name: String,
    pub line: u32,
    pub dupacks: u32,
    pub delivered_data: u64,
    pub sack_bytes_rexmit: u64,
    pub sacked_bytes: u64,
    pub lost_bytes: u64,
    pub recover_fs: u64,
}

/// One decoded body line. Built per line and dropped after use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    pub direction: Direction,
    /// Absolute time in seconds.
    pub timestamp: f64,
    pub flow_id: u32,
    pub cwnd: u64,
    pub ssthresh: u64,
    pub sndwin: u64,
    pub rcvwin: u64,
    pub t_flags: u32,
    pub t_flags2: u32,
    pub state: u32,
    pub srtt: u64,
    pub rto: u64,
    pub snd_buf_hiwat: u64,
    pub snd_buf_cc: u64,
    pub rcv_buf_hiwat: u64,
    pub rcv_buf_cc: u64,
    pub inflight_bytes: u64,
    pub reass_qlen: u64,
    pub th_seq: u32,
    pub th_ack: u32,
    pub data_sz: u32,
    pub congestion: Option<CongestionFields>,
    pub sack: Option<SackFields>,
}
