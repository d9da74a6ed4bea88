use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

use crate::decoding::Direction;

/// Static attributes of a flow as listed in the footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowAttributes {
    pub local: SocketAddr,
    pub foreign: SocketAddr,
    pub mss: u32,
    pub sack_capable: bool,
    pub snd_scale: u8,
    pub rcv_scale: u8,
}

/// One known flow.
///
/// `attributes` is `None` when the flow was inferred from body records, since
/// those carry no address information. `dir_in`/`dir_out` are only touched by
/// an extraction pass, never by the registry build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowDescriptor {
    pub flow_id: u32,
    pub attributes: Option<FlowAttributes>,
    pub record_count: u64,
    pub dir_in: u64,
    pub dir_out: u64,
}

impl FlowDescriptor {
    pub fn new(flow_id: u32, attributes: Option<FlowAttributes>, record_count: u64) -> Self {
        Self {
            flow_id,
            attributes,
            record_count,
            dir_in: 0,
            dir_out: 0,
        }
    }

    pub fn mss(&self) -> Option<u32> {
        self.attributes.as_ref().map(|a| a.mss)
    }

    pub fn count_direction(&mut self, direction: Direction) {
        match direction {
            Direction::In => self.dir_in += 1,
            Direction::Out => self.dir_out += 1,
        }
    }

    /// `local<->foreign` endpoint pair, or a placeholder for inferred flows.
    pub fn endpoints(&self) -> String {
        match &self.attributes {
            Some(a) => format!("{}<->{}", a.local, a.foreign),
            None => "unknown endpoints".to_string(),
        }
    }
}

impl fmt::Display for FlowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attributes {
            Some(a) => write!(
                f,
                "id:{:>10} ({}) mss:{} SACK:{} snd/rcv_scal:{}/{} cnt:{}",
                self.flow_id,
                self.endpoints(),
                a.mss,
                u8::from(a.sack_capable),
                a.snd_scale,
                a.rcv_scale,
                self.record_count
            ),
            None => write!(f, "id:{:>10} (inferred) cnt:{}", self.flow_id, self.record_count),
        }
    }
}
