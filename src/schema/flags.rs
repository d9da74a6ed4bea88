//! Symbolic names for the two TCP control-block flag words siftr records.

use serde::{Deserialize, Serialize};

/// Label emitted for an all-zero flag word.
pub const NONE_LABEL: &str = "none";

pub const FASTRECOVERY: u32 = 0x0010_0000;
pub const WASFRECOVERY: u32 = 0x0020_0000;
pub const CONGRECOVERY: u32 = 0x2000_0000;
pub const WASCRECOVERY: u32 = 0x4000_0000;

/// Bits of `t_flags` meaning "in or was in fast/congestion recovery".
pub const RECOVERY_MASK: u32 = FASTRECOVERY | CONGRECOVERY | WASFRECOVERY | WASCRECOVERY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagSpace {
    /// `tp->t_flags`
    Primary,
    /// `tp->t_flags2`
    Extended,
}

const PRIMARY_FLAGS: [(u32, &str); 32] = [
    (0x0000_0001, "ACKNOW"),
    (0x0000_0002, "DELACK"),
    (0x0000_0004, "NODELAY"),
    (0x0000_0008, "NOOPT"),
    (0x0000_0010, "SENTFIN"),
    (0x0000_0020, "REQ_SCALE"),
    (0x0000_0040, "RCVD_SCALE"),
    (0x0000_0080, "REQ_TSTMP"),
    (0x0000_0100, "RCVD_TSTMP"),
    (0x0000_0200, "SACK_PERMIT"),
    (0x0000_0400, "NEEDSYN"),
    (0x0000_0800, "NEEDFIN"),
    (0x0000_1000, "NOPUSH"),
    (0x0000_2000, "PREVVALID"),
    (0x0000_4000, "WAKESOR"),
    (0x0000_8000, "GPUTINPROG"),
    (0x0001_0000, "MORETOCOME"),
    (0x0002_0000, "SONOTCONN"),
    (0x0004_0000, "LASTIDLE"),
    (0x0008_0000, "RXWIN0SENT"),
    (FASTRECOVERY, "FASTRECOVERY"),
    (WASFRECOVERY, "WASFRECOVERY"),
    (0x0040_0000, "SIGNATURE"),
    (0x0080_0000, "FORCEDATA"),
    (0x0100_0000, "TSO"),
    (0x0200_0000, "TOE"),
    (0x0400_0000, "CLOSED"),
    (0x0800_0000, "SENTSYN"),
    (0x1000_0000, "LRD"),
    (CONGRECOVERY, "CONGRECOVERY"),
    (WASCRECOVERY, "WASCRECOVERY"),
    (0x8000_0000, "FASTOPEN"),
];

const EXTENDED_FLAGS: [(u32, &str); 23] = [
    (0x0000_0001, "TF2_PLPMTU_BLACKHOLE"),
    (0x0000_0002, "TF2_PLPMTU_PMTUD"),
    (0x0000_0004, "TF2_PLPMTU_MAXSEGSNT"),
    (0x0000_0008, "TF2_LOG_AUTO"),
    (0x0000_0010, "TF2_DROP_AF_DATA"),
    (0x0000_0020, "TF2_ECN_PERMIT"),
    (0x0000_0040, "TF2_ECN_SND_CWR"),
    (0x0000_0080, "TF2_ECN_SND_ECE"),
    (0x0000_0100, "TF2_ACE_PERMIT"),
    (0x0000_0200, "TF2_HPTS_CPU_SET"),
    (0x0000_0400, "TF2_FBYTES_COMPLETE"),
    (0x0000_0800, "TF2_ECN_USE_ECT1"),
    (0x0000_1000, "TF2_TCP_ACCOUNTING"),
    (0x0000_2000, "TF2_HPTS_CALLS"),
    (0x0000_4000, "TF2_MBUF_L_ACKS"),
    (0x0000_8000, "TF2_MBUF_ACKCMP"),
    (0x0001_0000, "TF2_SUPPORTS_MBUFQ"),
    (0x0002_0000, "TF2_MBUF_QUEUE_READY"),
    (0x0004_0000, "TF2_DONT_SACK_QUEUE"),
    (0x0008_0000, "TF2_CANNOT_DO_ECN"),
    (0x0010_0000, "TF2_PROC_SACK_PROHIBIT"),
    (0x0020_0000, "TF2_IPSEC_TSO"),
    (0x0040_0000, "TF2_NO_ISS_CHECK"),
];

impl FlagSpace {
    fn table(&self) -> &'static [(u32, &'static str)] {
        match self {
            FlagSpace::Primary => &PRIMARY_FLAGS,
            FlagSpace::Extended => &EXTENDED_FLAGS,
        }
    }
}

/// Names of the bits set in `mask`, lowest bit first.
///
/// Bits outside the named range of `space` produce no label. A mask with no
/// named bit set, zero included, yields exactly one [`NONE_LABEL`], so a
/// rendered column is never empty.
pub fn decode_flags(mask: u32, space: FlagSpace) -> Vec<&'static str> {
    let labels: Vec<&'static str> = space
        .table()
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if labels.is_empty() {
        return vec![NONE_LABEL];
    }
    labels
}

/// Renders labels the way the plot files expect them.
pub fn join_flags(labels: &[&str]) -> String {
    labels.join(" | ")
}

/// The subset of `t_flags` that marks current or recent recovery.
pub fn recovery_flags(t_flags: u32) -> u32 {
    t_flags & RECOVERY_MASK
}
