//! Versioned field maps for siftr logs.
//!
//! Every schema revision is a fixed, ordered list of field names. Positions
//! are never hard-coded elsewhere in the crate: callers resolve a logical
//! name through [`index_of`] once and reuse the resulting index.
//!
//! The header record has the same layout in every revision. The footer and
//! body layouts differ per [`SchemaVersion`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::types::{FooterCounters, FooterInfo, HeaderInfo};
use crate::error_handling::types::{ConfigError, ParseError};

pub const BODY_DELIMITER: char = ',';
pub const RECORD_DELIMITER: char = '\t';
pub const KEY_VALUE_DELIMITER: char = '=';
pub const FLOW_ENTRY_DELIMITER: char = ';';
pub const FLOW_FIELD_DELIMITER: char = ',';

/// Logical field names shared by the schema tables and their consumers.
pub mod field {
    pub const DIRECTION: &str = "direction";
    pub const TIMESTAMP: &str = "timestamp";
    pub const FLOW_ID: &str = "flowid";
    pub const CWND: &str = "cwnd";
    pub const SSTHRESH: &str = "ssthresh";
    pub const SNDWIN: &str = "sndwin";
    pub const RCVWIN: &str = "rcvwin";
    pub const FLAG: &str = "flag";
    pub const FLAG2: &str = "flag2";
    pub const STATE: &str = "state";
    pub const SRTT: &str = "srtt";
    pub const RTO: &str = "rto";
    pub const SND_BUF_HIWAT: &str = "snd_buf_hiwat";
    pub const SND_BUF_CC: &str = "snd_buf_cc";
    pub const RCV_BUF_HIWAT: &str = "rcv_buf_hiwat";
    pub const RCV_BUF_CC: &str = "rcv_buf_cc";
    pub const INFLIGHT_BYTES: &str = "inflight_bytes";
    pub const REASS_QLEN: &str = "reass_qlen";
    pub const TH_SEQ: &str = "th_seq";
    pub const TH_ACK: &str = "th_ack";
    pub const TCP_DATA_SZ: &str = "tcp_data_sz";
    pub const SND_NXT: &str = "snd_nxt";
    pub const SND_UNA: &str = "snd_una";
    pub const PIPE: &str = "pipe";
    pub const SND_CNT: &str = "snd_cnt";
    pub const FUN_NAME: &str = "fun_name";
    pub const LINE: &str = "line";
    pub const DUPACKS: &str = "dupacks";
    pub const DELIVERED_DATA: &str = "delivered_data";
    pub const SACK_BYTES_REXMIT: &str = "sack_bytes_rexmit";
    pub const SACKED_BYTES: &str = "sacked_bytes";
    pub const LOST_BYTES: &str = "lost_bytes";
    pub const RECOVER_FS: &str = "recover_fs";
    pub const TP_NSACKS: &str = "tp_nsacks";
    pub const TP_SACKBLKS: [[&str; 2]; 3] = [
        ["tp_sackblk0_start", "tp_sackblk0_end"],
        ["tp_sackblk1_start", "tp_sackblk1_end"],
        ["tp_sackblk2_start", "tp_sackblk2_end"],
    ];
    pub const TO_NSACKS: &str = "to_nsacks";
    pub const TO_SACKBLKS: [[&str; 2]; 3] = [
        ["to_sackblk0_start", "to_sackblk0_end"],
        ["to_sackblk1_start", "to_sackblk1_end"],
        ["to_sackblk2_start", "to_sackblk2_end"],
    ];

    pub const ENABLE_TIME_SECS: &str = "enable_time_secs";
    pub const ENABLE_TIME_USECS: &str = "enable_time_usecs";
    pub const SIFTRVER: &str = "siftrver";
    pub const SYSNAME: &str = "sysname";
    pub const SYSVER: &str = "sysver";
    pub const IPMODE: &str = "ipmode";

    pub const DISABLE_TIME_SECS: &str = "disable_time_secs";
    pub const DISABLE_TIME_USECS: &str = "disable_time_usecs";
    pub const GLOBAL_FLOW_CNT: &str = "global_flow_cnt";
    pub const FLOW_LIST: &str = "flow_list";
}

use field::*;

const HEADER_FIELDS: &[&str] = &[
    ENABLE_TIME_SECS,
    ENABLE_TIME_USECS,
    SIFTRVER,
    SYSNAME,
    SYSVER,
    IPMODE,
];

const SIFTR1_BODY_FIELDS: &[&str] = &[
    DIRECTION, TIMESTAMP, FLOW_ID, CWND, SSTHRESH,
    SNDWIN, RCVWIN, FLAG, FLAG2, STATE,
    SRTT, RTO, SND_BUF_HIWAT, SND_BUF_CC,
    RCV_BUF_HIWAT, RCV_BUF_CC, INFLIGHT_BYTES, REASS_QLEN,
    TH_SEQ, TH_ACK, TCP_DATA_SZ,
];

const SIFTR2_BODY_FIELDS: &[&str] = &[
    DIRECTION, TIMESTAMP, FLOW_ID, CWND, SSTHRESH,
    SNDWIN, RCVWIN, FLAG, FLAG2, STATE,
    SRTT, RTO, SND_BUF_HIWAT, SND_BUF_CC,
    RCV_BUF_HIWAT, RCV_BUF_CC, INFLIGHT_BYTES, REASS_QLEN,
    TH_SEQ, TH_ACK, TCP_DATA_SZ,
    SND_NXT, SND_UNA, PIPE, SND_CNT,
    FUN_NAME, LINE, DUPACKS,
    DELIVERED_DATA, SACK_BYTES_REXMIT, SACKED_BYTES,
    LOST_BYTES, RECOVER_FS,
];

const SIFTR2_SACK_BODY_FIELDS: &[&str] = &[
    DIRECTION, TIMESTAMP, FLOW_ID, CWND, SSTHRESH,
    SNDWIN, RCVWIN, FLAG, FLAG2, STATE,
    SRTT, RTO, SND_BUF_HIWAT, SND_BUF_CC,
    RCV_BUF_HIWAT, RCV_BUF_CC, INFLIGHT_BYTES, REASS_QLEN,
    TH_SEQ, TH_ACK, TCP_DATA_SZ,
    SND_NXT, SND_UNA, PIPE, SND_CNT,
    FUN_NAME, LINE, DUPACKS,
    DELIVERED_DATA, SACK_BYTES_REXMIT, SACKED_BYTES,
    LOST_BYTES, RECOVER_FS,
    TP_NSACKS,
    TP_SACKBLKS[0][0], TP_SACKBLKS[0][1],
    TP_SACKBLKS[1][0], TP_SACKBLKS[1][1],
    TP_SACKBLKS[2][0], TP_SACKBLKS[2][1],
    TO_NSACKS,
    TO_SACKBLKS[0][0], TO_SACKBLKS[0][1],
    TO_SACKBLKS[1][0], TO_SACKBLKS[1][1],
    TO_SACKBLKS[2][0], TO_SACKBLKS[2][1],
];

/// Counters-only footer of early siftr 1.x builds.
const COUNTERS_FOOTER_FIELDS: &[&str] = &[
    DISABLE_TIME_SECS,
    DISABLE_TIME_USECS,
    "num_inbound_tcp_pkts",
    "num_outbound_tcp_pkts",
    "total_tcp_pkts",
    "num_inbound_skipped_pkts_malloc",
    "num_outbound_skipped_pkts_malloc",
    "num_inbound_skipped_pkts_tcpcb",
    "num_outbound_skipped_pkts_tcpcb",
    "num_inbound_skipped_pkts_inpcb",
    "num_outbound_skipped_pkts_inpcb",
    "total_skipped_tcp_pkts",
];

const FLOW_LIST_FOOTER_FIELDS: &[&str] = &[
    DISABLE_TIME_SECS,
    DISABLE_TIME_USECS,
    GLOBAL_FLOW_CNT,
    "max_tmp_qsize",
    "avg_tmp_qsize",
    "max_str_size",
    "alq_getn_fail_cnt",
    FLOW_LIST,
];

/// Historical siftr log layouts this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    /// siftr 1.x: 21 body fields, footer carries the flow list.
    Siftr1,
    /// siftr 1.x body with a packet/skip counters footer and no flow list.
    /// Never derived from `siftrver`; only selected by pinning it.
    Siftr1Counters,
    /// siftr 2.0: 33 body fields, footer carries the flow list.
    Siftr2,
    /// Later siftr 2.x: siftr 2.0 plus both SACK spaces.
    Siftr2Sack,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 4] = [
        SchemaVersion::Siftr1,
        SchemaVersion::Siftr1Counters,
        SchemaVersion::Siftr2,
        SchemaVersion::Siftr2Sack,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SchemaVersion::Siftr1 => "siftr1",
            SchemaVersion::Siftr1Counters => "siftr1_counters",
            SchemaVersion::Siftr2 => "siftr2",
            SchemaVersion::Siftr2Sack => "siftr2_sack",
        }
    }

    /// Picks the layout from the header's `siftrver` value.
    pub fn from_siftr_version(version: &str) -> Result<Self, ParseError> {
        let version = version.trim();
        if version.starts_with("1.") {
            Ok(SchemaVersion::Siftr1)
        } else if version == "2.0" || version.starts_with("2.0.") {
            Ok(SchemaVersion::Siftr2)
        } else if version.starts_with("2.") {
            Ok(SchemaVersion::Siftr2Sack)
        } else {
            Err(ParseError::UnsupportedVersion(version.to_string()))
        }
    }

    pub fn body_fields(&self) -> &'static [&'static str] {
        match self {
            SchemaVersion::Siftr1 | SchemaVersion::Siftr1Counters => SIFTR1_BODY_FIELDS,
            SchemaVersion::Siftr2 => SIFTR2_BODY_FIELDS,
            SchemaVersion::Siftr2Sack => SIFTR2_SACK_BODY_FIELDS,
        }
    }

    pub fn footer_fields(&self) -> &'static [&'static str] {
        match self {
            SchemaVersion::Siftr1Counters => COUNTERS_FOOTER_FIELDS,
            SchemaVersion::Siftr1 | SchemaVersion::Siftr2 | SchemaVersion::Siftr2Sack => {
                FLOW_LIST_FOOTER_FIELDS
            }
        }
    }

    pub fn body_field_count(&self) -> usize {
        self.body_fields().len()
    }

    /// Whether the footer embeds a flow registry.
    pub fn has_flow_list(&self) -> bool {
        self.footer_fields().contains(&FLOW_LIST)
    }

    /// Number of SACK block slots reserved per SACK space.
    pub fn sack_block_slots(&self) -> usize {
        match self {
            SchemaVersion::Siftr2Sack => TP_SACKBLKS.len(),
            _ => 0,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.body_fields().contains(&name)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchemaVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemaVersion::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownSchema(s.to_string()))
    }
}

/// Position of `name` in the body layout of `schema`.
pub fn index_of(name: &'static str, schema: SchemaVersion) -> Result<usize, ParseError> {
    schema
        .body_fields()
        .iter()
        .position(|f| *f == name)
        .ok_or(ParseError::UnknownField {
            field: name,
            schema: schema.name(),
        })
}

/// Removes the trailing line terminator, if any.
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

/// Tab-separated tokens, skipping empty ones the way the kernel writer pads.
fn record_tokens(line: &str) -> Vec<&str> {
    strip_line_ending(line)
        .split(RECORD_DELIMITER)
        .filter(|t| !t.is_empty())
        .collect()
}

fn key_value<'a>(
    record: &'static str,
    expected: &'static str,
    token: &'a str,
) -> Result<&'a str, ParseError> {
    match token.split_once(KEY_VALUE_DELIMITER) {
        Some((key, value)) if key.trim() == expected => Ok(value.trim()),
        Some((key, _)) => Err(ParseError::UnexpectedKey {
            record,
            expected,
            found: key.trim().to_string(),
        }),
        None => Err(ParseError::UnexpectedKey {
            record,
            expected,
            found: String::new(),
        }),
    }
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
        line: None,
    })
}

fn instant_from(secs: i64, usecs: u32, field: &'static str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::from_timestamp(secs, usecs.saturating_mul(1_000)).ok_or_else(|| {
        ParseError::InvalidValue {
            field,
            value: format!("{}.{:06}", secs, usecs),
            line: None,
        }
    })
}

/// Decodes the first line of a log.
pub fn decode_header(raw: &str) -> Result<HeaderInfo, ParseError> {
    let tokens = record_tokens(raw);
    if tokens.len() != HEADER_FIELDS.len() {
        error!(
            "header has {} fields, expected {}",
            tokens.len(),
            HEADER_FIELDS.len()
        );
        return Err(ParseError::SchemaMismatch {
            record: "header",
            schema: "siftr",
            expected: HEADER_FIELDS.len(),
            actual: tokens.len(),
        });
    }

    let mut values = Vec::with_capacity(HEADER_FIELDS.len());
    for (&expected, token) in HEADER_FIELDS.iter().zip(tokens.iter()) {
        values.push(key_value("header", expected, token)?);
    }

    let secs: i64 = parse_number(ENABLE_TIME_SECS, values[0])?;
    let usecs: u32 = parse_number(ENABLE_TIME_USECS, values[1])?;
    let header = HeaderInfo {
        enable_time: instant_from(secs, usecs, ENABLE_TIME_SECS)?,
        siftr_version: values[2].to_string(),
        sysname: values[3].to_string(),
        sysver: values[4].to_string(),
        ipmode: values[5].to_string(),
    };
    debug!(
        "decoded header: siftrver={} sysname={} sysver={} ipmode={}",
        header.siftr_version, header.sysname, header.sysver, header.ipmode
    );
    Ok(header)
}

/// Decodes the last line of a log laid out per `schema`.
pub fn decode_footer(raw: &str, schema: SchemaVersion) -> Result<FooterInfo, ParseError> {
    let expected_fields = schema.footer_fields();
    let tokens = record_tokens(raw);
    if tokens.len() != expected_fields.len() {
        error!(
            "footer has {} fields, expected {} for {}",
            tokens.len(),
            expected_fields.len(),
            schema
        );
        return Err(ParseError::SchemaMismatch {
            record: "footer",
            schema: schema.name(),
            expected: expected_fields.len(),
            actual: tokens.len(),
        });
    }

    let mut disable_secs: i64 = 0;
    let mut disable_usecs: u32 = 0;
    let mut counters = FooterCounters::default();
    let mut flow_list = None;

    for (&expected, token) in expected_fields.iter().zip(tokens.iter()) {
        let value = key_value("footer", expected, token)?;
        match expected {
            DISABLE_TIME_SECS => disable_secs = parse_number(expected, value)?,
            DISABLE_TIME_USECS => disable_usecs = parse_number(expected, value)?,
            FLOW_LIST => flow_list = Some(value.to_string()),
            name => counters.push(name, parse_number(name, value)?),
        }
    }

    Ok(FooterInfo {
        disable_time: instant_from(disable_secs, disable_usecs, DISABLE_TIME_SECS)?,
        counters,
        flow_list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "enable_time_secs=1712000000\tenable_time_usecs=250000\tsiftrver=2.0\tsysname=FreeBSD\tsysver=1500000\tipmode=4\n";

    #[test]
    fn field_counts_match_each_revision() {
        assert_eq!(SchemaVersion::Siftr1.body_field_count(), 21);
        assert_eq!(SchemaVersion::Siftr1Counters.body_field_count(), 21);
        assert_eq!(SchemaVersion::Siftr1.footer_fields().len(), 8);
        assert_eq!(SchemaVersion::Siftr1Counters.footer_fields().len(), 12);
        assert_eq!(SchemaVersion::Siftr2.body_field_count(), 33);
        assert_eq!(SchemaVersion::Siftr2Sack.body_field_count(), 47);
    }

    #[test]
    fn field_names_are_unique_per_revision() {
        for schema in SchemaVersion::ALL {
            let fields = schema.body_fields();
            for (i, &name) in fields.iter().enumerate() {
                assert_eq!(index_of(name, schema).unwrap(), i, "{} in {}", name, schema);
            }
        }
    }

    #[test]
    fn shared_prefix_keeps_its_positions() {
        for &name in SIFTR1_BODY_FIELDS {
            let v1 = index_of(name, SchemaVersion::Siftr1).unwrap();
            assert_eq!(index_of(name, SchemaVersion::Siftr1Counters).unwrap(), v1);
            assert_eq!(index_of(name, SchemaVersion::Siftr2).unwrap(), v1);
            assert_eq!(index_of(name, SchemaVersion::Siftr2Sack).unwrap(), v1);
        }
    }

    #[test]
    fn index_of_unknown_field_is_reported() {
        let err = index_of(TP_NSACKS, SchemaVersion::Siftr2).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownField {
                field: "tp_nsacks",
                schema: "siftr2"
            }
        ));
    }

    #[test]
    fn version_string_selects_schema() {
        assert_eq!(
            SchemaVersion::from_siftr_version("1.2.4").unwrap(),
            SchemaVersion::Siftr1
        );
        assert_eq!(
            SchemaVersion::from_siftr_version("2.0").unwrap(),
            SchemaVersion::Siftr2
        );
        assert_eq!(
            SchemaVersion::from_siftr_version("2.1").unwrap(),
            SchemaVersion::Siftr2Sack
        );
        for schema in SchemaVersion::ALL {
            if schema != SchemaVersion::Siftr1Counters {
                assert!(schema.has_flow_list(), "{}", schema);
            }
        }
        assert!(matches!(
            SchemaVersion::from_siftr_version("3.0"),
            Err(ParseError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn schema_names_parse_back() {
        for schema in SchemaVersion::ALL {
            assert_eq!(schema.name().parse::<SchemaVersion>().unwrap(), schema);
        }
        assert!("siftr9".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn decode_header_reads_every_field() {
        let header = decode_header(HEADER).unwrap();
        assert_eq!(header.enable_time.timestamp(), 1_712_000_000);
        assert_eq!(header.enable_time.timestamp_subsec_micros(), 250_000);
        assert_eq!(header.siftr_version, "2.0");
        assert_eq!(header.sysname, "FreeBSD");
        assert_eq!(header.sysver, "1500000");
        assert_eq!(header.ipmode, "4");
    }

    #[test]
    fn decode_header_rejects_wrong_field_count() {
        let err = decode_header("enable_time_secs=1\tenable_time_usecs=2\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::SchemaMismatch {
                record: "header",
                expected: 6,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn decode_header_rejects_misplaced_key() {
        let line = HEADER.replace("sysname=", "hostname=");
        assert!(matches!(
            decode_header(&line),
            Err(ParseError::UnexpectedKey {
                expected: "sysname",
                ..
            })
        ));
    }

    #[test]
    fn decode_siftr2_footer() {
        let line = "disable_time_secs=1712000010\tdisable_time_usecs=500000\tglobal_flow_cnt=2\tmax_tmp_qsize=7\tavg_tmp_qsize=1\tmax_str_size=300\talq_getn_fail_cnt=0\tflow_list=7,10.0.0.1,5001,10.0.0.2,40000,1448,1,6,6,5;9,10.0.0.1,5002,10.0.0.3,40001,1448,0,6,6,0;\r\n";
        let footer = decode_footer(line, SchemaVersion::Siftr2).unwrap();
        assert_eq!(footer.disable_time.timestamp(), 1_712_000_010);
        assert_eq!(footer.counters.get(GLOBAL_FLOW_CNT), Some(2));
        assert_eq!(footer.counters.get("max_str_size"), Some(300));
        assert_eq!(footer.counters.get(DISABLE_TIME_SECS), None);
        assert!(footer.flow_list.unwrap().starts_with("7,10.0.0.1"));
    }

    #[test]
    fn decode_siftr1_footer_carries_flow_list() {
        let line = "disable_time_secs=100\tdisable_time_usecs=0\tglobal_flow_cnt=1\tmax_tmp_qsize=0\tavg_tmp_qsize=0\tmax_str_size=0\talq_getn_fail_cnt=0\tflow_list=3,10.0.0.1,22,10.0.0.9,50000,1460,1,3,3,12;";
        let footer = decode_footer(line, SchemaVersion::Siftr1).unwrap();
        assert_eq!(footer.counters.get(GLOBAL_FLOW_CNT), Some(1));
        assert!(footer.flow_list.unwrap().starts_with("3,10.0.0.1,22"));
        assert!(SchemaVersion::Siftr1.has_flow_list());
    }

    #[test]
    fn decode_counters_footer_has_no_flow_list() {
        let line = "disable_time_secs=100\tdisable_time_usecs=0\tnum_inbound_tcp_pkts=3\tnum_outbound_tcp_pkts=4\ttotal_tcp_pkts=7\tnum_inbound_skipped_pkts_malloc=0\tnum_outbound_skipped_pkts_malloc=0\tnum_inbound_skipped_pkts_tcpcb=0\tnum_outbound_skipped_pkts_tcpcb=0\tnum_inbound_skipped_pkts_inpcb=0\tnum_outbound_skipped_pkts_inpcb=0\ttotal_skipped_tcp_pkts=0";
        let footer = decode_footer(line, SchemaVersion::Siftr1Counters).unwrap();
        assert!(footer.flow_list.is_none());
        assert_eq!(footer.counters.get("total_tcp_pkts"), Some(7));
        assert!(!SchemaVersion::Siftr1Counters.has_flow_list());
    }

    #[test]
    fn decode_footer_rejects_wrong_schema() {
        let line = "disable_time_secs=100\tdisable_time_usecs=0\tglobal_flow_cnt=0\tmax_tmp_qsize=0\tavg_tmp_qsize=0\tmax_str_size=0\talq_getn_fail_cnt=0\tflow_list=";
        assert!(matches!(
            decode_footer(line, SchemaVersion::Siftr1Counters),
            Err(ParseError::SchemaMismatch {
                record: "footer",
                expected: 12,
                actual: 8,
                ..
            })
        ));
    }
}
