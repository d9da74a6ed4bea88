//! Body line decoding.
//!
//! A [`FieldDecoder`] is built once per schema. It resolves every logical
//! field to its position through the schema registry at construction, then
//! decodes lines by position only.

use std::str::FromStr;

use log::trace;

use super::types::{BodyRecord, CongestionFields, Direction, SackBlock, SackFields, SackSpace};
use crate::error_handling::types::ParseError;
use crate::schema::registry::{field, index_of, strip_line_ending, SchemaVersion, BODY_DELIMITER};

#[derive(Debug, Clone)]
struct BaseIndices {
    direction: usize,
    timestamp: usize,
    flow_id: usize,
    cwnd: usize,
    ssthresh: usize,
    sndwin: usize,
    rcvwin: usize,
    flag: usize,
    flag2: usize,
    state: usize,
    srtt: usize,
    rto: usize,
    snd_buf_hiwat: usize,
    snd_buf_cc: usize,
    rcv_buf_hiwat: usize,
    rcv_buf_cc: usize,
    inflight_bytes: usize,
    reass_qlen: usize,
    th_seq: usize,
    th_ack: usize,
    tcp_data_sz: usize,
}

#[derive(Debug, Clone)]
struct CongestionIndices {
    snd_nxt: usize,
    snd_una: usize,
    pipe: usize,
    snd_cnt: usize,
    fun_name: usize,
    line: usize,
    dupacks: usize,
    delivered_data: usize,
    sack_bytes_rexmit: usize,
    sacked_bytes: usize,
    lost_bytes: usize,
    recover_fs: usize,
}

#[derive(Debug, Clone)]
struct SackSpaceIndices {
    count: usize,
    blocks: [[usize; 2]; 3],
}

#[derive(Debug, Clone)]
struct SackIndices {
    tp: SackSpaceIndices,
    to: SackSpaceIndices,
}

/// Decodes body lines of one schema revision into [`BodyRecord`]s.
#[derive(Debug, Clone)]
pub struct FieldDecoder {
    schema: SchemaVersion,
    field_count: usize,
    base: BaseIndices,
    congestion: Option<CongestionIndices>,
    sack: Option<SackIndices>,
}

fn sack_space_indices(
    count: &'static str,
    blocks: &[[&'static str; 2]; 3],
    schema: SchemaVersion,
) -> Result<SackSpaceIndices, ParseError> {
    let mut resolved = [[0usize; 2]; 3];
    for (slot, names) in blocks.iter().enumerate() {
        resolved[slot] = [index_of(names[0], schema)?, index_of(names[1], schema)?];
    }
    Ok(SackSpaceIndices {
        count: index_of(count, schema)?,
        blocks: resolved,
    })
}

impl FieldDecoder {
    pub fn new(schema: SchemaVersion) -> Result<Self, ParseError> {
        let at = |name: &'static str| index_of(name, schema);

        let base = BaseIndices {
            direction: at(field::DIRECTION)?,
            timestamp: at(field::TIMESTAMP)?,
            flow_id: at(field::FLOW_ID)?,
            cwnd: at(field::CWND)?,
            ssthresh: at(field::SSTHRESH)?,
            sndwin: at(field::SNDWIN)?,
            rcvwin: at(field::RCVWIN)?,
            flag: at(field::FLAG)?,
            flag2: at(field::FLAG2)?,
            state: at(field::STATE)?,
            srtt: at(field::SRTT)?,
            rto: at(field::RTO)?,
            snd_buf_hiwat: at(field::SND_BUF_HIWAT)?,
            snd_buf_cc: at(field::SND_BUF_CC)?,
            rcv_buf_hiwat: at(field::RCV_BUF_HIWAT)?,
            rcv_buf_cc: at(field::RCV_BUF_CC)?,
            inflight_bytes: at(field::INFLIGHT_BYTES)?,
            reass_qlen: at(field::REASS_QLEN)?,
            th_seq: at(field::TH_SEQ)?,
            th_ack: at(field::TH_ACK)?,
            tcp_data_sz: at(field::TCP_DATA_SZ)?,
        };

        let congestion = if schema.has_field(field::RECOVER_FS) {
            Some(CongestionIndices {
                snd_nxt: at(field::SND_NXT)?,
                snd_una: at(field::SND_UNA)?,
                pipe: at(field::PIPE)?,
                snd_cnt: at(field::SND_CNT)?,
                fun_name: at(field::FUN_NAME)?,
                line: at(field::LINE)?,
                dupacks: at(field::DUPACKS)?,
                delivered_data: at(field::DELIVERED_DATA)?,
                sack_bytes_rexmit: at(field::SACK_BYTES_REXMIT)?,
                sacked_bytes: at(field::SACKED_BYTES)?,
                lost_bytes: at(field::LOST_BYTES)?,
                recover_fs: at(field::RECOVER_FS)?,
            })
        } else {
            None
        };

        let sack = if schema.sack_block_slots() > 0 {
            Some(SackIndices {
                tp: sack_space_indices(field::TP_NSACKS, &field::TP_SACKBLKS, schema)?,
                to: sack_space_indices(field::TO_NSACKS, &field::TO_SACKBLKS, schema)?,
            })
        } else {
            None
        };

        Ok(Self {
            schema,
            field_count: schema.body_field_count(),
            base,
            congestion,
            sack,
        })
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// Decodes one body line.
    ///
    /// Fails with [`ParseError::FieldCountMismatch`] when the line does not
    /// split into the schema's field count, and [`ParseError::InvalidValue`]
    /// when a field does not parse. Errors carry no line number; callers that
    /// know it attach it with [`ParseError::at_line`].
    pub fn decode(&self, raw: &str) -> Result<BodyRecord, ParseError> {
        let values: Vec<&str> = strip_line_ending(raw).split(BODY_DELIMITER).collect();
        if values.len() != self.field_count {
            return Err(ParseError::FieldCountMismatch {
                expected: self.field_count,
                actual: values.len(),
                line: None,
            });
        }
        let fields = Fields(&values);
        let b = &self.base;

        let record = BodyRecord {
            direction: fields.direction(b.direction)?,
            timestamp: fields.number(b.timestamp, field::TIMESTAMP)?,
            flow_id: fields.number(b.flow_id, field::FLOW_ID)?,
            cwnd: fields.number(b.cwnd, field::CWND)?,
            ssthresh: fields.number(b.ssthresh, field::SSTHRESH)?,
            sndwin: fields.number(b.sndwin, field::SNDWIN)?,
            rcvwin: fields.number(b.rcvwin, field::RCVWIN)?,
            t_flags: fields.number(b.flag, field::FLAG)?,
            t_flags2: fields.number(b.flag2, field::FLAG2)?,
            state: fields.number(b.state, field::STATE)?,
            srtt: fields.number(b.srtt, field::SRTT)?,
            rto: fields.number(b.rto, field::RTO)?,
            snd_buf_hiwat: fields.number(b.snd_buf_hiwat, field::SND_BUF_HIWAT)?,
            snd_buf_cc: fields.number(b.snd_buf_cc, field::SND_BUF_CC)?,
            rcv_buf_hiwat: fields.number(b.rcv_buf_hiwat, field::RCV_BUF_HIWAT)?,
            rcv_buf_cc: fields.number(b.rcv_buf_cc, field::RCV_BUF_CC)?,
            inflight_bytes: fields.number(b.inflight_bytes, field::INFLIGHT_BYTES)?,
            reass_qlen: fields.number(b.reass_qlen, field::REASS_QLEN)?,
            th_seq: fields.number(b.th_seq, field::TH_SEQ)?,
            th_ack: fields.number(b.th_ack, field::TH_ACK)?,
            data_sz: fields.number(b.tcp_data_sz, field::TCP_DATA_SZ)?,
            congestion: match &self.congestion {
                Some(c) => Some(fields.congestion(c)?),
                None => None,
            },
            sack: match &self.sack {
                Some(s) => Some(SackFields {
                    tp: fields.sack_space(&s.tp, field::TP_NSACKS)?,
                    to: fields.sack_space(&s.to, field::TO_NSACKS)?,
                }),
                None => None,
            },
        };

        trace!(
            "decoded {} record flow={} ts={:.6} seq={} ack={} sz={}",
            record.direction,
            record.flow_id,
            record.timestamp,
            record.th_seq,
            record.th_ack,
            record.data_sz
        );
        Ok(record)
    }
}

struct Fields<'a>(&'a [&'a str]);

impl Fields<'_> {
    fn number<T: FromStr>(&self, index: usize, name: &'static str) -> Result<T, ParseError> {
        let value = self.0[index].trim();
        value.parse::<T>().map_err(|_| ParseError::InvalidValue {
            field: name,
            value: value.to_string(),
            line: None,
        })
    }

    fn direction(&self, index: usize) -> Result<Direction, ParseError> {
        match self.0[index].trim() {
            "i" => Ok(Direction::In),
            "o" => Ok(Direction::Out),
            other => Err(ParseError::InvalidValue {
                field: field::DIRECTION,
                value: other.to_string(),
                line: None,
            }),
        }
    }

    fn congestion(&self, c: &CongestionIndices) -> Result<CongestionFields, ParseError> {
        Ok(CongestionFields {
            snd_nxt: self.number(c.snd_nxt, field::SND_NXT)?,
            snd_una: self.number(c.snd_una, field::SND_UNA)?,
            pipe: self.number(c.pipe, field::PIPE)?,
            snd_cnt: self.number(c.snd_cnt, field::SND_CNT)?,
            fun_name: self.0[c.fun_name].trim().to_string(),
            line: self.number(c.line, field::LINE)?,
            dupacks: self.number(c.dupacks, field::DUPACKS)?,
            delivered_data: self.number(c.delivered_data, field::DELIVERED_DATA)?,
            sack_bytes_rexmit: self.number(c.sack_bytes_rexmit, field::SACK_BYTES_REXMIT)?,
            sacked_bytes: self.number(c.sacked_bytes, field::SACKED_BYTES)?,
            lost_bytes: self.number(c.lost_bytes, field::LOST_BYTES)?,
            recover_fs: self.number(c.recover_fs, field::RECOVER_FS)?,
        })
    }

    fn sack_space(&self, s: &SackSpaceIndices, count_name: &'static str) -> Result<SackSpace, ParseError> {
        let mut blocks = [SackBlock::default(); 3];
        for (slot, [start, end]) in s.blocks.iter().enumerate() {
            blocks[slot] = SackBlock {
                start: self.number(*start, "sack_block_start")?,
                end: self.number(*end, "sack_block_end")?,
            };
        }
        Ok(SackSpace {
            count: self.number(s.count, count_name)?,
            blocks,
        })
    }
}
