//! Single forward pass over the body lines of a log for one flow.
//!
//! Every body line is decoded; lines of other flows are dropped after their
//! flow id is read. Records of the requested flow feed the duplicate detector
//! and the recovery segmenter, then fan out to the requested output series.
//! Sinks opened by a pass are always closed before it returns.

use log::{debug, info, trace, warn};

use super::types::{
    DecodePolicy, ExtractionOptions, ExtractionOutcome, ExtractionSummary, SeriesKind,
};
use crate::analysis::{DuplicateDetector, PacketKey, RecoverySegmenter, SegmenterEvent};
use crate::decoding::{BodyRecord, Direction, FieldDecoder, SackSpace};
use crate::error_handling::types::{ExtractionError, ParseError};
use crate::flow_registry::FlowRegistry;
use crate::log_framing::FramedLine;
use crate::schema::flags::{decode_flags, join_flags, recovery_flags, FlagSpace};
use crate::schema::SchemaVersion;
use crate::storage::{OutputSeries, SeriesStorage};

/// Drives extraction passes for one log.
pub struct FlowExtractor<'a> {
    decoder: FieldDecoder,
    storage: &'a dyn SeriesStorage,
    options: &'a ExtractionOptions,
}

struct Sink {
    kind: SeriesKind,
    series: OutputSeries,
}

/// Mutable state of one pass.
struct PassState {
    detector: DuplicateDetector,
    segmenter: RecoverySegmenter,
    baseline: Option<f64>,
    mss: Option<u32>,
    sack_slots: usize,
    stop_at_episode_end: bool,
    summary: ExtractionSummary,
}

fn rel(ts: f64) -> String {
    format!("{:.6}", ts)
}

fn labels(mask: u32, space: FlagSpace) -> String {
    join_flags(&decode_flags(mask, space))
}

impl<'a> FlowExtractor<'a> {
    pub fn new(
        schema: SchemaVersion,
        storage: &'a dyn SeriesStorage,
        options: &'a ExtractionOptions,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            decoder: FieldDecoder::new(schema)?,
            storage,
            options,
        })
    }

    pub fn schema(&self) -> SchemaVersion {
        self.decoder.schema()
    }

    /// Requested series without repeats, in request order.
    fn requested_series(&self) -> Vec<SeriesKind> {
        let mut kinds: Vec<SeriesKind> = Vec::with_capacity(self.options.series.len());
        for kind in &self.options.series {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// Fails when a requested series needs a field the schema lacks.
    fn check_series(&self, kinds: &[SeriesKind]) -> Result<(), ParseError> {
        let schema = self.schema();
        for kind in kinds {
            if let Some(name) = kind.required_field() {
                if !schema.has_field(name) {
                    warn!("series {} is not available for schema {}", kind, schema);
                    return Err(ParseError::UnknownField {
                        field: name,
                        schema: schema.name(),
                    });
                }
            }
        }
        Ok(())
    }

    fn open_sinks(&self, flow_id: u32, kinds: &[SeriesKind]) -> Result<Vec<Sink>, ExtractionError> {
        let mut sinks = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            match OutputSeries::open(self.storage, &kind.file_name(flow_id), kind.columns()) {
                Ok(series) => {
                    info!("Writing {} series to {}", kind, series.location());
                    sinks.push(Sink { kind, series });
                }
                Err(e) => {
                    if let Err(closed) = close_all(&mut sinks) {
                        warn!(
                            "Closing series of flow {} after a failed open also failed: {}",
                            flow_id, closed
                        );
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(sinks)
    }

    /// Extracts the series of `flow_id` from a sequence of body lines.
    ///
    /// The registry's direction counters of the flow are incremented for
    /// every record of the flow. An unknown flow id is reported as
    /// [`ExtractionOutcome::FlowNotFound`] without opening any sink.
    pub fn extract<I>(
        &self,
        flow_id: u32,
        body: I,
        registry: &mut FlowRegistry,
    ) -> Result<ExtractionOutcome, ExtractionError>
    where
        I: IntoIterator<Item = Result<FramedLine, ParseError>>,
    {
        let kinds = self.requested_series();
        self.check_series(&kinds)?;

        let flow = match registry.lookup_mut(flow_id) {
            Ok(flow) => flow,
            Err(e) => {
                info!("{}", e);
                return Ok(ExtractionOutcome::FlowNotFound(flow_id));
            }
        };

        let mut state = PassState {
            detector: DuplicateDetector::new(self.options.duplicate_window),
            segmenter: RecoverySegmenter::new(),
            baseline: None,
            mss: flow.mss(),
            sack_slots: self.schema().sack_block_slots(),
            stop_at_episode_end: self.options.stop_at_episode_end
                && kinds.contains(&SeriesKind::Recovery),
            summary: ExtractionSummary {
                flow_id,
                endpoints: flow.endpoints(),
                ..Default::default()
            },
        };

        let mut sinks = self.open_sinks(flow_id, &kinds)?;
        debug!("Starting pass for flow {} with {} series", flow_id, sinks.len());

        let pass = self.run_pass(flow_id, body, &mut state, &mut sinks, |direction| {
            flow.count_direction(direction)
        });
        let closed = close_all(&mut sinks);
        pass?;
        closed?;

        for sink in &sinks {
            state.summary.rows.insert(sink.kind, sink.series.rows());
        }
        finish_summary(&mut state);
        Ok(ExtractionOutcome::Extracted(state.summary))
    }

    fn run_pass<I, F>(
        &self,
        flow_id: u32,
        body: I,
        state: &mut PassState,
        sinks: &mut [Sink],
        mut count_direction: F,
    ) -> Result<(), ExtractionError>
    where
        I: IntoIterator<Item = Result<FramedLine, ParseError>>,
        F: FnMut(Direction),
    {
        for item in body {
            let line = item?;
            let record = match self.decoder.decode(&line.raw) {
                Ok(record) => record,
                Err(e) => {
                    let e = e.at_line(line.line_number);
                    match self.options.decode_policy {
                        DecodePolicy::Abort => return Err(e.into()),
                        DecodePolicy::Skip => {
                            warn!("Skipping undecodable line: {}", e);
                            state.summary.skipped_lines += 1;
                            state.summary.warnings += 1;
                            continue;
                        }
                    }
                }
            };
            if record.flow_id != flow_id {
                continue;
            }

            count_direction(record.direction);
            if state.process(&record, line.line_number, sinks)? {
                info!(
                    "Recovery episode closed at line {}, stopping flow {}",
                    line.line_number, flow_id
                );
                state.summary.stopped_early = true;
                break;
            }
        }
        Ok(())
    }
}

impl PassState {
    /// Handles one record of the flow. Returns whether the pass should stop.
    fn process(
        &mut self,
        record: &BodyRecord,
        line_number: usize,
        sinks: &mut [Sink],
    ) -> Result<bool, ExtractionError> {
        let baseline = *self.baseline.get_or_insert(record.timestamp);
        let relative = record.timestamp - baseline;
        trace!(
            "flow {} line {} {} rel={:.6} cwnd={}",
            record.flow_id,
            line_number,
            record.direction,
            relative,
            record.cwnd
        );

        let summary = &mut self.summary;
        summary.records += 1;
        match record.direction {
            Direction::In => summary.dir_in += 1,
            Direction::Out => summary.dir_out += 1,
        }
        if summary.first_timestamp.is_none() {
            summary.first_timestamp = Some(record.timestamp);
        }
        summary.last_relative_timestamp = Some(relative);

        if record.data_sz > 0 {
            summary.data_packets += 1;
            if self.mss.is_some_and(|mss| record.data_sz < mss) {
                summary.fragments += 1;
            }
        }

        let is_duplicate = self
            .detector
            .check(record.direction, PacketKey::from_record(record));

        if let Some(sack) = &record.sack {
            self.note_sack_counts(&sack.tp, "tp_nsacks", line_number);
            self.note_sack_counts(&sack.to, "to_nsacks", line_number);
        }

        let event = self.segmenter.observe(record.t_flags);

        for sink in sinks.iter_mut() {
            self.write_row(sink, record, relative, is_duplicate)?;
        }

        Ok(self.stop_at_episode_end && matches!(event, Some(SegmenterEvent::EpisodeClosed(_))))
    }

    fn note_sack_counts(&mut self, space: &SackSpace, name: &str, line_number: usize) {
        let max = if name == "tp_nsacks" {
            &mut self.summary.max_tp_sacks
        } else {
            &mut self.summary.max_to_sacks
        };
        *max = (*max).max(space.count);
        if space.count as usize > self.sack_slots {
            warn!(
                "{} = {} exceeds {} SACK slots at line {}",
                name, space.count, self.sack_slots, line_number
            );
            self.summary.warnings += 1;
        }
    }

    fn write_row(
        &self,
        sink: &mut Sink,
        record: &BodyRecord,
        relative: f64,
        is_duplicate: bool,
    ) -> Result<(), ExtractionError> {
        let dir = record.direction.as_str();
        let ts = rel(relative);
        match sink.kind {
            SeriesKind::Cwnd => {
                sink.series
                    .write_row(&[&dir, &ts, &record.cwnd, &record.ssthresh])?;
            }
            SeriesKind::Sack => {
                let Some(sack) = &record.sack else {
                    return Ok(());
                };
                if sack.tp.count == 0 && sack.to.count == 0 {
                    return Ok(());
                }
                let (tp, to) = (&sack.tp.blocks, &sack.to.blocks);
                sink.series.write_row(&[
                    &dir,
                    &ts,
                    &record.th_seq,
                    &record.th_ack,
                    &record.data_sz,
                    &sack.tp.count,
                    &tp[0],
                    &tp[1],
                    &tp[2],
                    &sack.to.count,
                    &to[0],
                    &to[1],
                    &to[2],
                ])?;
            }
            SeriesKind::Packet => {
                sink.series.write_row(&[
                    &dir,
                    &ts,
                    &record.th_seq,
                    &record.th_ack,
                    &record.data_sz,
                    &u8::from(is_duplicate),
                    &labels(record.t_flags, FlagSpace::Primary),
                    &labels(record.t_flags2, FlagSpace::Extended),
                ])?;
            }
            SeriesKind::Recovery => {
                if !self.segmenter.in_episode() {
                    return Ok(());
                }
                let Some(c) = &record.congestion else {
                    return Ok(());
                };
                sink.series.write_row(&[
                    &self.segmenter.current_episode(),
                    &dir,
                    &ts,
                    &record.cwnd,
                    &record.ssthresh,
                    &labels(recovery_flags(record.t_flags), FlagSpace::Primary),
                    &c.dupacks,
                    &record.inflight_bytes,
                    &c.sacked_bytes,
                    &c.lost_bytes,
                    &c.recover_fs,
                ])?;
            }
        }
        Ok(())
    }
}

/// Closes every sink, reporting the first failure after trying them all.
fn close_all(sinks: &mut [Sink]) -> Result<(), ExtractionError> {
    let mut first_error = None;
    for sink in sinks.iter_mut() {
        if let Err(e) = sink.series.finish() {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn finish_summary(state: &mut PassState) {
    let summary = &mut state.summary;
    summary.duplicates_in = state.detector.total_for(Direction::In);
    summary.duplicates_out = state.detector.total_for(Direction::Out);
    summary.recovery_episodes = state.segmenter.episodes();

    summary.fragmentation_ratio = match (summary.data_packets, state.mss) {
        (0, _) => {
            warn!(
                "Flow {} has no data packets, fragmentation ratio omitted",
                summary.flow_id
            );
            summary.warnings += 1;
            None
        }
        (_, None) => {
            warn!(
                "Flow {} has no known MSS, fragmentation ratio omitted",
                summary.flow_id
            );
            summary.warnings += 1;
            None
        }
        (data, Some(_)) => Some(summary.fragments as f64 / data as f64),
    };
    debug!(
        "Flow {}: {} records, {} duplicates, {} episodes, {} warnings",
        summary.flow_id,
        summary.records,
        summary.duplicates(),
        summary.recovery_episodes,
        summary.warnings
    );
}
