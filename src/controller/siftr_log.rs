//! An opened siftr log: session metadata, flow registry and rescans.

use std::fmt::Write as _;

use log::{debug, error, info, warn};

use super::line_source::LineSource;
use crate::decoding::FieldDecoder;
use crate::error_handling::types::{ExtractionError, ParseError};
use crate::extraction::{DecodePolicy, ExtractionOptions, ExtractionOutcome, FlowExtractor};
use crate::flow_registry::FlowRegistry;
use crate::log_framing::{body_lines, LineType, LogFramer};
use crate::schema::registry::{decode_footer, decode_header, field};
use crate::schema::{LogSession, SchemaVersion};
use crate::storage::SeriesStorage;

pub struct SiftrLog<S: LineSource> {
    source: S,
    session: LogSession,
    registry: FlowRegistry,
    flow_list: Option<String>,
    body_lines: u64,
    skipped_lines: u64,
}

fn declared_flow_count(session: &LogSession) -> Result<u32, ParseError> {
    let count = session.global_flow_count().unwrap_or(0);
    u32::try_from(count).map_err(|_| ParseError::InvalidValue {
        field: field::GLOBAL_FLOW_CNT,
        value: count.to_string(),
        line: None,
    })
}

impl<S: LineSource> SiftrLog<S> {
    /// First pass over the log.
    ///
    /// Decodes the header and footer and builds the flow registry. The
    /// schema comes from the header's `siftrver` unless `schema` pins it.
    /// When the schema's footer has no flow list, body lines are decoded to
    /// infer the registry, following `decode_policy` on failures.
    pub fn open(
        source: S,
        schema: Option<SchemaVersion>,
        decode_policy: DecodePolicy,
    ) -> Result<Self, ParseError> {
        info!("Opening siftr log {}", source.describe());
        let reader = source.open()?;
        let mut framer = LogFramer::from_reader(reader);

        let header_line = match framer.next() {
            Some(item) => item?,
            None => return Err(ParseError::EmptyLog),
        };
        let header = decode_header(&header_line.raw)?;
        let schema = match schema {
            Some(pinned) => {
                info!("Using pinned schema {} (siftrver {})", pinned, header.siftr_version);
                pinned
            }
            None => SchemaVersion::from_siftr_version(&header.siftr_version)?,
        };
        debug!("Selected schema {}", schema);

        let mut inferred = if schema.has_flow_list() {
            None
        } else {
            Some((FlowRegistry::empty_inferred(), FieldDecoder::new(schema)?))
        };
        let mut footer_line = None;
        let mut body_count = 0u64;
        let mut skipped = 0u64;

        for item in framer {
            let line = item?;
            match line.kind {
                LineType::Body => {
                    body_count += 1;
                    if let Some((registry, decoder)) = inferred.as_mut() {
                        match decoder.decode(&line.raw) {
                            Ok(record) => registry.record_sighting(record.flow_id),
                            Err(e) => {
                                let e = e.at_line(line.line_number);
                                match decode_policy {
                                    DecodePolicy::Abort => {
                                        error!("Unable to infer flows: {}", e);
                                        return Err(e);
                                    }
                                    DecodePolicy::Skip => {
                                        warn!("Skipping undecodable line: {}", e);
                                        skipped += 1;
                                    }
                                }
                            }
                        }
                    }
                }
                LineType::Footer => footer_line = Some(line),
                LineType::Header => {}
            }
        }

        let footer_line = footer_line.ok_or_else(|| {
            error!("{} has a header but no footer", source.describe());
            ParseError::MissingFooter
        })?;
        let footer = decode_footer(&footer_line.raw, schema)?;
        let flow_list = footer.flow_list.clone();
        let session = LogSession::new(header, &footer, schema);

        let registry = match inferred {
            Some((registry, _)) => {
                info!("Inferred {} flow(s) from {} body lines", registry.len(), body_count);
                registry
            }
            None => {
                let declared = declared_flow_count(&session)?;
                FlowRegistry::from_flow_list(flow_list.as_deref().unwrap_or(""), declared)?
            }
        };

        Ok(Self {
            source,
            session,
            registry,
            flow_list,
            body_lines: body_count,
            skipped_lines: skipped,
        })
    }

    pub fn session(&self) -> &LogSession {
        &self.session
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn body_line_count(&self) -> u64 {
        self.body_lines
    }

    pub fn skipped_line_count(&self) -> u64 {
        self.skipped_lines
    }

    /// The file basics: version, flow list, start, end and duration.
    pub fn report(&self, verbose: bool) -> String {
        let s = &self.session;
        let mut out = String::new();
        let _ = writeln!(out, "siftr version: {}", s.siftr_version);
        let _ = writeln!(
            out,
            "system: {} {} (ipmode {}), schema {}",
            s.sysname, s.sysver, s.ipmode, s.schema
        );
        if verbose {
            if let Some(list) = &self.flow_list {
                let _ = writeln!(out, "flow list: {}", list);
            }
        }
        let _ = writeln!(out, "flow id list:");
        for flow in self.registry.iter() {
            let _ = writeln!(out, " {}", flow);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "starting_time: {}.{:06}",
            s.enable_time.timestamp(),
            s.enable_time.timestamp_subsec_micros()
        );
        let _ = writeln!(
            out,
            "ending_time: {}.{:06}",
            s.disable_time.timestamp(),
            s.disable_time.timestamp_subsec_micros()
        );
        let seconds = s.duration().num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
        let _ = writeln!(out, "log duration: {:.2} seconds", seconds);
        out
    }

    /// Rescans the log from its first line and extracts one flow.
    ///
    /// The direction counters of every flow are reset first, so repeated
    /// extractions of the same flow report the same counts.
    pub fn extract(
        &mut self,
        flow_id: u32,
        storage: &dyn SeriesStorage,
        options: &ExtractionOptions,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        self.registry.reset_counters();
        let extractor = FlowExtractor::new(self.session.schema, storage, options)?;
        let reader = self.source.open()?;
        debug!("Rescanning {} for flow {}", self.source.describe(), flow_id);
        extractor.extract(
            flow_id,
            body_lines(LogFramer::from_reader(reader)),
            &mut self.registry,
        )
    }
}
