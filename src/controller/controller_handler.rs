use log::{debug, error, info};

use super::line_source::LineSource;
use super::siftr_log::SiftrLog;
use crate::configuration::Config;
use crate::error_handling::types::*;
use crate::extraction::{ExtractionOutcome, ExtractionSummary};
use crate::storage::{write_json, FileStorage, SeriesStorage};

const SUMMARY_RULE: &str = "++++++++++++++++++++++++++++++ summary ++++++++++++++++++++++++++++";

/// Runs a review: reports the file basics, then extracts each requested flow.
pub struct Controller {
    pub config: Config,
    storage: Box<dyn SeriesStorage>,
    verbose: bool,
}

impl Controller {
    /// Builds a controller writing to the configured output directory, or to
    /// the default one when none is set.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        let storage = match &config.output_dir {
            Some(dir) => FileStorage::new(dir),
            None => FileStorage::new_default(),
        }
        .map_err(|e| {
            error!("Unable to prepare the output directory: {}", e);
            ControllerError::InitializationFailed(e.to_string())
        })?;
        info!("Series will be written to {}", storage.base_path().display());
        Ok(Self::with_storage(config, Box::new(storage)))
    }

    pub fn with_storage(config: Config, storage: Box<dyn SeriesStorage>) -> Self {
        Self {
            config,
            storage,
            verbose: false,
        }
    }

    /// Adds the raw flow list to the printed report.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn storage(&self) -> &dyn SeriesStorage {
        self.storage.as_ref()
    }

    /// Reviews `source` and extracts `flow_ids` in order.
    ///
    /// An unknown flow id is reported and skipped; any other failure ends the
    /// run. Outcomes are returned in the order the ids were given.
    pub fn run<S: LineSource>(
        &self,
        source: S,
        flow_ids: &[u32],
    ) -> Result<Vec<ExtractionOutcome>, ControllerError> {
        info!("Reviewing {}", source.describe());
        let mut log = SiftrLog::open(source, self.config.schema, self.config.decode_policy)?;
        print!("{}", log.report(self.verbose));

        let options = self.config.extraction_options();
        let mut outcomes = Vec::with_capacity(flow_ids.len());
        for &flow_id in flow_ids {
            let outcome = log
                .extract(flow_id, self.storage.as_ref(), &options)
                .map_err(|e| {
                    error!("Extraction of flow {} failed: {}", flow_id, e);
                    e
                })?;
            match &outcome {
                ExtractionOutcome::Extracted(summary) => {
                    print!("{}", summary_block(summary));
                    if self.config.write_summary {
                        let name = format!("summary_{}.json", flow_id);
                        write_json(self.storage.as_ref(), &name, summary)?;
                        debug!("Wrote {}", self.storage.locate(&name));
                    }
                }
                ExtractionOutcome::FlowNotFound(id) => println!("flow ID {} not found", id),
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Text block printed after each extracted flow.
pub fn summary_block(summary: &ExtractionSummary) -> String {
    let mut out = format!(
        "{}\n  {} flowid: {}\n    has {} useful records ({} outputs, {} inputs)\n",
        SUMMARY_RULE,
        summary.endpoints,
        summary.flow_id,
        summary.records,
        summary.dir_out,
        summary.dir_in
    );
    for (kind, rows) in &summary.rows {
        out.push_str(&format!("    {} series: {} rows\n", kind, rows));
    }
    if summary.duplicates() > 0 {
        out.push_str(&format!(
            "    duplicates: {} ({} outputs, {} inputs)\n",
            summary.duplicates(),
            summary.duplicates_out,
            summary.duplicates_in
        ));
    }
    if summary.recovery_episodes > 0 {
        out.push_str(&format!("    recovery episodes: {}\n", summary.recovery_episodes));
    }
    if let Some(ratio) = summary.fragmentation_ratio {
        out.push_str(&format!(
            "    fragmented data packets: {}/{} ({:.2}%)\n",
            summary.fragments,
            summary.data_packets,
            ratio * 100.0
        ));
    }
    if summary.warnings > 0 {
        out.push_str(&format!("    warnings: {}\n", summary.warnings));
    }
    out
}
