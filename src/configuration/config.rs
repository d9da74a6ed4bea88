use super::types::Config;
use clap::Parser;
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error_handling::types::ConfigError;
use crate::extraction::{DecodePolicy, ExtractionOptions, SeriesKind};
use crate::schema::SchemaVersion;

/// Command-line arguments of the `siftr-review` binary.
///
/// Values given here override the ones read from the configuration file,
/// which in turn override the built-in defaults of [`Config`].
///
/// # Examples
///
/// ```text
/// siftr-review -f siftr.log
/// siftr-review -f siftr.log -s 3412 -s 998 --series cwnd,recovery --stop-at-episode-end
/// siftr-review -f siftr.log -s 3412 -c review.toml -o plots/ --summary
/// ```
#[derive(Parser, Debug, Clone)]
#[command(name = "siftr-review")]
#[command(version)]
#[command(about = "Review siftr TCP logs and derive per-flow plot series")]
pub struct Args {
    /// siftr log file to review
    ///
    /// The file basics (version, flow list, duration) are always printed.
    ///
    /// # Command Line
    /// Use `-f, --file <PATH>` to set this value from the CLI
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Flow ids to extract series for
    ///
    /// Repeat the flag to extract several flows; the log is rescanned once
    /// per flow.
    ///
    /// # Command Line
    /// Use `-s, --flow-id <ID>` to set this value from the CLI
    #[arg(short = 's', long = "flow-id")]
    pub flow_ids: Vec<u32>,

    /// Series to produce, comma separated: cwnd, sack, packet, recovery
    ///
    /// # Command Line
    /// Use `--series <KIND,...>` to set this value from the CLI
    #[arg(long, value_delimiter = ',')]
    pub series: Vec<SeriesKind>,

    /// Directory receiving the series files
    ///
    /// # Command Line
    /// Use `-o, --output-dir <DIR>` to set this value from the CLI
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// TOML configuration file
    ///
    /// # Command Line
    /// Use `-c, --config <PATH>`, or the `SIFTR_REVIEW_CONFIG` environment
    /// variable, to set this value
    #[arg(short = 'c', long, env = "SIFTR_REVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log layout to use instead of the one named by the header's siftrver
    ///
    /// # Command Line
    /// Use `--schema <siftr1|siftr1_counters|siftr2|siftr2_sack>` to set this value from the CLI
    #[arg(long)]
    pub schema: Option<SchemaVersion>,

    /// Data segments remembered per direction for duplicate detection
    ///
    /// # Command Line
    /// Use `--duplicate-window <COUNT>` to set this value from the CLI
    #[arg(long)]
    pub duplicate_window: Option<usize>,

    /// Stop a flow's pass once its first recovery episode ends
    ///
    /// Only effective when the recovery series is requested.
    ///
    /// # Command Line
    /// Use `--stop-at-episode-end` flag to enable
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stop_at_episode_end: bool,

    /// Count undecodable body lines as warnings instead of aborting
    ///
    /// # Command Line
    /// Use `--skip-bad-lines` flag to enable
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub skip_bad_lines: bool,

    /// Write a JSON summary per extracted flow
    ///
    /// # Command Line
    /// Use `--summary` flag to enable
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub summary: bool,

    /// Debug-level logging and the raw flow list in the report
    ///
    /// # Command Line
    /// Use `-v, --verbose` flag to enable
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Args {
    /// Parses the process arguments, exiting with usage on error.
    pub fn from_args() -> Self {
        Args::parse()
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| {
            error!("Unable to read configuration file {}: {}", path.display(), e);
            ConfigError::IoError(e)
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| {
            error!("Unable to parse configuration file {}: {}", path.display(), e);
            ConfigError::TomlError(e.to_string())
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Builds the effective configuration: defaults, then the file named by
    /// `args.config` if any, then the command-line overrides.
    pub fn resolve(args: &Args) -> Result<Config, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                info!("Importing configuration from {}", path.display());
                Config::from_file(path)?
            }
            None => Config::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Overrides the fields the command line sets explicitly.
    pub fn apply_args(&mut self, args: &Args) {
        if !args.series.is_empty() {
            self.series = args.series.clone();
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = Some(dir.clone());
        }
        if let Some(schema) = args.schema {
            self.schema = Some(schema);
        }
        if let Some(window) = args.duplicate_window {
            self.duplicate_window = window;
        }
        if args.stop_at_episode_end {
            self.stop_at_episode_end = true;
        }
        if args.skip_bad_lines {
            self.decode_policy = DecodePolicy::Skip;
        }
        if args.summary {
            self.write_summary = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duplicate_window == 0 {
            return Err(ConfigError::NotInRange(
                "duplicate_window must be at least 1".to_string(),
            ));
        }
        if self.series.is_empty() {
            return Err(ConfigError::SeriesEmpty(
                "at least one series must be requested".to_string(),
            ));
        }
        Ok(())
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            series: self.series.clone(),
            duplicate_window: self.duplicate_window,
            stop_at_episode_end: self.stop_at_episode_end,
            decode_policy: self.decode_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.duplicate_window, 256);
        assert_eq!(config.decode_policy, DecodePolicy::Abort);
    }

    #[test]
    fn test_from_file() {
        let file = config_file(
            r#"
output_dir = "/tmp/plots"
series = ["cwnd", "recovery"]
duplicate_window = 64
stop_at_episode_end = true
decode_policy = "skip"
schema = "siftr2_sack"
write_summary = true
"#,
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/plots")));
        assert_eq!(config.series, vec![SeriesKind::Cwnd, SeriesKind::Recovery]);
        assert_eq!(config.duplicate_window, 64);
        assert!(config.stop_at_episode_end);
        assert_eq!(config.decode_policy, DecodePolicy::Skip);
        assert_eq!(config.schema, Some(SchemaVersion::Siftr2Sack));
        assert!(config.write_summary);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = config_file("series = [\"sack\"]\n");
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.series, vec![SeriesKind::Sack]);
        assert_eq!(config.duplicate_window, 256);
        assert_eq!(config.schema, None);
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let unknown = config_file("series = [\"rtt\"]\n");
        assert!(matches!(
            Config::from_file(unknown.path()),
            Err(ConfigError::TomlError(_))
        ));
        let typo = config_file("duplicate_windw = 3\n");
        assert!(matches!(
            Config::from_file(typo.path()),
            Err(ConfigError::TomlError(_))
        ));
        let zero = config_file("duplicate_window = 0\n");
        assert!(matches!(
            Config::from_file(zero.path()),
            Err(ConfigError::NotInRange(_))
        ));
        let empty = config_file("series = []\n");
        assert!(matches!(
            Config::from_file(empty.path()),
            Err(ConfigError::SeriesEmpty(_))
        ));
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/review.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_args() {
        std::env::remove_var("SIFTR_REVIEW_CONFIG");
        let args = Args::try_parse_from([
            "siftr-review",
            "-f",
            "siftr.log",
            "-s",
            "7",
            "--flow-id",
            "9",
            "--series",
            "cwnd,sack",
            "--schema",
            "siftr2_sack",
            "--duplicate-window",
            "8",
            "--skip-bad-lines",
            "--summary",
        ])
        .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(args.file, PathBuf::from("siftr.log"));
        assert_eq!(args.flow_ids, vec![7, 9]);
        assert_eq!(args.series, vec![SeriesKind::Cwnd, SeriesKind::Sack]);
        assert!(args.config.is_none());
        assert!(!args.verbose);

        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.series, vec![SeriesKind::Cwnd, SeriesKind::Sack]);
        assert_eq!(config.schema, Some(SchemaVersion::Siftr2Sack));
        assert_eq!(config.duplicate_window, 8);
        assert_eq!(config.decode_policy, DecodePolicy::Skip);
        assert!(config.write_summary);
        assert!(!config.stop_at_episode_end);
    }

    #[test]
    #[serial]
    fn test_args_override_file() {
        let file = config_file("series = [\"packet\"]\nduplicate_window = 32\nstop_at_episode_end = true\n");
        std::env::set_var("SIFTR_REVIEW_CONFIG", file.path());
        let args = Args::try_parse_from(["siftr-review", "-f", "x.log", "--duplicate-window", "4"]);
        std::env::remove_var("SIFTR_REVIEW_CONFIG");
        let args = args.unwrap();

        assert_eq!(args.config.as_deref(), Some(file.path()));
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.series, vec![SeriesKind::Packet]);
        assert_eq!(config.duplicate_window, 4);
        assert!(config.stop_at_episode_end);
        assert_eq!(config.extraction_options().duplicate_window, 4);
    }

    #[test]
    #[serial]
    fn test_args_require_file_and_known_values() {
        std::env::remove_var("SIFTR_REVIEW_CONFIG");
        assert!(Args::try_parse_from(["siftr-review"]).is_err());
        assert!(Args::try_parse_from(["siftr-review", "-f", "x", "--series", "rtt"]).is_err());
        assert!(Args::try_parse_from(["siftr-review", "-f", "x", "--schema", "siftr3"]).is_err());
        let zero = Args::try_parse_from(["siftr-review", "-f", "x", "--duplicate-window", "0"]).unwrap();
        assert!(matches!(Config::resolve(&zero), Err(ConfigError::NotInRange(_))));
    }
}
