use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    SeriesEmpty(String),
    UnknownSeries(String),
    UnknownSchema(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::SeriesEmpty(e) => write!(f, "Series configuration error: {}", e),
            ConfigError::UnknownSeries(e) => write!(f, "Unknown series kind: {}", e),
            ConfigError::UnknownSchema(e) => write!(f, "Unknown schema version: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Structural failures while framing or decoding a log.
///
/// Variants carry counts and line numbers, never the raw line, so a report
/// stays small even for very long records.
#[derive(Debug)]
pub enum ParseError {
    EmptyLog,
    MissingFooter,
    SchemaMismatch {
        record: &'static str,
        schema: &'static str,
        expected: usize,
        actual: usize,
    },
    UnexpectedKey {
        record: &'static str,
        expected: &'static str,
        found: String,
    },
    FieldCountMismatch {
        expected: usize,
        actual: usize,
        line: Option<usize>,
    },
    FlowListCountMismatch {
        declared: u32,
        parsed: usize,
    },
    InvalidValue {
        field: &'static str,
        value: String,
        line: Option<usize>,
    },
    UnknownField {
        field: &'static str,
        schema: &'static str,
    },
    UnsupportedVersion(String),
    DuplicateFlowId(u32),
    Io(std::io::Error),
}

impl ParseError {
    /// Attaches a 1-based line number to errors raised without one.
    pub fn at_line(self, line_number: usize) -> Self {
        match self {
            ParseError::FieldCountMismatch {
                expected,
                actual,
                line: None,
            } => ParseError::FieldCountMismatch {
                expected,
                actual,
                line: Some(line_number),
            },
            ParseError::InvalidValue {
                field,
                value,
                line: None,
            } => ParseError::InvalidValue {
                field,
                value,
                line: Some(line_number),
            },
            other => other,
        }
    }
}

fn fmt_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyLog => write!(f, "Log is empty"),
            ParseError::MissingFooter => write!(f, "Log has a header but no footer"),
            ParseError::SchemaMismatch {
                record,
                schema,
                expected,
                actual,
            } => write!(
                f,
                "Schema mismatch in {} record ({}): expected {} fields, found {}",
                record, schema, expected, actual
            ),
            ParseError::UnexpectedKey {
                record,
                expected,
                found,
            } => write!(
                f,
                "Schema mismatch in {} record: expected key '{}', found '{}'",
                record, expected, found
            ),
            ParseError::FieldCountMismatch {
                expected,
                actual,
                line,
            } => write!(
                f,
                "Field count mismatch{}: expected {}, found {}",
                fmt_line(line),
                expected,
                actual
            ),
            ParseError::FlowListCountMismatch { declared, parsed } => write!(
                f,
                "Flow list count mismatch: footer declares {} flows, parsed {}",
                declared, parsed
            ),
            ParseError::InvalidValue { field, value, line } => write!(
                f,
                "Invalid value for {}{}: '{}'",
                field,
                fmt_line(line),
                value
            ),
            ParseError::UnknownField { field, schema } => {
                write!(f, "Field '{}' does not exist in schema {}", field, schema)
            }
            ParseError::UnsupportedVersion(v) => write!(f, "Unsupported siftr version: {}", v),
            ParseError::DuplicateFlowId(id) => write!(f, "Flow id {} listed more than once", id),
            ParseError::Io(e) => write!(f, "Log IO error: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::Io(err)
    }
}

#[derive(Debug)]
pub enum RegistryError {
    FlowNotFound(u32),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::FlowNotFound(id) => write!(f, "Flow ID {} not found", id),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug)]
pub enum StorageError {
    CreateFailed,
    WriteFailed,
    FlushFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::CreateFailed => write!(f, "Storage create failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::FlushFailed => write!(f, "Storage flush failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum ExtractionError {
    ParseError(ParseError),
    StorageError(StorageError),
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::ParseError(e) => write!(f, "Extraction parse error: {}", e),
            ExtractionError::StorageError(e) => write!(f, "Extraction storage error: {}", e),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<ParseError> for ExtractionError {
    fn from(err: ParseError) -> Self {
        ExtractionError::ParseError(err)
    }
}

impl From<StorageError> for ExtractionError {
    fn from(err: StorageError) -> Self {
        ExtractionError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    ParseError(ParseError),
    ExtractionError(ExtractionError),
    StorageError(StorageError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::ParseError(e) => write!(f, "Parse error: {}", e),
            ControllerError::ExtractionError(e) => write!(f, "Extraction error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<ParseError> for ControllerError {
    fn from(err: ParseError) -> Self {
        ControllerError::ParseError(err)
    }
}

impl From<ExtractionError> for ControllerError {
    fn from(err: ExtractionError) -> Self {
        ControllerError::ExtractionError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_line_fills_missing_line_number() {
        let err = ParseError::FieldCountMismatch {
            expected: 21,
            actual: 3,
            line: None,
        }
        .at_line(42);
        assert!(matches!(
            err,
            ParseError::FieldCountMismatch {
                line: Some(42),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Field count mismatch at line 42: expected 21, found 3"
        );
    }

    #[test]
    fn at_line_keeps_existing_line_number() {
        let err = ParseError::InvalidValue {
            field: "cwnd",
            value: "abc".into(),
            line: Some(7),
        }
        .at_line(99);
        assert!(matches!(err, ParseError::InvalidValue { line: Some(7), .. }));
    }
}
