//! Series Storage Trait
//!
//! This module defines the `SeriesStorage` trait, the interface through which
//! an extraction pass obtains sinks for its output series and summaries.
//!
//! Implementors are responsible for:
//! - Creating a fresh, empty sink per name, replacing any previous content
//! - Reporting where a named sink ends up, for the run report
//!
//! All fallible methods return a `Result` carrying a `StorageError`.

use std::io::Write;

use log::error;
use serde::Serialize;

use crate::error_handling::types::StorageError;

/// The `SeriesStorage` trait defines the interface for output backends.
pub trait SeriesStorage: Send + Sync {
    /// Opens a new sink called `name`, truncating any existing one.
    fn create_sink(&self, name: &str) -> Result<Box<dyn Write>, StorageError>;

    /// Human-readable location of the sink called `name`.
    fn locate(&self, name: &str) -> String;
}

/// Serializes `value` as pretty JSON into a new sink called `name`.
pub fn write_json<T: Serialize>(
    storage: &dyn SeriesStorage,
    name: &str,
    value: &T,
) -> Result<(), StorageError> {
    let mut sink = storage.create_sink(name)?;
    serde_json::to_writer_pretty(&mut sink, value).map_err(|e| {
        error!("Failed to serialize {}: {}", storage.locate(name), e);
        StorageError::WriteFailed
    })?;
    writeln!(sink).map_err(|e| {
        error!("Failed to write {}: {}", storage.locate(name), e);
        StorageError::WriteFailed
    })?;
    sink.flush().map_err(|e| {
        error!("Failed to flush {}: {}", storage.locate(name), e);
        StorageError::FlushFailed
    })
}
