//! Tab-delimited output series with a `##` header row.

use std::fmt::Display;
use std::io::Write;

use log::{debug, error};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::SeriesStorage;

pub const HEADER_PREFIX: &str = "##";
pub const COLUMN_DELIMITER: char = '\t';

/// One named output sink with a fixed column layout.
pub struct OutputSeries {
    name: String,
    location: String,
    columns: usize,
    writer: Option<Box<dyn Write>>,
    rows: u64,
}

impl OutputSeries {
    /// Creates the sink and writes the header row.
    pub fn open(
        storage: &dyn SeriesStorage,
        name: &str,
        columns: &[&str],
    ) -> Result<Self, StorageError> {
        let location = storage.locate(name);
        let mut writer = storage.create_sink(name)?;
        let header = columns.join("\t");
        writeln!(writer, "{}{}", HEADER_PREFIX, header).map_err(|e| {
            error!("Failed to write header to {}: {}", location, e);
            StorageError::WriteFailed
        })?;
        debug!("Opened series {} with {} columns", location, columns.len());
        Ok(Self {
            name: name.to_string(),
            location,
            columns: columns.len(),
            writer: Some(writer),
            rows: 0,
        })
    }

    /// Writes one row. The number of fields must match the header.
    pub fn write_row(&mut self, fields: &[&dyn Display]) -> Result<(), StorageError> {
        debug_assert_eq!(fields.len(), self.columns, "row width of {}", self.name);
        let writer = self.writer.as_mut().ok_or_else(|| {
            error!("Write to finished series {}", self.location);
            StorageError::WriteFailed
        })?;

        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(COLUMN_DELIMITER);
            }
            line.push_str(&field.to_string());
        }
        writeln!(writer, "{}", line).map_err(|e| {
            error!("Failed to write row to {}: {}", self.location, e);
            StorageError::WriteFailed
        })?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and closes the sink. Safe to call more than once.
    pub fn finish(&mut self) -> Result<u64, StorageError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                error!("Failed to flush {}: {}", self.location, e);
                StorageError::FlushFailed
            })?;
            debug!("Closed series {} after {} rows", self.location, self.rows);
        }
        Ok(self.rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_storage::MemoryStorage;

    #[test]
    fn header_and_rows_are_tab_delimited() {
        let storage = MemoryStorage::new();
        let mut series = OutputSeries::open(&storage, "cwnd_7.txt", &["DIRECTION", "CWND"]).unwrap();
        series.write_row(&[&"o", &14480]).unwrap();
        series.write_row(&[&"i", &format!("{:.6}", 0.5)]).unwrap();
        assert_eq!(series.finish().unwrap(), 2);
        assert_eq!(
            storage.contents("cwnd_7.txt").unwrap(),
            "##DIRECTION\tCWND\no\t14480\ni\t0.500000\n"
        );
        assert!(storage.is_flushed("cwnd_7.txt"));
    }

    #[test]
    fn finish_is_idempotent_and_closes() {
        let storage = MemoryStorage::new();
        let mut series = OutputSeries::open(&storage, "s", &["A"]).unwrap();
        assert!(series.is_open());
        assert_eq!(series.finish().unwrap(), 0);
        assert_eq!(series.finish().unwrap(), 0);
        assert!(!series.is_open());
        assert!(matches!(series.write_row(&[&1]), Err(StorageError::WriteFailed)));
    }
}
