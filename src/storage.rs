//! Storage subsystem
//!
//! This module provides the sinks extraction passes write their output
//! series and summaries to.
//!
//! Components:
//! - `storage_trait`: the SeriesStorage trait defining a uniform API.
//! - `file_storage`: one plain file per sink inside an output directory.
//! - `memory_storage`: in-memory sinks for tests and embedding callers.
//! - `output_series`: tab-delimited series with a fixed header row.

pub mod file_storage;
pub mod memory_storage;
pub mod output_series;
pub mod storage_trait;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use output_series::OutputSeries;
pub use storage_trait::{write_json, SeriesStorage};
