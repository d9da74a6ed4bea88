//! In-memory sinks, used by tests and by callers that post-process series
//! without touching the filesystem.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::SeriesStorage;

#[derive(Debug, Default)]
struct Entry {
    data: Vec<u8>,
    flushed: bool,
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Entries,
}

struct MemorySink {
    name: String,
    entries: Entries,
}

impl MemorySink {
    fn with_entry<T>(&self, f: impl FnOnce(&mut Entry) -> T) -> io::Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory storage lock poisoned"))?;
        Ok(f(entries.entry(self.name.clone()).or_default()))
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_entry(|entry| {
            entry.data.extend_from_slice(buf);
            entry.flushed = false;
            buf.len()
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_entry(|entry| entry.flushed = true)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of the sink called `name`, if it was ever created.
    pub fn contents(&self, name: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(name)
            .map(|e| String::from_utf8_lossy(&e.data).into_owned())
    }

    /// Whether nothing was written to `name` since its last flush.
    pub fn is_flushed(&self, name: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.get(name).is_some_and(|e| e.flushed))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl SeriesStorage for MemoryStorage {
    fn create_sink(&self, name: &str) -> Result<Box<dyn Write>, StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::CreateFailed)?;
        entries.insert(name.to_string(), Entry::default());
        Ok(Box::new(MemorySink {
            name: name.to_string(),
            entries: Arc::clone(&self.entries),
        }))
    }

    fn locate(&self, name: &str) -> String {
        format!("memory:{}", name)
    }
}
