use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::SeriesStorage;

pub const OUTPUT_DIR_ENV: &str = "SIFTR_REVIEW_OUTPUT_DIR";

/// Writes every sink as a plain file inside one output directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create output dir {}: {}", base_path.display(), e);
            StorageError::CreateFailed
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Construct FileStorage using env var SIFTR_REVIEW_OUTPUT_DIR if set, otherwise current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            info!("Using FileStorage from {}: {}", OUTPUT_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::CreateFailed
        })?;
        info!("Using FileStorage at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }
}

impl SeriesStorage for FileStorage {
    fn create_sink(&self, name: &str) -> Result<Box<dyn Write>, StorageError> {
        let path = self.path_for(name);
        let file = File::create(&path).map_err(|e| {
            error!("Failed to create {}: {}", path.display(), e);
            StorageError::CreateFailed
        })?;
        debug!("Opened sink {}", path.display());
        Ok(Box::new(BufWriter::new(file)))
    }

    fn locate(&self, name: &str) -> String {
        self.path_for(name).display().to_string()
    }
}
