//! Durable key/value records backing the favorites store.
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("record serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record has an unexpected shape: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait Storage: Send + Sync {
    /// Returns `Ok(None)` when no record exists under `key`.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One JSON file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        // Rename over the old record so readers never see a partial write.
        if let Err(e) = write_synced(&tmp, value).and_then(|()| fs::rename(&tmp, &path)) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {:?}: {}", tmp, cleanup);
                }
            }
            return Err(e.into());
        }
        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }
}

fn write_synced(path: &Path, value: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

/// In-process records; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(key: &str, value: &str) -> Self {
        let storage = Self::default();
        if let Ok(mut records) = storage.records.lock() {
            records.insert(key.to_string(), value.to_string());
        }
        storage
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        Ok(records.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
