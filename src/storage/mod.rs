//! Persistence service for the app envelope (history, analytics, settings).
//!
//! The envelope is stored as one JSON document under [`STORAGE_KEY`] in a
//! key/value [`StorageBackend`]. [`AppStore`] is the single owner: it loads (or
//! defaults) once in [`AppStore::open`] and writes back on [`AppStore::flush`].
//! Callers share it as [`SharedStore`] and hold only derived copies.

pub mod migration;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analytics::Analytics;
use crate::history::HistoryItem;
use crate::settings::Settings;

pub use migration::STORAGE_VERSION;

/// Key the envelope is stored under.
pub const STORAGE_KEY: &str = "screenreader-cv-data";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Top-level persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStorage {
    pub history: Vec<HistoryItem>,
    pub analytics: Analytics,
    pub settings: Settings,
    pub version: String,
}

impl Default for AppStorage {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            analytics: Analytics::default(),
            settings: Settings::default(),
            version: STORAGE_VERSION.to_string(),
        }
    }
}

/// String key/value persistence, the local-storage equivalent.
pub trait StorageBackend: Send {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory. Writes go through a temp
/// file and a rename so a crash never leaves a half-written envelope.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(?path, "Storage file does not exist");
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        debug!(?path, bytes = value.len(), "Storage file written");
        Ok(())
    }
}

/// In-process backend. Clones share the same map, so a test can reopen a store
/// on "the same disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut entries) = storage.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        storage
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Owner of the in-memory envelope and its backend.
pub struct AppStore {
    backend: Box<dyn StorageBackend>,
    data: AppStorage,
    dirty: bool,
}

/// How the store is shared between the controller and command handlers.
pub type SharedStore = Arc<Mutex<AppStore>>;

impl AppStore {
    /// Loads the envelope, or starts from defaults if it is missing or corrupt.
    ///
    /// Corrupt data is dropped, not preserved; an older schema is migrated and
    /// marked dirty so the next flush rewrites it.
    pub fn open(backend: Box<dyn StorageBackend>) -> Self {
        let (data, dirty) = match backend.read(STORAGE_KEY) {
            Ok(Some(raw)) => match migration::parse_envelope(&raw) {
                Ok(migrated) => {
                    if !migrated.rejected.is_empty() {
                        warn!(
                            rejected = migrated.rejected.len(),
                            "Some stored values were invalid and reset to defaults"
                        );
                    }
                    let rewrite = migrated.upgraded || !migrated.rejected.is_empty();
                    (migrated.data, rewrite)
                }
                Err(err) => {
                    warn!(error = %err, "Stored app data is corrupt, starting fresh");
                    (AppStorage::default(), false)
                }
            },
            Ok(None) => {
                debug!("No stored app data, using defaults");
                (AppStorage::default(), false)
            }
            Err(err) => {
                warn!(error = %err, "Failed to read stored app data, starting fresh");
                (AppStorage::default(), false)
            }
        };

        info!(
            history = data.history.len(),
            total_processed = data.analytics.total_processed,
            version = %data.version,
            "App data loaded"
        );
        Self {
            backend,
            data,
            dirty,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn data(&self) -> &AppStorage {
        &self.data
    }

    /// Mutable access; marks the store dirty.
    pub(crate) fn data_mut(&mut self) -> &mut AppStorage {
        self.dirty = true;
        &mut self.data
    }

    /// Swaps the whole envelope, returning the previous one.
    pub(crate) fn replace_data(&mut self, data: AppStorage) -> AppStorage {
        self.dirty = true;
        std::mem::replace(&mut self.data, data)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the envelope to the backend.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.data)?;
        self.backend.write(STORAGE_KEY, &json)?;
        self.dirty = false;
        debug!(bytes = json.len(), "App data flushed");
        Ok(())
    }

    /// Flushes only if something changed since the last flush.
    pub fn flush_if_dirty(&mut self) -> Result<(), StorageError> {
        if self.dirty {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::sample_item;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "screenreader-cv-{name}-{}",
            nanoid::nanoid!(8)
        ))
    }

    #[test]
    fn test_missing_data_uses_defaults() {
        let store = AppStore::open(Box::new(MemoryStorage::new()));
        assert_eq!(store.data(), &AppStorage::default());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_corrupt_data_falls_back_to_defaults() {
        let backend = MemoryStorage::with_entry(STORAGE_KEY, "{not json");
        let store = AppStore::open(Box::new(backend));
        assert_eq!(store.data(), &AppStorage::default());
    }

    #[test]
    fn test_one_bad_setting_keeps_stored_history() {
        let backend = MemoryStorage::new();
        let mut store = AppStore::open(Box::new(backend.clone()));
        store.append(sample_item("do not lose me"));
        store.flush().unwrap();

        let mut stored: serde_json::Value =
            serde_json::from_str(&backend.read(STORAGE_KEY).unwrap().unwrap()).unwrap();
        stored["settings"]["defaultEngine"] = serde_json::json!("paddle");
        let mut writer = backend.clone();
        writer.write(STORAGE_KEY, &stored.to_string()).unwrap();

        let reopened = AppStore::open(Box::new(backend));
        assert_eq!(reopened.history(), store.history());
        assert_eq!(reopened.data().analytics, store.data().analytics);
        assert_eq!(reopened.settings(), &Settings::default());
        assert!(reopened.is_dirty());
    }

    #[test]
    fn test_flush_then_reopen_restores_state() {
        let backend = MemoryStorage::new();
        let mut store = AppStore::open(Box::new(backend.clone()));
        store.append(sample_item("persist me"));
        assert!(store.is_dirty());
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reopened = AppStore::open(Box::new(backend));
        assert_eq!(reopened.data(), store.data());
    }

    #[test]
    fn test_file_storage_writes_atomically() {
        let dir = temp_dir("file");
        let mut storage = FileStorage::new(&dir);
        assert_eq!(storage.read("k").unwrap(), None);

        storage.write("k", "{\"a\":1}").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(!storage.path_for("k").with_extension("json.tmp").exists());

        let mut store = AppStore::open(Box::new(FileStorage::new(&dir)));
        store.append(sample_item("on disk"));
        store.flush().unwrap();
        let reopened = AppStore::open(Box::new(FileStorage::new(&dir)));
        assert_eq!(reopened.history()[0].result.text, "on disk");

        let _ = fs::remove_dir_all(&dir);
    }
}
