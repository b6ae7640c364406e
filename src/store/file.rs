//! JSON-file-backed store.
//!
//! The whole keyspace is one pretty-printed JSON object. Every write goes to a
//! sibling temp file that is renamed over the original; memory is only
//! updated (and subscribers only notified) once the rename succeeded.

use super::{poisoned, KeyValueStore, StorageChange, StoreCore, StoreError, Versioned};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

pub struct FileStore {
    path: PathBuf,
    core: Mutex<StoreCore>,
}

impl FileStore {
    /// Default location: `<data dir>/mindmeld-native/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|mut p| {
            p.push("mindmeld-native");
            p.push("session.json");
            p
        })
    }

    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<HashMap<String, Versioned>>(&contents)
                .map_err(|source| StoreError::Decode {
                    key: path.display().to_string(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::info!("Opened session store at {:?} ({} keys)", path, entries.len());

        Ok(Self {
            path,
            core: Mutex::new(StoreCore::with_entries(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, Versioned>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(entries)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Versioned>, StoreError> {
        let core = self.core.lock().map_err(|_| poisoned())?;
        Ok(core.get(keys))
    }

    fn set(&self, record: Map<String, Value>) -> Result<(), StoreError> {
        let mut core = self.core.lock().map_err(|_| poisoned())?;
        let staged = core.stage(&record);
        self.persist(&staged)?;

        let changed: Vec<String> = record.keys().cloned().collect();
        core.commit(staged, &changed);
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected_revision: u64,
        value: Value,
    ) -> Result<u64, StoreError> {
        let mut core = self.core.lock().map_err(|_| poisoned())?;
        core.check_revision(key, expected_revision)?;

        let mut record = Map::new();
        record.insert(key.to_string(), value);
        let staged = core.stage(&record);
        self.persist(&staged)?;

        core.commit(staged, &[key.to_string()]);
        Ok(expected_revision + 1)
    }

    fn subscribe(&self) -> Receiver<StorageChange> {
        match self.core.lock() {
            Ok(mut core) => core.subscribe(),
            Err(err) => err.into_inner().subscribe(),
        }
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .core
            .lock()
            .map(|core| core.entries().len())
            .unwrap_or_default();
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("keys", &keys)
            .finish()
    }
}
