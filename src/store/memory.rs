//! Process-local store. Used in tests and as the fallback when the
//! session file cannot be opened.

use super::{poisoned, KeyValueStore, StorageChange, StoreCore, StoreError, Versioned};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    core: Mutex<StoreCore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Versioned>, StoreError> {
        let core = self.core.lock().map_err(|_| poisoned())?;
        Ok(core.get(keys))
    }

    fn set(&self, record: Map<String, Value>) -> Result<(), StoreError> {
        let mut core = self.core.lock().map_err(|_| poisoned())?;
        let staged = core.stage(&record);
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
