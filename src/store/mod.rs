//! Versioned key/value storage shared by every surface of the app.
//!
//! All cross-thread state lives here. Writers either replace keys outright
//! (`set`, last-write-wins) or use `compare_and_set` against the revision they
//! read, which is how the session graph avoids lost updates.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

/// Key holding the recording flag (`bool`).
pub const SESSION_ACTIVE_KEY: &str = "isSessionActive";

/// Key holding the serialized session graph.
pub const CURRENT_SESSION_KEY: &str = "currentSession";

/// A stored value together with its write counter.
///
/// Revision 0 is reserved for "never written".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    pub revision: u64,
    pub value: Value,
}

/// Notification sent to subscribers after every committed write
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("revision conflict on `{key}`: expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },
    #[error("storage file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed value for `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistent key/value store with change notifications.
pub trait KeyValueStore: Send + Sync {
    /// Read several keys at once. Keys that were never written are omitted.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Versioned>, StoreError>;

    /// Write every key of `record` in one atomic step, unconditionally.
    fn set(&self, record: Map<String, Value>) -> Result<(), StoreError>;

    /// Write `key` only if its current revision is `expected_revision`.
    /// Returns the new revision.
    fn compare_and_set(
        &self,
        key: &str,
        expected_revision: u64,
        value: Value,
    ) -> Result<u64, StoreError>;

    /// Receive a `StorageChange` for every write made after this call.
    fn subscribe(&self) -> Receiver<StorageChange>;
}

/// In-memory keyspace plus subscriber list, shared by both store backends.
#[derive(Default)]
pub(crate) struct StoreCore {
    entries: HashMap<String, Versioned>,
    subscribers: Vec<Sender<StorageChange>>,
}

impl StoreCore {
    pub(crate) fn with_entries(entries: HashMap<String, Versioned>) -> Self {
        Self {
            entries,
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn entries(&self) -> &HashMap<String, Versioned> {
        &self.entries
    }

    pub(crate) fn get(&self, keys: &[&str]) -> HashMap<String, Versioned> {
        keys.iter()
            .filter_map(|key| {
                self.entries
                    .get(*key)
                    .map(|entry| (key.to_string(), entry.clone()))
            })
            .collect()
    }

    pub(crate) fn revision(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(0, |e| e.revision)
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<StorageChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Stage `record` on top of the current entries without committing.
    pub(crate) fn stage(&self, record: &Map<String, Value>) -> HashMap<String, Versioned> {
        let mut staged = self.entries.clone();
        for (key, value) in record {
            let revision = self.revision(key) + 1;
            staged.insert(
                key.clone(),
                Versioned {
                    revision,
                    value: value.clone(),
                },
            );
        }
        staged
    }

    /// Swap in a staged keyspace and notify subscribers about `changed` keys.
    pub(crate) fn commit(&mut self, staged: HashMap<String, Versioned>, changed: &[String]) {
        let old = std::mem::replace(&mut self.entries, staged);

        for key in changed {
            let change = StorageChange {
                key: key.clone(),
                old_value: old.get(key).map(|e| e.value.clone()),
                new_value: self.entries.get(key).map(|e| e.value.clone()),
            };
            // Drop subscribers whose receiver has gone away
            self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        }
    }

    pub(crate) fn check_revision(&self, key: &str, expected: u64) -> Result<(), StoreError> {
        let found = self.revision(key);
        if found != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}
