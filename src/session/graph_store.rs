//! Canonical owner of the persisted session graph.
//!
//! Mutations are read-modify-write with optimistic versioning: the session is
//! read together with its revision, changed in memory, and written back with
//! `compare_and_set`. A writer that loses the race re-reads and re-applies its
//! change, so a navigation and a concurrent annotation save both land.

use super::types::{PageNode, Session};
use crate::store::{KeyValueStore, StoreError, CURRENT_SESSION_KEY};
use std::sync::Arc;

/// Attempts before a contended update gives up
const MAX_UPDATE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct GraphStore {
    store: Arc<dyn KeyValueStore>,
}

impl GraphStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current session, or an empty one if nothing was ever stored
    pub fn load(&self) -> Result<Session, StoreError> {
        self.load_versioned().map(|(session, _)| session)
    }

    fn load_versioned(&self) -> Result<(Session, u64), StoreError> {
        let mut values = self.store.get(&[CURRENT_SESSION_KEY])?;
        match values.remove(CURRENT_SESSION_KEY) {
            Some(entry) => {
                let session = decode_session(entry.value)?;
                Ok((session, entry.revision))
            }
            None => Ok((Session::empty(), 0)),
        }
    }

    /// Overwrite the stored session unconditionally
    pub fn replace(&self, session: &Session) -> Result<(), StoreError> {
        let mut record = serde_json::Map::new();
        record.insert(
            CURRENT_SESSION_KEY.to_string(),
            serde_json::to_value(session)?,
        );
        self.store.set(record)
    }

    /// Apply `mutate` to the latest stored session and persist the result.
    ///
    /// `mutate` may run more than once if another writer commits in between,
    /// so it must only depend on the session it is given.
    pub fn update<F, T>(&self, mut mutate: F) -> Result<(Session, T), StoreError>
    where
        F: FnMut(&mut Session) -> T,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (mut session, revision) = self.load_versioned()?;
            let result = mutate(&mut session);
            let value = serde_json::to_value(&session)?;

            match self.store.compare_and_set(CURRENT_SESSION_KEY, revision, value) {
                Ok(_) => return Ok((session, result)),
                Err(StoreError::Conflict { .. }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    tracing::debug!("Session update conflicted (attempt {}), retrying", attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Set the notes of `node_id`.
    ///
    /// Returns `true` if an existing node was updated. If the node is not in
    /// the session, a minimal node carrying the annotation is appended and
    /// `false` is returned.
    pub fn set_annotation(&self, node_id: &str, title: &str, text: &str) -> Result<bool, StoreError> {
        let (_, updated) = self.update(|session| match session.node_mut(node_id) {
            Some(node) => {
                node.notes = text.to_string();
                true
            }
            None => {
                session.nodes.push(PageNode {
                    id: node_id.to_string(),
                    title: title.to_string(),
                    notes: text.to_string(),
                });
                false
            }
        })?;

        if updated {
            tracing::info!("Saved note for {}", node_id);
        } else {
            tracing::warn!("Annotated node {} was not in the session, appended it", node_id);
        }
        Ok(updated)
    }
}

/// Decode a stored session value
pub fn decode_session(value: serde_json::Value) -> Result<Session, StoreError> {
    // Never-initialized installs may hold `null`
    if value.is_null() {
        return Ok(Session::empty());
    }
    serde_json::from_value(value).map_err(|source| StoreError::Decode {
        key: CURRENT_SESSION_KEY.to_string(),
        source,
    })
}
