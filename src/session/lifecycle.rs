//! Recording on/off switch.
//!
//! The state lives in the store (`isSessionActive`) rather than in memory so
//! the dispatcher thread and the UI always agree on it.

use super::types::Session;
use crate::store::{KeyValueStore, StoreError, CURRENT_SESSION_KEY, SESSION_ACTIVE_KEY};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        self == SessionState::Active
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Inactive => "Inactive",
            SessionState::Active => "Active",
        }
    }

    pub fn from_stored(value: &Value) -> Self {
        if value.as_bool().unwrap_or(false) {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }
}

#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn KeyValueStore>,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn state(&self) -> Result<SessionState, StoreError> {
        let values = self.store.get(&[SESSION_ACTIVE_KEY])?;
        Ok(values
            .get(SESSION_ACTIVE_KEY)
            .map(|entry| SessionState::from_stored(&entry.value))
            .unwrap_or_default())
    }

    /// Start recording. Always discards the previous session.
    pub fn activate(&self) -> Result<(), StoreError> {
        let mut record = Map::new();
        record.insert(SESSION_ACTIVE_KEY.to_string(), Value::Bool(true));
        record.insert(
            CURRENT_SESSION_KEY.to_string(),
            serde_json::to_value(Session::empty())?,
        );
        self.store.set(record)?;
        tracing::info!("Session started");
        Ok(())
    }

    /// Stop recording. The last session stays stored and visible.
    pub fn deactivate(&self) -> Result<(), StoreError> {
        let mut record = Map::new();
        record.insert(SESSION_ACTIVE_KEY.to_string(), Value::Bool(false));
        self.store.set(record)?;
        tracing::info!("Session stopped");
        Ok(())
    }

    pub fn set_active(&self, active: bool) -> Result<SessionState, StoreError> {
        if active {
            self.activate()?;
            Ok(SessionState::Active)
        } else {
            self.deactivate()?;
            Ok(SessionState::Inactive)
        }
    }

    /// Flip the current state and return the new one
    pub fn toggle(&self) -> Result<SessionState, StoreError> {
        let current = self.state()?;
        self.set_active(!current.is_active())
    }

    /// First-run initialization: write the default keys if they were never
    /// written. Existing data is left alone.
    pub fn install_defaults(&self) -> Result<bool, StoreError> {
        let existing = self.store.get(&[SESSION_ACTIVE_KEY, CURRENT_SESSION_KEY])?;

        let mut record = Map::new();
        if !existing.contains_key(SESSION_ACTIVE_KEY) {
            record.insert(SESSION_ACTIVE_KEY.to_string(), Value::Bool(false));
        }
        if !existing.contains_key(CURRENT_SESSION_KEY) {
            record.insert(
                CURRENT_SESSION_KEY.to_string(),
                serde_json::to_value(Session::empty())?,
            );
        }

        if record.is_empty() {
            return Ok(false);
        }
        self.store.set(record)?;
        tracing::info!("Initialized session storage");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::graph_store::GraphStore;
    use crate::session::types::PageNode;
    use crate::store::MemoryStore;

    fn setup() -> (SessionLifecycle, GraphStore) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (SessionLifecycle::new(store.clone()), GraphStore::new(store))
    }

    fn seed(graph: &GraphStore) {
        let mut session = Session::empty();
        session.add_node_if_missing(PageNode::new("http://a.com/", "A"));
        session.last_visited = Some("http://a.com/".into());
        graph.replace(&session).unwrap();
    }

    #[test]
    fn starts_inactive() {
        let (lifecycle, _) = setup();
        assert_eq!(lifecycle.state().unwrap(), SessionState::Inactive);
    }

    #[test]
    fn activation_resets_the_graph() {
        let (lifecycle, graph) = setup();
        seed(&graph);

        lifecycle.activate().unwrap();
        assert_eq!(lifecycle.state().unwrap(), SessionState::Active);
        assert!(graph.load().unwrap().is_empty());
    }

    #[test]
    fn deactivation_keeps_the_graph() {
        let (lifecycle, graph) = setup();
        lifecycle.activate().unwrap();
        seed(&graph);

        lifecycle.deactivate().unwrap();
        assert_eq!(lifecycle.state().unwrap(), SessionState::Inactive);
        assert_eq!(graph.load().unwrap().nodes.len(), 1);
    }

    #[test]
    fn toggle_flips_and_applies_side_effects() {
        let (lifecycle, graph) = setup();
        seed(&graph);

        assert_eq!(lifecycle.toggle().unwrap(), SessionState::Active);
        assert!(graph.load().unwrap().is_empty());
        assert_eq!(lifecycle.toggle().unwrap(), SessionState::Inactive);
        assert_eq!(lifecycle.state().unwrap(), SessionState::Inactive);
    }

    #[test]
    fn install_defaults_only_fills_missing_keys() {
        let (lifecycle, graph) = setup();
        assert!(lifecycle.install_defaults().unwrap());
        assert!(!lifecycle.install_defaults().unwrap());

        lifecycle.activate().unwrap();
        seed(&graph);
        assert!(!lifecycle.install_defaults().unwrap());
        assert_eq!(lifecycle.state().unwrap(), SessionState::Active);
        assert_eq!(graph.load().unwrap().nodes.len(), 1);
    }
}
