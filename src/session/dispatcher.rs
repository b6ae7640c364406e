//! Single ordered consumer of everything the browser tells us.

use super::graph_store::GraphStore;
use super::ingest::{
    IngestOutcome, LookupError, NavigationEvent, NavigationIngest, TabId, TabInfo, TabLookup,
};
use super::lifecycle::SessionLifecycle;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Messages forwarded by the browser side, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    TabRemoved {
        tab_id: TabId,
    },
    NavigationCompleted {
        tab_id: TabId,
        #[serde(default)]
        frame_id: u32,
    },
    /// Flip recording, or set it when `value` is given
    ToggleSession {
        #[serde(default)]
        value: Option<bool>,
    },
}

/// Last known URL and title of every open tab
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<TabId, TabInfo>,
}

impl TabRegistry {
    pub fn upsert(&mut self, tab_id: TabId, url: Option<String>, title: Option<String>) {
        let tab = self.tabs.entry(tab_id).or_default();
        // Partial updates keep what we already knew
        if url.is_some() {
            tab.url = url;
        }
        if title.is_some() {
            tab.title = title;
        }
    }

    pub fn remove(&mut self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
    }
}

impl TabLookup for TabRegistry {
    fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, LookupError> {
        self.tabs
            .get(&tab_id)
            .cloned()
            .ok_or(LookupError::TabGone(tab_id))
    }
}

pub struct Dispatcher {
    lifecycle: SessionLifecycle,
    ingest: NavigationIngest,
    tabs: TabRegistry,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let lifecycle = SessionLifecycle::new(store.clone());
        let graph = GraphStore::new(store);
        Self {
            ingest: NavigationIngest::new(lifecycle.clone(), graph),
            lifecycle,
            tabs: TabRegistry::default(),
        }
    }

    /// Apply one message. Failures are logged here and never propagate.
    pub fn dispatch(&mut self, message: HostMessage) -> Option<IngestOutcome> {
        match message {
            HostMessage::TabUpdated { tab_id, url, title } => {
                self.tabs.upsert(tab_id, url, title);
                None
            }
            HostMessage::TabRemoved { tab_id } => {
                self.tabs.remove(tab_id);
                None
            }
            HostMessage::NavigationCompleted { tab_id, frame_id } => {
                let event = NavigationEvent { tab_id, frame_id };
                match self.ingest.handle(event, &self.tabs) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        tracing::error!("Failed to record navigation in tab {}: {}", tab_id, e);
                        None
                    }
                }
            }
            HostMessage::ToggleSession { value } => {
                let result = match value {
                    Some(active) => self.lifecycle.set_active(active),
                    None => self.lifecycle.toggle(),
                };
                if let Err(e) = result {
                    tracing::error!("Failed to toggle session: {}", e);
                }
                None
            }
        }
    }

    /// Consume messages until every sender is gone
    pub fn run(mut self, rx: Receiver<HostMessage>) {
        for message in rx {
            tracing::trace!("Dispatching {:?}", message);
            self.dispatch(message);
        }
        tracing::info!("Host channel closed, dispatcher exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ingest::IgnoreReason;
    use crate::session::lifecycle::SessionState;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (Dispatcher, GraphStore, SessionLifecycle) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (
            Dispatcher::new(store.clone()),
            GraphStore::new(store.clone()),
            SessionLifecycle::new(store),
        )
    }

    fn navigate(tab_id: TabId, url: &str, title: &str) -> [HostMessage; 2] {
        [
            HostMessage::TabUpdated {
                tab_id,
                url: Some(url.to_string()),
                title: Some(title.to_string()),
            },
            HostMessage::NavigationCompleted { tab_id, frame_id: 0 },
        ]
    }

    #[test]
    fn parses_host_lines() {
        let msg: HostMessage = serde_json::from_value(json!({
            "type": "navigation_completed",
            "tab_id": 4,
            "frame_id": 0
        }))
        .unwrap();
        assert_eq!(msg, HostMessage::NavigationCompleted { tab_id: 4, frame_id: 0 });

        let msg: HostMessage = serde_json::from_value(json!({"type": "toggle_session"})).unwrap();
        assert_eq!(msg, HostMessage::ToggleSession { value: None });

        let msg: HostMessage =
            serde_json::from_value(json!({"type": "tab_updated", "tab_id": 1, "title": "T"})).unwrap();
        assert_eq!(
            msg,
            HostMessage::TabUpdated {
                tab_id: 1,
                url: None,
                title: Some("T".into())
            }
        );
    }

    #[test]
    fn records_navigation_across_tabs_in_order() {
        let (mut dispatcher, graph, _) = setup();
        dispatcher.dispatch(HostMessage::ToggleSession { value: Some(true) });

        for msg in navigate(1, "http://a.com/", "A")
            .into_iter()
            .chain(navigate(2, "http://b.com/", "B"))
        {
            dispatcher.dispatch(msg);
        }

        let session = graph.load().unwrap();
        assert_eq!(session.nodes.len(), 2);
        assert_eq!(session.edges.len(), 1);
        assert_eq!(session.last_visited.as_deref(), Some("http://b.com/"));
    }

    #[test]
    fn removed_tab_drops_navigation() {
        let (mut dispatcher, graph, _) = setup();
        dispatcher.dispatch(HostMessage::ToggleSession { value: None });
        let [update, _] = navigate(1, "http://a.com/", "A");
        dispatcher.dispatch(update);
        dispatcher.dispatch(HostMessage::TabRemoved { tab_id: 1 });

        let outcome = dispatcher.dispatch(HostMessage::NavigationCompleted { tab_id: 1, frame_id: 0 });
        assert_eq!(outcome, Some(IngestOutcome::Ignored(IgnoreReason::LookupFailed)));
        assert!(graph.load().unwrap().is_empty());
    }

    #[test]
    fn toggle_message_drives_lifecycle() {
        let (mut dispatcher, _, lifecycle) = setup();
        dispatcher.dispatch(HostMessage::ToggleSession { value: None });
        assert_eq!(lifecycle.state().unwrap(), SessionState::Active);
        dispatcher.dispatch(HostMessage::ToggleSession { value: Some(false) });
        assert_eq!(lifecycle.state().unwrap(), SessionState::Inactive);
    }

    #[test]
    fn partial_tab_update_keeps_known_url() {
        let mut registry = TabRegistry::default();
        registry.upsert(1, Some("http://a.com/".into()), None);
        registry.upsert(1, None, Some("Loaded".into()));

        let tab = registry.get_tab(1).unwrap();
        assert_eq!(tab.url.as_deref(), Some("http://a.com/"));
        assert_eq!(tab.title.as_deref(), Some("Loaded"));
    }
}
