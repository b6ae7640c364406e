//! Turns completed navigations into session graph updates.

use super::graph_store::GraphStore;
use super::lifecycle::SessionLifecycle;
use super::types::{NavEdge, PageNode};
use crate::store::StoreError;

pub type TabId = u32;

/// Frame id of a tab's top-level document
pub const TOP_LEVEL_FRAME: u32 = 0;

/// A page finished loading in some frame of a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationEvent {
    pub tab_id: TabId,
    pub frame_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabInfo {
    pub url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("tab {0} no longer exists")]
    TabGone(TabId),
    #[error("access to tab {0} was denied")]
    PermissionDenied(TabId),
}

/// Resolves a tab id to its current URL and title.
pub trait TabLookup {
    fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, LookupError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SubFrame,
    Inactive,
    LookupFailed,
    NoUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Ignored(IgnoreReason),
    Recorded { node_added: bool, edge_added: bool },
}

#[derive(Clone)]
pub struct NavigationIngest {
    lifecycle: SessionLifecycle,
    graph: GraphStore,
}

impl NavigationIngest {
    pub fn new(lifecycle: SessionLifecycle, graph: GraphStore) -> Self {
        Self { lifecycle, graph }
    }

    /// Record one navigation.
    ///
    /// Events that should not be recorded come back as `Ignored`; only store
    /// failures are errors.
    pub fn handle(
        &self,
        event: NavigationEvent,
        tabs: &dyn TabLookup,
    ) -> Result<IngestOutcome, StoreError> {
        if event.frame_id != TOP_LEVEL_FRAME {
            return Ok(IngestOutcome::Ignored(IgnoreReason::SubFrame));
        }

        if !self.lifecycle.state()?.is_active() {
            return Ok(IngestOutcome::Ignored(IgnoreReason::Inactive));
        }

        let tab = match tabs.get_tab(event.tab_id) {
            Ok(tab) => tab,
            Err(e) => {
                tracing::debug!("Dropping navigation: {}", e);
                return Ok(IngestOutcome::Ignored(IgnoreReason::LookupFailed));
            }
        };

        let Some(url) = tab.url.filter(|u| !u.is_empty()) else {
            return Ok(IngestOutcome::Ignored(IgnoreReason::NoUrl));
        };
        let title = tab
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.clone());

        let (session, outcome) = self.graph.update(|session| {
            let node_added = session.add_node_if_missing(PageNode::new(url.clone(), title.clone()));

            let edge_added = match session.last_visited.take() {
                Some(previous) => session.add_edge_if_missing(NavEdge::new(previous, url.clone())),
                None => false,
            };

            // Revisits advance the cursor too
            session.last_visited = Some(url.clone());

            IngestOutcome::Recorded {
                node_added,
                edge_added,
            }
        })?;

        if let IngestOutcome::Recorded { node_added: true, .. } = outcome {
            tracing::info!("Added node {}", url);
        }
        tracing::debug!(
            "Session saved: {} nodes, {} edges, last visited {:?}",
            session.nodes.len(),
            session.edges.len(),
            session.last_visited
        );

        Ok(outcome)
    }
}
