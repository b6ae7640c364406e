//! Persisted session graph: pages, navigations and the cursor.

use serde::{Deserialize, Serialize};

/// A visited page. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl PageNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            notes: String::new(),
        }
    }

    /// Title if present, otherwise the URL
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// A directed navigation from one page to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavEdge {
    pub source: String,
    pub target: String,
}

impl NavEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// The browsing-session graph, stored under `currentSession`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub nodes: Vec<PageNode>,
    #[serde(default)]
    pub edges: Vec<NavEdge>,
    #[serde(default)]
    pub last_visited: Option<String>,
}

impl Session {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.last_visited.is_none()
    }

    pub fn node(&self, id: &str) -> Option<&PageNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut PageNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Append `node` unless a node with the same id exists.
    /// Returns whether it was inserted.
    pub fn add_node_if_missing(&mut self, node: PageNode) -> bool {
        if self.node(&node.id).is_some() {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Append `edge` unless the same (source, target) pair exists.
    /// The reverse direction counts as a different edge.
    pub fn add_edge_if_missing(&mut self, edge: NavEdge) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }
}
