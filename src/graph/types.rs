//! Runtime layout state for the session map.

use crate::session::Session;
use egui::{Pos2, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Group for nodes whose id has no parseable host
pub const UNKNOWN_GROUP: &str = "unknown";

/// Energy a graph is raised to when new nodes or links arrive
pub const REHEAT_ALPHA: f32 = 0.5;

/// Jitter around a linked neighbor when seeding a new node
const NEIGHBOR_JITTER: f32 = 30.0;

/// Jitter around the canvas center when a new node has no placed neighbor
const CENTER_JITTER: f32 = 50.0;

/// Hostname used to cluster a page, `"unknown"` if the id is not a URL with a host.
pub fn group_for(id: &str) -> String {
    url::Url::parse(id)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}

/// A page as the layout sees it
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub group: String,
    /// Index of `group` in `GraphState::groups`
    pub group_slot: usize,
    pub pos: Pos2,
    pub vel: Vec2,
    /// Fixed position while dragged
    pub pinned: Option<Pos2>,
}

impl LayoutNode {
    /// Label text: title truncated to 30 characters
    pub fn label(&self) -> String {
        let text = if self.title.is_empty() { &self.id } else { &self.title };
        truncate_label(text, 30)
    }
}

/// Truncate to `max_chars`, replacing the tail with "..." when cut
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// A navigation edge resolved to node indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutLink {
    pub source: usize,
    pub target: usize,
}

/// Runtime graph state with positions
pub struct GraphState {
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<LayoutLink>,
    /// Node index lookup (id -> index in nodes)
    pub node_index: HashMap<String, usize>,
    /// Distinct hostnames in first-visit order
    pub groups: Vec<String>,
    /// Group colors (hostname -> hue)
    pub group_colors: HashMap<String, f32>,
    /// Size of the drawing area in graph units
    pub canvas: Vec2,
    /// Remaining motion; the simulation rests once it falls below the minimum
    pub alpha: f32,
    /// Value alpha decays toward (raised while dragging)
    pub alpha_target: f32,
    /// Is physics simulation running?
    pub physics_enabled: bool,
    /// Currently hovered node
    pub hovered_node: Option<String>,
    /// Currently selected node
    pub selected_node: Option<String>,
    /// Cursor of the session
    pub last_visited: Option<String>,
    rng: StdRng,
}

impl GraphState {
    pub fn new(canvas: Vec2) -> Self {
        Self::with_rng(canvas, StdRng::from_entropy())
    }

    /// Deterministic seeding, for tests
    pub fn with_seed(canvas: Vec2, seed: u64) -> Self {
        Self::with_rng(canvas, StdRng::seed_from_u64(seed))
    }

    fn with_rng(canvas: Vec2, rng: StdRng) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            node_index: HashMap::new(),
            groups: Vec::new(),
            group_colors: HashMap::new(),
            canvas,
            alpha: 1.0,
            alpha_target: 0.0,
            physics_enabled: true,
            hovered_node: None,
            selected_node: None,
            last_visited: None,
            rng,
        }
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(self.canvas.x / 2.0, self.canvas.y / 2.0)
    }

    pub fn set_canvas(&mut self, canvas: Vec2) {
        if canvas.x > 0.0 && canvas.y > 0.0 {
            self.canvas = canvas;
        }
    }

    /// Bring the layout in line with `session`.
    ///
    /// Nodes that already exist keep their position and velocity; new nodes
    /// are seeded next to a placed neighbor (or the canvas center). Nodes no
    /// longer in the session are dropped. Returns the number of added nodes.
    pub fn load(&mut self, session: &Session) -> usize {
        let mut previous: HashMap<String, LayoutNode> = self
            .nodes
            .drain(..)
            .map(|n| (n.id.clone(), n))
            .collect();

        // First pass: carry over known nodes
        let mut slots: Vec<Option<LayoutNode>> = session
            .nodes
            .iter()
            .map(|page| {
                previous.remove(&page.id).map(|mut node| {
                    node.title = page.title.clone();
                    node.notes = page.notes.clone();
                    node
                })
            })
            .collect();

        let index: HashMap<&str, usize> = session
            .nodes
            .iter()
            .enumerate()
            .map(|(i, page)| (page.id.as_str(), i))
            .collect();

        // Second pass: seed new nodes
        let mut added = 0;
        for (i, page) in session.nodes.iter().enumerate() {
            if slots[i].is_some() {
                continue;
            }

            let anchor = session
                .edges
                .iter()
                .filter_map(|e| {
                    if e.source == page.id {
                        index.get(e.target.as_str())
                    } else if e.target == page.id {
                        index.get(e.source.as_str())
                    } else {
                        None
                    }
                })
                .find_map(|&j| slots[j].as_ref().map(|n| n.pos));

            let pos = match anchor {
                Some(p) => p + self.jitter(NEIGHBOR_JITTER),
                None => self.center() + self.jitter(CENTER_JITTER),
            };

            slots[i] = Some(LayoutNode {
                id: page.id.clone(),
                title: page.title.clone(),
                notes: page.notes.clone(),
                group: group_for(&page.id),
                group_slot: 0,
                pos,
                vel: Vec2::ZERO,
                pinned: None,
            });
            added += 1;
        }

        self.nodes = slots.into_iter().flatten().collect();
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let old_links = self.links.len();
        self.links = session
            .edges
            .iter()
            .filter_map(|e| {
                Some(LayoutLink {
                    source: *self.node_index.get(&e.source)?,
                    target: *self.node_index.get(&e.target)?,
                })
            })
            .collect();

        self.rebuild_groups();
        self.last_visited = session.last_visited.clone();

        for id in [&mut self.hovered_node, &mut self.selected_node] {
            if id.as_ref().is_some_and(|id| !self.node_index.contains_key(id)) {
                *id = None;
            }
        }

        let removed = previous.len();
        if added > 0 || removed > 0 || self.links.len() != old_links {
            self.alpha = self.alpha.max(REHEAT_ALPHA);
        }

        added
    }

    fn rebuild_groups(&mut self) {
        self.groups.clear();
        for node in &mut self.nodes {
            let slot = match self.groups.iter().position(|g| *g == node.group) {
                Some(slot) => slot,
                None => {
                    self.groups.push(node.group.clone());
                    self.groups.len() - 1
                }
            };
            node.group_slot = slot;

            if !self.group_colors.contains_key(&node.group) {
                // Golden angle spacing for distinct hues
                let hue = (self.group_colors.len() as f32 * 137.5) % 360.0;
                self.group_colors.insert(node.group.clone(), hue);
            }
        }
    }

    fn jitter(&mut self, radius: f32) -> Vec2 {
        Vec2::new(
            self.rng.gen_range(-radius..=radius),
            self.rng.gen_range(-radius..=radius),
        )
    }

    /// Tiny random offset used to split coincident nodes
    pub(crate) fn jiggle(&mut self) -> f32 {
        (self.rng.gen::<f32>() - 0.5) * 1e-6
    }

    /// X coordinate of a group's cluster center: groups are evenly spaced over
    /// `[margin, width - margin]`; a single group sits in the middle.
    pub fn group_x(&self, slot: usize, margin: f32) -> f32 {
        let start = margin;
        let stop = self.canvas.x - margin;
        let n = self.groups.len();
        if n <= 1 {
            return (start + stop) / 2.0;
        }
        start + (stop - start) * slot as f32 / (n - 1) as f32
    }

    /// Get the position of a node
    pub fn get_pos(&self, id: &str) -> Option<Pos2> {
        self.get_node(id).map(|n| n.pos)
    }

    /// Get a node by ID
    pub fn get_node(&self, id: &str) -> Option<&LayoutNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut LayoutNode> {
        match self.node_index.get(id) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    /// Closest node whose center is within `radius` of `pos`
    pub fn node_at(&self, pos: Pos2, radius: f32) -> Option<&LayoutNode> {
        self.nodes
            .iter()
            .map(|n| (n, n.pos.distance(pos)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }

    /// Fill color for a node's group
    pub fn node_color(&self, node: &LayoutNode) -> egui::Color32 {
        let hue = self.group_colors.get(&node.group).copied().unwrap_or(0.0);
        hsl_to_rgb(hue, 0.65, 0.55)
    }
}

/// Convert HSL to RGB color
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> egui::Color32 {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    egui::Color32::from_rgb(
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}
