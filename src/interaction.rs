//! Pointer handling for the map: viewport transform, press/drag/click
//! gestures and the annotation editor.

use crate::graph::LayoutNode;
use crate::session::GraphStore;
use crate::store::StoreError;
use egui::{Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;

/// Pan and zoom of the map.
///
/// Graph space has its origin at the canvas' top-left corner and the same
/// size as the canvas, so at zoom 1 with no pan the two coincide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    fn graph_center(rect: Rect) -> Pos2 {
        Pos2::new(rect.width() / 2.0, rect.height() / 2.0)
    }

    pub fn to_screen(&self, rect: Rect, p: Pos2) -> Pos2 {
        rect.center() + (p - Self::graph_center(rect)) * self.zoom + self.pan
    }

    pub fn to_graph(&self, rect: Rect, s: Pos2) -> Pos2 {
        Self::graph_center(rect) + (s - rect.center() - self.pan) / self.zoom
    }

    /// Zoom by `factor`, keeping the graph point under `cursor` fixed
    pub fn zoom_at(&mut self, rect: Rect, cursor: Pos2, factor: f32) {
        let anchor = self.to_graph(rect, cursor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = cursor - rect.center() - (anchor - Self::graph_center(rect)) * self.zoom;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What the map should do in response to pointer input
#[derive(Debug, Clone, PartialEq)]
pub enum PointerAction {
    /// Pin the node and warm the layout
    BeginDrag(String),
    /// Move the pinned node to a screen position
    DragTo(String, Pos2),
    /// Move the view
    Pan(Vec2),
    /// Unpin the node; `clicked` when the pointer never moved
    Release { id: String, clicked: bool },
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Gesture {
    #[default]
    Idle,
    Node {
        id: String,
        origin: Pos2,
        moved: bool,
    },
    Pan {
        last: Pos2,
    },
}

/// Press/move/release state machine for the canvas
#[derive(Debug, Default)]
pub struct PointerGestures {
    gesture: Gesture,
}

impl PointerGestures {
    /// Pointer went down over `hit` (a node id) or empty canvas
    pub fn press(&mut self, hit: Option<String>, at: Pos2) -> Option<PointerAction> {
        match hit {
            Some(id) => {
                self.gesture = Gesture::Node {
                    id: id.clone(),
                    origin: at,
                    moved: false,
                };
                Some(PointerAction::BeginDrag(id))
            }
            None => {
                self.gesture = Gesture::Pan { last: at };
                None
            }
        }
    }

    pub fn move_to(&mut self, at: Pos2) -> Option<PointerAction> {
        match &mut self.gesture {
            Gesture::Idle => None,
            Gesture::Node { id, origin, moved } => {
                if at == *origin && !*moved {
                    return None;
                }
                *moved = true;
                Some(PointerAction::DragTo(id.clone(), at))
            }
            Gesture::Pan { last } => {
                let delta = at - *last;
                *last = at;
                (delta != Vec2::ZERO).then_some(PointerAction::Pan(delta))
            }
        }
    }

    pub fn release(&mut self) -> Option<PointerAction> {
        match std::mem::take(&mut self.gesture) {
            Gesture::Node { id, moved, .. } => Some(PointerAction::Release { id, clicked: !moved }),
            Gesture::Pan { .. } | Gesture::Idle => None,
        }
    }

    /// Node currently held, if any
    pub fn dragged_node(&self) -> Option<&str> {
        match &self.gesture {
            Gesture::Node { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }
}

/// Free-text note editor for one node
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPanel {
    pub node_id: String,
    pub title: String,
    pub text: String,
    /// Last save failure, shown in the panel
    pub error: Option<String>,
}

impl AnnotationPanel {
    pub fn open(node: &LayoutNode) -> Self {
        Self {
            node_id: node.id.clone(),
            title: node.title.clone(),
            text: node.notes.clone(),
            error: None,
        }
    }

    /// Commit the text. On failure the error is kept for display and the
    /// panel should stay open.
    pub fn save(&mut self, graph: &GraphStore) -> Result<bool, StoreError> {
        match graph.set_annotation(&self.node_id, &self.title, &self.text) {
            Ok(updated) => {
                self.error = None;
                Ok(updated)
            }
            Err(e) => {
                tracing::error!("Failed to save note for {}: {}", self.node_id, e);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
