//! Main application state and UI.

use crate::graph::{truncate_label, ForceLayout, GraphState, LayoutNode};
use crate::interaction::{AnnotationPanel, PointerAction, PointerGestures, Viewport};
use crate::session::{GraphStore, SessionLifecycle, SessionState};
use crate::settings::Settings;
use crate::store::KeyValueStore;
use crate::theme::{self, bg, graph as graph_colors, state, stroke_width, text};
use eframe::egui::{self, Pos2, Rect, Stroke, Vec2};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;

/// Alpha the layout is raised to when the user changes physics settings
const TWEAK_ALPHA: f32 = 0.3;

/// Canvas size assumed until the first frame is laid out
const INITIAL_CANVAS: Vec2 = Vec2::new(1100.0, 800.0);

/// Main map application
pub struct MindMapApp {
    // Persistence
    graph_store: GraphStore,
    lifecycle: SessionLifecycle,
    store_label: String,
    store_error: Option<String>,
    /// Pings from the store watcher thread
    store_changes: Receiver<String>,

    // Session status
    session_state: SessionState,

    // Graph state
    graph: GraphState,
    layout: ForceLayout,

    // Viewport and pointer state
    viewport: Viewport,
    gestures: PointerGestures,
    annotation: Option<AnnotationPanel>,

    // Settings persistence
    settings: Settings,
    settings_dirty: bool,
    last_settings_save: Instant,
}

impl MindMapApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        store: Arc<dyn KeyValueStore>,
        store_label: String,
        settings: Settings,
    ) -> Self {
        Self::build(store, store_label, settings, Some(cc.egui_ctx.clone()))
    }

    /// Wire the app to `store`. With a context, store writes also wake the UI.
    pub(crate) fn build(
        store: Arc<dyn KeyValueStore>,
        store_label: String,
        settings: Settings,
        ctx: Option<egui::Context>,
    ) -> Self {
        let changes = store.subscribe();
        let (tx, rx) = mpsc::channel();
        let watcher = std::thread::Builder::new()
            .name("store-watch".into())
            .spawn(move || {
                for change in changes {
                    if tx.send(change.key).is_err() {
                        break;
                    }
                    if let Some(ctx) = &ctx {
                        ctx.request_repaint();
                    }
                }
            });
        if let Err(e) = watcher {
            tracing::error!("Failed to start store watcher, map will not live-update: {}", e);
        }

        let mut graph = GraphState::new(INITIAL_CANVAS);
        graph.physics_enabled = settings.physics_enabled;

        let mut app = Self {
            graph_store: GraphStore::new(store.clone()),
            lifecycle: SessionLifecycle::new(store),
            store_label,
            store_error: None,
            store_changes: rx,
            session_state: SessionState::Inactive,
            graph,
            layout: settings.layout(),
            viewport: Viewport::default(),
            gestures: PointerGestures::default(),
            annotation: None,
            settings,
            settings_dirty: false,
            last_settings_save: Instant::now(),
        };

        app.refresh();
        app
    }

    /// Reload session status and graph from the store
    fn refresh(&mut self) {
        self.store_error = None;

        match self.lifecycle.state() {
            Ok(state) => self.session_state = state,
            Err(e) => {
                tracing::warn!("Failed to read session state: {}", e);
                self.store_error = Some(e.to_string());
            }
        }

        // A failed load keeps the last good graph on screen
        match self.graph_store.load() {
            Ok(session) => {
                let added = self.graph.load(&session);
                if added > 0 {
                    tracing::debug!("Map picked up {} new pages", added);
                }
                let orphaned = self
                    .annotation
                    .as_ref()
                    .is_some_and(|panel| self.graph.get_node(&panel.node_id).is_none());
                if orphaned {
                    self.annotation = None;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to load session: {}", e);
                self.store_error = Some(e.to_string());
            }
        }
    }

    /// Drain store notifications; reload once if anything changed
    fn poll_store_changes(&mut self) -> bool {
        let changed = self.store_changes.try_iter().count() > 0;
        if changed {
            self.refresh();
        }
        changed
    }

    fn toggle_session(&mut self) {
        match self.lifecycle.toggle() {
            Ok(state) => {
                tracing::info!("Session {}", state.label());
                self.session_state = state;
            }
            Err(e) => {
                tracing::error!("Failed to toggle session: {}", e);
                self.store_error = Some(e.to_string());
            }
        }
    }

    /// Node id under a screen position
    fn hit_test(&self, rect: Rect, screen: Pos2) -> Option<String> {
        let pos = self.viewport.to_graph(rect, screen);
        self.graph
            .node_at(pos, self.settings.node_radius)
            .map(|n| n.id.clone())
    }

    fn apply_pointer(&mut self, action: PointerAction, rect: Rect) {
        match action {
            PointerAction::BeginDrag(id) => {
                self.layout.begin_drag(&mut self.graph, &id);
            }
            PointerAction::DragTo(id, screen) => {
                let pos = self.viewport.to_graph(rect, screen);
                self.layout.drag_to(&mut self.graph, &id, pos);
            }
            PointerAction::Pan(delta) => self.viewport.pan_by(delta),
            PointerAction::Release { id, clicked } => {
                self.layout.end_drag(&mut self.graph, &id);
                if clicked {
                    self.open_annotation(&id);
                }
            }
        }
    }

    fn open_annotation(&mut self, id: &str) {
        if let Some(node) = self.graph.get_node(id) {
            self.annotation = Some(AnnotationPanel::open(node));
            self.graph.selected_node = Some(id.to_string());
        }
    }

    fn save_annotation(&mut self) {
        let saved = match &mut self.annotation {
            Some(panel) => panel.save(&self.graph_store).is_ok(),
            None => false,
        };
        if saved {
            self.close_annotation();
        }
    }

    fn close_annotation(&mut self) {
        self.annotation = None;
        self.graph.selected_node = None;
    }

    /// Mark settings as needing to be saved and apply them to the layout
    fn mark_settings_dirty(&mut self) {
        self.settings_dirty = true;
        self.layout = self.settings.layout();
        self.graph.physics_enabled = self.settings.physics_enabled;
        self.layout.reheat(&mut self.graph, TWEAK_ALPHA);
    }

    fn maybe_save_settings(&mut self) {
        if self.settings_dirty && self.last_settings_save.elapsed().as_secs() >= 2 {
            self.settings.save();
            self.settings_dirty = false;
            self.last_settings_save = Instant::now();
        }
    }

    fn render_sidebar(&mut self, ui: &mut egui::Ui) {
        ui.heading("MindMeld");
        ui.add_space(10.0);

        // Session status
        ui.horizontal(|ui| {
            if self.session_state.is_active() {
                ui.colored_label(state::RECORDING, "● Recording");
                if ui.button("Stop").clicked() {
                    self.toggle_session();
                }
            } else {
                ui.colored_label(state::IDLE, "● Not recording");
                if ui.button("Start").clicked() {
                    self.toggle_session();
                }
            }
        });
        ui.label(
            egui::RichText::new(format!("Store: {}", self.store_label))
                .small()
                .color(text::SECONDARY),
        );

        if let Some(ref err) = self.store_error {
            ui.colored_label(state::ERROR, format!("Error: {}", err));
        }

        ui.add_space(10.0);

        egui::CollapsingHeader::new("Session")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(format!("Pages: {}", self.graph.nodes.len()));
                ui.label(format!("Navigations: {}", self.graph.links.len()));
                ui.label(format!("Sites: {}", self.graph.groups.len()));
                if let Some(last) = self.graph.last_visited.as_deref() {
                    let title = self
                        .graph
                        .get_node(last)
                        .map(|n| n.title.as_str())
                        .filter(|t| !t.is_empty())
                        .unwrap_or(last);
                    ui.label(format!("Last: {}", truncate_label(title, 32)));
                }
            });

        egui::CollapsingHeader::new("Display")
            .default_open(true)
            .show(ui, |ui| {
                let mut changed = false;
                changed |= ui
                    .add(egui::Slider::new(&mut self.settings.node_radius, 6.0..=40.0).text("Node size"))
                    .changed();
                changed |= ui.checkbox(&mut self.settings.show_labels, "Show labels").changed();
                changed |= ui.checkbox(&mut self.settings.show_arrows, "Show arrows").changed();
                if changed {
                    self.mark_settings_dirty();
                }
            });

        egui::CollapsingHeader::new("Physics")
            .default_open(false)
            .show(ui, |ui| {
                let s = &mut self.settings;
                let mut changed = ui.checkbox(&mut s.physics_enabled, "Simulate").changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.link_distance, 20.0..=400.0).text("Link distance"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.link_strength, 0.0..=1.0).text("Link strength"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.charge_strength, 0.0..=3000.0).text("Repulsion"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.collision_radius, 0.0..=80.0).text("Collision radius"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.cluster_strength, 0.0..=1.0).text("Site clustering"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.center_y_strength, 0.0..=0.5).text("Vertical pull"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut s.velocity_decay, 0.05..=0.95).text("Friction"))
                    .changed();

                ui.horizontal(|ui| {
                    if ui.button("Reheat").clicked() {
                        changed = true;
                    }
                    if ui.button("Defaults").clicked() {
                        self.settings.reset_physics();
                        changed = true;
                    }
                });

                if changed {
                    self.mark_settings_dirty();
                }
            });

        egui::CollapsingHeader::new("View")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(format!("Zoom: {:.0}%", self.viewport.zoom * 100.0));
                if ui.button("Reset view").clicked() {
                    self.viewport.reset();
                }
            });
    }

    fn render_graph(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        self.graph.set_canvas(rect.size());

        // Two-finger scroll pans, pinch or ctrl+scroll zooms toward the cursor
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta);
        let zoom_delta = ui.input(|i| i.zoom_delta());
        let hover_pos = response.hover_pos();

        if scroll_delta != Vec2::ZERO && response.hovered() {
            self.viewport.pan_by(scroll_delta);
        }
        if let Some(cursor) = hover_pos {
            if zoom_delta != 1.0 {
                self.viewport.zoom_at(rect, cursor, zoom_delta);
            }
        }

        // Press / drag / release
        let (pressed, released, pointer) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        if let Some(at) = pointer {
            if pressed && response.hovered() {
                let hit = self.hit_test(rect, at);
                if let Some(action) = self.gestures.press(hit, at) {
                    self.apply_pointer(action, rect);
                }
            } else if self.gestures.is_active() {
                if let Some(action) = self.gestures.move_to(at) {
                    self.apply_pointer(action, rect);
                }
            }
        }
        if released {
            if let Some(action) = self.gestures.release() {
                self.apply_pointer(action, rect);
            }
        }

        self.layout.step(&mut self.graph);

        // Hover follows the pointer unless something is held
        self.graph.hovered_node = match (self.gestures.dragged_node(), hover_pos) {
            (Some(id), _) => Some(id.to_string()),
            (None, Some(pos)) => self.hit_test(rect, pos),
            (None, None) => None,
        };

        let viewport = self.viewport;
        let zoom = viewport.zoom;
        let transform = |pos: Pos2| viewport.to_screen(rect, pos);
        let radius = self.settings.node_radius * zoom;

        // Edges first (behind nodes)
        let edge_stroke = Stroke::new(stroke_width::EDGE * zoom.max(0.5), graph_colors::EDGE);
        for link in &self.graph.links {
            let source = transform(self.graph.nodes[link.source].pos);

            if link.source == link.target {
                // Reload of the same page
                painter.circle_stroke(source + Vec2::new(0.0, -radius), radius * 0.6, edge_stroke);
                continue;
            }

            let target = transform(self.graph.nodes[link.target].pos);
            painter.line_segment([source, target], edge_stroke);

            if self.settings.show_arrows {
                let dir = (target - source).normalized();
                let arrow_size = 8.0 * zoom;
                let tip = target - dir * (radius + 2.0);
                let perp = Vec2::new(-dir.y, dir.x);

                painter.add(egui::Shape::convex_polygon(
                    vec![
                        tip,
                        tip - dir * arrow_size + perp * arrow_size * 0.5,
                        tip - dir * arrow_size - perp * arrow_size * 0.5,
                    ],
                    graph_colors::EDGE,
                    Stroke::NONE,
                ));
            }
        }

        for node in &self.graph.nodes {
            let screen_pos = transform(node.pos);
            let is_hovered = self.graph.hovered_node.as_deref() == Some(node.id.as_str());
            let is_selected = self.graph.selected_node.as_deref() == Some(node.id.as_str());

            painter.circle_filled(screen_pos, radius, self.graph.node_color(node));

            let border = if is_selected {
                theme::stroke(state::SELECTED, stroke_width::SELECTED)
            } else if is_hovered {
                theme::stroke(state::HOVER, stroke_width::HOVER)
            } else {
                theme::stroke(graph_colors::NODE_STROKE, stroke_width::NORMAL)
            };
            painter.circle_stroke(screen_pos, radius, border);

            if self.graph.last_visited.as_deref() == Some(node.id.as_str()) {
                painter.circle_stroke(
                    screen_pos,
                    radius + 4.0,
                    theme::stroke(graph_colors::CURSOR, stroke_width::NORMAL),
                );
            }

            // Annotated pages get a marker
            if !node.notes.is_empty() {
                painter.circle_filled(
                    screen_pos + Vec2::new(radius * 0.7, -radius * 0.7),
                    (radius * 0.25).max(2.0),
                    state::SELECTED,
                );
            }

            if self.settings.show_labels {
                painter.text(
                    screen_pos + Vec2::new(0.0, radius + 4.0),
                    egui::Align2::CENTER_TOP,
                    node.label(),
                    egui::FontId::proportional(12.0),
                    text::PRIMARY,
                );
            }
        }

        // Tooltip for hovered node
        if !self.gestures.is_active() {
            if let Some(node) = self.graph.hovered_node.as_deref().and_then(|id| self.graph.get_node(id)) {
                let tooltip_pos = transform(node.pos) + Vec2::new(radius + 10.0, 0.0);
                let galley = painter.layout_no_wrap(
                    tooltip_text(node),
                    egui::FontId::default(),
                    text::PRIMARY,
                );
                let tooltip_rect = Rect::from_min_size(tooltip_pos, galley.size() + Vec2::splat(16.0));

                painter.rect_filled(tooltip_rect, 4.0, bg::SURFACE);
                painter.rect_stroke(tooltip_rect, 4.0, Stroke::new(1.0, text::MUTED));
                painter.galley(tooltip_pos + Vec2::splat(8.0), galley, text::PRIMARY);
            }
        }

        if self.graph.nodes.is_empty() {
            let hint = if self.session_state.is_active() {
                "Recording. Browse to add pages."
            } else {
                "Press Start to record a browsing session."
            };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                hint,
                egui::FontId::proportional(20.0),
                text::MUTED,
            );
        }
    }

    fn render_annotation(&mut self, ctx: &egui::Context) {
        let mut open = true;
        let mut save = false;
        let mut close = false;

        if let Some(panel) = &mut self.annotation {
            egui::Window::new("Notes")
                .open(&mut open)
                .collapsible(false)
                .default_width(320.0)
                .frame(egui::Frame::window(&ctx.style()).fill(bg::SURFACE))
                .show(ctx, |ui| {
                    let title = if panel.title.is_empty() { &panel.node_id } else { &panel.title };
                    ui.label(egui::RichText::new(title).strong());
                    ui.label(egui::RichText::new(&panel.node_id).small().color(text::SECONDARY));
                    ui.add_space(6.0);
                    ui.add(
                        egui::TextEdit::multiline(&mut panel.text)
                            .desired_rows(6)
                            .desired_width(f32::INFINITY)
                            .hint_text("Notes about this page"),
                    );

                    if let Some(ref err) = panel.error {
                        ui.colored_label(state::ERROR, format!("Not saved: {}", err));
                    }

                    ui.horizontal(|ui| {
                        save = ui.button("Save").clicked();
                        close = ui.button("Close").clicked();
                    });
                });
        } else {
            return;
        }

        if save {
            self.save_annotation();
        } else if close || !open {
            self.close_annotation();
        }
    }
}

/// Hover text: title, URL and the first line of the notes
fn tooltip_text(node: &LayoutNode) -> String {
    let mut out = format!("{}\n{}", truncate_label(&node.title, 80), truncate_label(&node.id, 80));
    if let Some(first) = node.notes.lines().find(|l| !l.trim().is_empty()) {
        out.push_str("\n\n");
        out.push_str(&truncate_label(first.trim(), 80));
    }
    out
}

impl eframe::App for MindMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.maybe_save_settings();
        self.poll_store_changes();

        // Keep repainting while the layout is moving
        if self.graph.physics_enabled && !self.layout.is_settled(&self.graph) {
            ctx.request_repaint();
        }

        ctx.set_visuals(egui::Visuals::light());

        egui::SidePanel::left("sidebar")
            .min_width(240.0)
            .frame(egui::Frame::none().fill(bg::PANEL).inner_margin(egui::Margin::same(10.0)))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_sidebar(ui);
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(bg::GRAPH))
            .show(ctx, |ui| {
                self.render_graph(ui);
            });

        self.render_annotation(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Force save settings on exit
        if self.settings_dirty {
            self.settings.save();
        }
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
