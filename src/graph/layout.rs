//! Force-directed layout for the session map.
//!
//! Each step cools `alpha` toward its target and then applies, in order:
//! - Link springs toward a rest length, split by endpoint degree
//! - Many-body repulsion via Barnes-Hut
//! - Centering of the centroid on the canvas
//! - Collision separation
//! - Horizontal pull toward the node's hostname column
//! - Vertical pull toward the canvas middle
//!
//! Velocities are then damped and integrated; dragged nodes stay pinned.

use super::quadtree::Quadtree;
use super::types::GraphState;
use egui::{Pos2, Vec2};

/// Force-directed layout parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ForceLayout {
    /// Rest length of a link
    pub link_distance: f32,
    pub link_strength: f32,
    /// Many-body repulsion strength
    pub charge_strength: f32,
    /// Barnes-Hut accuracy threshold
    pub theta: f32,
    /// Minimum distance used by the charge force
    pub min_distance: f32,
    /// Strength of the centroid recentering (0 disables)
    pub center_strength: f32,
    /// Node radius for collision
    pub collision_radius: f32,
    /// Pull toward the hostname column
    pub cluster_strength: f32,
    /// Horizontal padding of the hostname columns
    pub cluster_margin: f32,
    /// Pull toward the vertical middle
    pub center_y_strength: f32,
    /// Fraction of velocity lost per step
    pub velocity_decay: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    /// Alpha target while a node is dragged
    pub drag_alpha_target: f32,
    /// Maximum velocity
    pub max_velocity: f32,
}

impl Default for ForceLayout {
    fn default() -> Self {
        let alpha_min = 0.001_f32;
        Self {
            link_distance: 140.0,
            link_strength: 0.6,
            charge_strength: 600.0,
            theta: 0.9,
            min_distance: 1.0,
            center_strength: 1.0,
            collision_radius: 26.0,
            cluster_strength: 0.25,
            cluster_margin: 100.0,
            center_y_strength: 0.05,
            velocity_decay: 0.4,
            alpha_min,
            // Reaches alpha_min from 1.0 in about 300 steps
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            drag_alpha_target: 0.3,
            max_velocity: 50.0,
        }
    }
}

impl ForceLayout {
    /// Run one iteration of the force simulation
    pub fn step(&self, state: &mut GraphState) {
        if !state.physics_enabled || state.nodes.is_empty() || self.is_settled(state) {
            return;
        }

        state.alpha += (state.alpha_target - state.alpha) * self.alpha_decay;
        let alpha = state.alpha;

        self.apply_links(state, alpha);
        self.apply_charge(state, alpha);
        self.apply_center(state);
        self.apply_collision(state);
        self.apply_cluster(state, alpha);

        let center_y = state.canvas.y / 2.0;
        for node in &mut state.nodes {
            node.vel.y += (center_y - node.pos.y) * self.center_y_strength * alpha;
        }

        let keep = 1.0 - self.velocity_decay;
        for node in &mut state.nodes {
            if let Some(pin) = node.pinned {
                node.pos = pin;
                node.vel = Vec2::ZERO;
                continue;
            }

            node.vel *= keep;
            if node.vel.length() > self.max_velocity {
                node.vel = node.vel.normalized() * self.max_velocity;
            }
            node.pos += node.vel;
        }
    }

    /// The simulation rests once alpha has cooled and nothing is holding it warm
    pub fn is_settled(&self, state: &GraphState) -> bool {
        state.alpha < self.alpha_min && state.alpha_target < self.alpha_min
    }

    /// Restart the simulation at `alpha` if it has cooled below it
    pub fn reheat(&self, state: &mut GraphState, alpha: f32) {
        state.alpha = state.alpha.max(alpha);
    }

    /// Pin a node under the pointer and keep the simulation warm
    pub fn begin_drag(&self, state: &mut GraphState, id: &str) -> bool {
        let Some(node) = state.get_node_mut(id) else {
            return false;
        };
        node.pinned = Some(node.pos);
        state.alpha_target = self.drag_alpha_target;
        true
    }

    /// Move a pinned node; it follows the pointer even while physics is off
    pub fn drag_to(&self, state: &mut GraphState, id: &str, pos: Pos2) {
        if let Some(node) = state.get_node_mut(id) {
            node.pinned = Some(pos);
            node.pos = pos;
            node.vel = Vec2::ZERO;
        }
    }

    /// Release the pin and let the simulation cool again
    pub fn end_drag(&self, state: &mut GraphState, id: &str) {
        if let Some(node) = state.get_node_mut(id) {
            node.pinned = None;
        }
        state.alpha_target = 0.0;
    }

    fn apply_links(&self, state: &mut GraphState, alpha: f32) {
        let mut degree = vec![0u32; state.nodes.len()];
        for link in &state.links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        for i in 0..state.links.len() {
            let link = state.links[i];
            // A self-loop pulls a node onto itself and nets to zero
            if link.source == link.target {
                continue;
            }

            let (s, t) = (&state.nodes[link.source], &state.nodes[link.target]);
            let mut delta = (t.pos + t.vel) - (s.pos + s.vel);
            if delta.x == 0.0 {
                delta.x = state.jiggle();
            }
            if delta.y == 0.0 {
                delta.y = state.jiggle();
            }

            let length = delta.length();
            let pull = delta * ((length - self.link_distance) / length * alpha * self.link_strength);

            // The better connected endpoint moves less
            let (ds, dt) = (degree[link.source] as f32, degree[link.target] as f32);
            let bias = ds / (ds + dt);

            state.nodes[link.target].vel -= pull * bias;
            state.nodes[link.source].vel += pull * (1.0 - bias);
        }
    }

    fn apply_charge(&self, state: &mut GraphState, alpha: f32) {
        let bodies: Vec<(Pos2, f32)> = state.nodes.iter().map(|n| (n.pos, 1.0)).collect();
        let tree = Quadtree::build(&bodies, self.theta);
        let strength = self.charge_strength * alpha;

        for node in &mut state.nodes {
            node.vel += tree.calculate_force(node.pos, strength, self.min_distance);
        }
    }

    fn apply_center(&self, state: &mut GraphState) {
        if self.center_strength == 0.0 {
            return;
        }
        let n = state.nodes.len() as f32;
        let sum = state
            .nodes
            .iter()
            .fold(Vec2::ZERO, |acc, node| acc + node.pos.to_vec2());
        let shift = (sum / n - state.center().to_vec2()) * self.center_strength;

        for node in &mut state.nodes {
            node.pos -= shift;
        }
    }

    fn apply_collision(&self, state: &mut GraphState) {
        let r = self.collision_radius;
        let min_gap = 2.0 * r;
        // Equal radii split every correction in half
        let share = 0.5;

        for i in 0..state.nodes.len() {
            let pi = state.nodes[i].pos + state.nodes[i].vel;
            for j in (i + 1)..state.nodes.len() {
                let pj = state.nodes[j].pos + state.nodes[j].vel;
                let mut delta = pi - pj;
                if delta.length_sq() >= min_gap * min_gap {
                    continue;
                }

                if delta.x == 0.0 {
                    delta.x = state.jiggle();
                }
                if delta.y == 0.0 {
                    delta.y = state.jiggle();
                }

                let length = delta.length();
                let push = delta * ((min_gap - length) / length);
                state.nodes[i].vel += push * share;
                state.nodes[j].vel -= push * share;
            }
        }
    }

    fn apply_cluster(&self, state: &mut GraphState, alpha: f32) {
        let targets: Vec<f32> = (0..state.groups.len())
            .map(|slot| state.group_x(slot, self.cluster_margin))
            .collect();

        for node in &mut state.nodes {
            let target = targets.get(node.group_slot).copied().unwrap_or(node.pos.x);
            node.vel.x += (target - node.pos.x) * self.cluster_strength * alpha;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::REHEAT_ALPHA;
    use crate::session::{NavEdge, PageNode, Session};

    fn browsing_session() -> Session {
        let urls = [
            "https://docs.rs/egui",
            "https://docs.rs/eframe",
            "https://github.com/emilk/egui",
            "https://github.com/emilk/egui/issues",
            "https://docs.rs/egui/latest/egui/struct.Painter.html",
            "https://www.rust-lang.org/",
            "https://github.com/emilk/eframe_template",
            "https://docs.rs/egui",
        ];
        let mut session = Session::empty();
        let mut previous: Option<String> = None;
        for url in urls {
            session.add_node_if_missing(PageNode::new(url, ""));
            if let Some(prev) = previous.take() {
                session.add_edge_if_missing(NavEdge::new(prev, url));
            }
            previous = Some(url.to_string());
        }
        session.last_visited = previous;
        session
    }

    fn loaded_state() -> GraphState {
        let mut state = GraphState::with_seed(Vec2::new(1200.0, 800.0), 42);
        state.load(&browsing_session());
        state
    }

    fn run_until_settled(layout: &ForceLayout, state: &mut GraphState, max_steps: usize) -> usize {
        let mut steps = 0;
        while !layout.is_settled(state) && steps < max_steps {
            layout.step(state);
            steps += 1;
        }
        steps
    }

    #[test]
    fn alpha_decays_monotonically_and_settles() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();

        let mut previous = state.alpha;
        let mut steps = 0;
        while !layout.is_settled(&state) && steps < 1000 {
            layout.step(&mut state);
            assert!(state.alpha <= previous, "alpha rose at step {}", steps);
            previous = state.alpha;
            steps += 1;
        }

        assert!(layout.is_settled(&state));
        assert!(steps <= 400, "took {} steps", steps);
        assert!(state.nodes.iter().all(|n| n.pos.x.is_finite() && n.pos.y.is_finite()));
    }

    #[test]
    fn settled_layout_has_no_overlapping_nodes() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        run_until_settled(&layout, &mut state, 1000);

        for (i, a) in state.nodes.iter().enumerate() {
            for b in &state.nodes[i + 1..] {
                let d = a.pos.distance(b.pos);
                assert!(
                    d >= 2.0 * layout.collision_radius * 0.9,
                    "{} and {} are {} apart",
                    a.id,
                    b.id,
                    d
                );
            }
        }
    }

    #[test]
    fn hostnames_separate_into_columns() {
        let layout = ForceLayout::default();
        let mut state = GraphState::with_seed(Vec2::new(1200.0, 800.0), 5);
        let mut session = Session::empty();
        for url in [
            "https://docs.rs/a",
            "https://github.com/a",
            "https://docs.rs/b",
            "https://www.rust-lang.org/",
            "https://github.com/b",
        ] {
            session.add_node_if_missing(PageNode::new(url, ""));
        }
        state.load(&session);
        run_until_settled(&layout, &mut state, 1000);

        let mean_x = |group: &str| {
            let xs: Vec<f32> = state
                .nodes
                .iter()
                .filter(|n| n.group == group)
                .map(|n| n.pos.x)
                .collect();
            xs.iter().sum::<f32>() / xs.len() as f32
        };
        // Groups in first-seen order: docs.rs, github.com, www.rust-lang.org
        assert!(mean_x("docs.rs") < mean_x("github.com"));
        assert!(mean_x("github.com") < mean_x("www.rust-lang.org"));
    }

    #[test]
    fn settled_layout_does_not_move() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        run_until_settled(&layout, &mut state, 1000);

        let before: Vec<Pos2> = state.nodes.iter().map(|n| n.pos).collect();
        layout.step(&mut state);
        let after: Vec<Pos2> = state.nodes.iter().map(|n| n.pos).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn dragging_pins_and_rewarms() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        run_until_settled(&layout, &mut state, 1000);
        let id = state.nodes[0].id.clone();

        assert!(layout.begin_drag(&mut state, &id));
        assert!(!layout.is_settled(&state));

        let target = Pos2::new(50.0, 60.0);
        layout.drag_to(&mut state, &id, target);
        let cooled = state.alpha;
        for _ in 0..10 {
            layout.step(&mut state);
        }
        assert!(state.alpha > cooled);
        assert_eq!(state.get_pos(&id), Some(target));
        assert_eq!(state.get_node(&id).map(|n| n.vel), Some(Vec2::ZERO));

        layout.end_drag(&mut state, &id);
        assert_eq!(state.get_node(&id).and_then(|n| n.pinned), None);
        let steps = run_until_settled(&layout, &mut state, 2000);
        assert!(layout.is_settled(&state), "still warm after {} steps", steps);
    }

    #[test]
    fn unknown_node_cannot_be_dragged() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        assert!(!layout.begin_drag(&mut state, "https://nowhere.example/"));
        assert_eq!(state.alpha_target, 0.0);
    }

    #[test]
    fn new_pages_restart_a_settled_layout() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        run_until_settled(&layout, &mut state, 1000);

        let mut session = browsing_session();
        session.add_node_if_missing(PageNode::new("https://crates.io/", "crates.io"));
        session.add_edge_if_missing(NavEdge::new("https://docs.rs/egui", "https://crates.io/"));
        state.load(&session);

        assert!(state.alpha >= REHEAT_ALPHA);
        assert!(!layout.is_settled(&state));
    }

    #[test]
    fn self_loops_and_single_nodes_stay_finite() {
        let layout = ForceLayout::default();
        let mut state = GraphState::with_seed(Vec2::new(800.0, 600.0), 9);
        let mut session = Session::empty();
        session.add_node_if_missing(PageNode::new("http://a.com/", "A"));
        session.add_edge_if_missing(NavEdge::new("http://a.com/", "http://a.com/"));
        state.load(&session);

        run_until_settled(&layout, &mut state, 1000);
        let pos = state.nodes[0].pos;
        assert!(pos.x.is_finite() && pos.y.is_finite());
        // Lone node is drawn to the middle of the canvas
        assert!(pos.distance(state.center()) < 1.0);
    }

    #[test]
    fn dragging_works_with_physics_off() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        state.physics_enabled = false;
        let id = state.nodes[0].id.clone();
        let others: Vec<Pos2> = state.nodes[1..].iter().map(|n| n.pos).collect();

        assert!(layout.begin_drag(&mut state, &id));
        let target = Pos2::new(10.0, 10.0);
        layout.drag_to(&mut state, &id, target);
        layout.step(&mut state);

        assert_eq!(state.get_pos(&id), Some(target));
        assert_eq!(others, state.nodes[1..].iter().map(|n| n.pos).collect::<Vec<_>>());
    }

    #[test]
    fn physics_toggle_freezes_positions() {
        let layout = ForceLayout::default();
        let mut state = loaded_state();
        state.physics_enabled = false;
        let before: Vec<Pos2> = state.nodes.iter().map(|n| n.pos).collect();
        layout.step(&mut state);
        assert_eq!(before, state.nodes.iter().map(|n| n.pos).collect::<Vec<_>>());
    }
}
