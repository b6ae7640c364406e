//! Barnes-Hut quadtree for the many-body charge force.
//!
//! Distant groups of nodes are approximated by their center of mass, so each
//! node's repulsion costs O(log n) instead of O(n).

use egui::{Pos2, Vec2};

/// A node in the quadtree - either a leaf with one body, or an internal node with children
#[derive(Debug, Default)]
pub enum QuadNode {
    #[default]
    Empty,
    Leaf {
        pos: Pos2,
        mass: f32,
    },
    Internal {
        /// Center of mass of all bodies in this cell
        center_of_mass: Pos2,
        /// Total mass of all bodies in this cell
        total_mass: f32,
        /// Number of bodies in this cell
        count: u32,
        /// Children: NW, NE, SW, SE
        children: Box<[QuadNode; 4]>,
    },
}

/// Square cell of the tree
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: Pos2,
    pub max: Pos2,
}

impl Bounds {
    pub fn new(min: Pos2, max: Pos2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn size(&self) -> f32 {
        (self.max.x - self.min.x).max(self.max.y - self.min.y)
    }

    /// Quadrant for a position (0=NW, 1=NE, 2=SW, 3=SE)
    pub fn quadrant(&self, pos: Pos2) -> usize {
        let center = self.center();
        match (pos.y >= center.y, pos.x >= center.x) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }

    pub fn child_bounds(&self, quadrant: usize) -> Bounds {
        let center = self.center();
        match quadrant {
            0 => Bounds::new(self.min, center),
            1 => Bounds::new(Pos2::new(center.x, self.min.y), Pos2::new(self.max.x, center.y)),
            2 => Bounds::new(Pos2::new(self.min.x, center.y), Pos2::new(center.x, self.max.y)),
            _ => Bounds::new(center, self.max),
        }
    }
}

pub struct Quadtree {
    pub root: QuadNode,
    pub bounds: Bounds,
    /// Cells with `size / distance < theta` are treated as one body
    pub theta: f32,
}

impl Quadtree {
    /// Build a quadtree from a set of positions and masses
    pub fn build(bodies: &[(Pos2, f32)], theta: f32) -> Self {
        if bodies.is_empty() {
            return Self {
                root: QuadNode::Empty,
                bounds: Bounds::new(Pos2::ZERO, Pos2::ZERO),
                theta,
            };
        }

        let (mut min, mut max) = (Pos2::new(f32::MAX, f32::MAX), Pos2::new(f32::MIN, f32::MIN));
        for (pos, _) in bodies {
            min = min.min(*pos);
            max = max.max(*pos);
        }

        // Pad and make square
        let padding = 10.0;
        min -= Vec2::splat(padding);
        let size = (max.x - min.x).max(max.y - min.y) + padding;
        let bounds = Bounds::new(min, min + Vec2::splat(size));

        let mut tree = Self {
            root: QuadNode::Empty,
            bounds,
            theta,
        };

        for &(pos, mass) in bodies {
            tree.insert(pos, mass);
        }

        tree
    }

    pub fn insert(&mut self, pos: Pos2, mass: f32) {
        self.root = Self::insert_into(std::mem::take(&mut self.root), pos, mass, self.bounds, 0);
    }

    fn insert_into(node: QuadNode, pos: Pos2, mass: f32, bounds: Bounds, depth: u32) -> QuadNode {
        // Coincident points would split forever
        if depth > 50 {
            return match node {
                QuadNode::Leaf {
                    pos: existing,
                    mass: existing_mass,
                } => QuadNode::Leaf {
                    pos: existing,
                    mass: existing_mass + mass,
                },
                other => other,
            };
        }

        match node {
            QuadNode::Empty => QuadNode::Leaf { pos, mass },

            QuadNode::Leaf {
                pos: existing_pos,
                mass: existing_mass,
            } => {
                let mut children: Box<[QuadNode; 4]> = Box::default();

                let eq = bounds.quadrant(existing_pos);
                children[eq] = QuadNode::Leaf {
                    pos: existing_pos,
                    mass: existing_mass,
                };

                let nq = bounds.quadrant(pos);
                children[nq] = Self::insert_into(
                    std::mem::take(&mut children[nq]),
                    pos,
                    mass,
                    bounds.child_bounds(nq),
                    depth + 1,
                );

                let total_mass = existing_mass + mass;
                QuadNode::Internal {
                    center_of_mass: weighted(existing_pos, existing_mass, pos, mass),
                    total_mass,
                    count: 2,
                    children,
                }
            }

            QuadNode::Internal {
                center_of_mass,
                total_mass,
                count,
                mut children,
            } => {
                let q = bounds.quadrant(pos);
                children[q] = Self::insert_into(
                    std::mem::take(&mut children[q]),
                    pos,
                    mass,
                    bounds.child_bounds(q),
                    depth + 1,
                );

                QuadNode::Internal {
                    center_of_mass: weighted(center_of_mass, total_mass, pos, mass),
                    total_mass: total_mass + mass,
                    count: count + 1,
                    children,
                }
            }
        }
    }

    /// Repulsion on a body at `pos`: each body (or far cell) pushes with
    /// magnitude `strength * mass / distance`, distance clamped to `min_distance`.
    pub fn calculate_force(&self, pos: Pos2, strength: f32, min_distance: f32) -> Vec2 {
        self.force_from(&self.root, pos, strength, min_distance, self.bounds)
    }

    fn force_from(
        &self,
        node: &QuadNode,
        pos: Pos2,
        strength: f32,
        min_distance: f32,
        bounds: Bounds,
    ) -> Vec2 {
        match node {
            QuadNode::Empty => Vec2::ZERO,

            QuadNode::Leaf {
                pos: body_pos,
                mass,
            } => repel(pos - *body_pos, strength * mass, min_distance),

            QuadNode::Internal {
                center_of_mass,
                total_mass,
                children,
                ..
            } => {
                let delta = pos - *center_of_mass;
                let distance = delta.length();

                if distance > 0.0 && bounds.size() / distance < self.theta {
                    repel(delta, strength * total_mass, min_distance)
                } else {
                    children
                        .iter()
                        .enumerate()
                        .map(|(i, child)| {
                            self.force_from(child, pos, strength, min_distance, bounds.child_bounds(i))
                        })
                        .fold(Vec2::ZERO, |acc, f| acc + f)
                }
            }
        }
    }
}

fn weighted(a: Pos2, ma: f32, b: Pos2, mb: f32) -> Pos2 {
    let total = ma + mb;
    Pos2::new((a.x * ma + b.x * mb) / total, (a.y * ma + b.y * mb) / total)
}

fn repel(delta: Vec2, magnitude: f32, min_distance: f32) -> Vec2 {
    let length = delta.length();
    // The body itself, or an exact overlap the collision force resolves
    if length < 1e-6 {
        return Vec2::ZERO;
    }
    let distance = length.max(min_distance);
    (delta / length) * (magnitude / distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadtree_build() {
        let bodies = vec![
            (Pos2::new(0.0, 0.0), 1.0),
            (Pos2::new(100.0, 0.0), 1.0),
            (Pos2::new(0.0, 100.0), 1.0),
            (Pos2::new(100.0, 100.0), 1.0),
        ];

        let tree = Quadtree::build(&bodies, 0.9);

        match &tree.root {
            QuadNode::Internal { count, total_mass, .. } => {
                assert_eq!(*count, 4);
                assert_eq!(*total_mass, 4.0);
            }
            _ => panic!("Expected internal node"),
        }
    }

    #[test]
    fn test_force_pushes_away() {
        let bodies = vec![(Pos2::new(0.0, 0.0), 1.0), (Pos2::new(100.0, 0.0), 1.0)];
        let tree = Quadtree::build(&bodies, 0.9);

        let force = tree.calculate_force(Pos2::new(0.0, 0.0), 600.0, 1.0);
        assert!(force.x < 0.0, "Force should push left: {:?}", force);
        assert!((force.x + 6.0).abs() < 1e-3, "600 / 100 = 6, got {:?}", force);
    }

    #[test]
    fn test_force_falls_off_with_distance() {
        let near = Quadtree::build(&[(Pos2::new(50.0, 0.0), 1.0)], 0.9);
        let far = Quadtree::build(&[(Pos2::new(100.0, 0.0), 1.0)], 0.9);

        let f_near = near.calculate_force(Pos2::ZERO, 600.0, 1.0).length();
        let f_far = far.calculate_force(Pos2::ZERO, 600.0, 1.0).length();
        assert!((f_near / f_far - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_coincident_points_terminate() {
        let bodies = vec![(Pos2::new(5.0, 5.0), 1.0); 3];
        let tree = Quadtree::build(&bodies, 0.9);
        let force = tree.calculate_force(Pos2::new(5.0, 5.0), 600.0, 1.0);
        assert_eq!(force, Vec2::ZERO);
    }

    #[test]
    fn test_far_cluster_matches_direct_sum() {
        let bodies: Vec<(Pos2, f32)> = (0..4)
            .map(|i| (Pos2::new(1000.0 + i as f32, 0.0), 1.0))
            .collect();
        let mut all = bodies.clone();
        all.push((Pos2::ZERO, 1.0));
        let tree = Quadtree::build(&all, 0.9);

        let approx = tree.calculate_force(Pos2::ZERO, 600.0, 1.0);
        let direct: f32 = bodies.iter().map(|(p, _)| 600.0 / p.x).sum();
        assert!((approx.x + direct).abs() / direct < 0.01);
    }
}
