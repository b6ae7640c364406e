//! Layout state and force simulation for the session map.

pub mod layout;
pub mod quadtree;
pub mod types;

pub use layout::ForceLayout;
pub use types::{group_for, hsl_to_rgb, truncate_label, GraphState, LayoutNode};
