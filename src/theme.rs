//! Color constants for the map and its control panel.
//!
//! Node fills come from per-hostname hues (see `graph::hsl_to_rgb`); all
//! other colors are sourced from here.

use egui::Color32;

/// Background colors for different layers
pub mod bg {
    use super::*;

    /// Map canvas
    pub const GRAPH: Color32 = Color32::from_rgb(249, 250, 251);

    /// Control panel
    pub const PANEL: Color32 = Color32::from_rgb(255, 255, 255);

    /// Annotation editor and tooltips
    pub const SURFACE: Color32 = Color32::from_rgb(243, 244, 246);
}

pub mod accent {
    use super::*;

    /// Recording / Start
    pub const GREEN: Color32 = Color32::from_rgb(34, 197, 94);

    /// Stop, errors
    pub const RED: Color32 = Color32::from_rgb(239, 68, 68);

    pub const BLUE: Color32 = Color32::from_rgb(59, 130, 246);

    /// Selection highlighting
    pub const YELLOW: Color32 = Color32::from_rgb(250, 204, 21);
}

/// Text colors at different emphasis levels
pub mod text {
    use super::*;

    pub const PRIMARY: Color32 = Color32::from_rgb(17, 24, 39);

    pub const SECONDARY: Color32 = Color32::from_rgb(75, 85, 99);

    pub const MUTED: Color32 = Color32::from_rgb(156, 163, 175);
}

/// Map strokes
pub mod graph {
    use super::*;

    /// Navigation edges
    pub const EDGE: Color32 = Color32::from_rgb(156, 163, 175);

    /// Node outline
    pub const NODE_STROKE: Color32 = Color32::from_rgb(17, 24, 39);

    /// Ring around the last visited page
    pub const CURSOR: Color32 = super::accent::BLUE;
}

/// State colors for interactive elements
pub mod state {
    use super::*;

    /// Hover state outline
    pub const HOVER: Color32 = Color32::from_rgb(55, 65, 81);

    /// Selected state outline
    pub const SELECTED: Color32 = super::accent::YELLOW;

    pub const RECORDING: Color32 = super::accent::GREEN;

    pub const IDLE: Color32 = super::text::MUTED;

    pub const ERROR: Color32 = super::accent::RED;
}

/// Node rendering stroke widths
pub mod stroke_width {
    pub const NORMAL: f32 = 1.5;

    pub const HOVER: f32 = 2.5;

    pub const SELECTED: f32 = 3.0;

    pub const EDGE: f32 = 1.5;
}

/// Helper to create a stroke with consistent styling
pub fn stroke(color: Color32, width: f32) -> egui::Stroke {
    egui::Stroke::new(width, color)
}
