//! Persistent settings for the map app.

use crate::graph::ForceLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// All persistable UI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Display
    pub node_radius: f32,
    pub show_labels: bool,
    pub show_arrows: bool,

    // Physics
    pub physics_enabled: bool,
    pub link_distance: f32,
    pub link_strength: f32,
    pub charge_strength: f32,
    pub collision_radius: f32,
    pub cluster_strength: f32,
    pub center_y_strength: f32,
    pub velocity_decay: f32,

    /// Where `session.json` lives; the platform data directory when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = ForceLayout::default();
        Self {
            // Display
            node_radius: 18.0,
            show_labels: true,
            show_arrows: true,

            // Physics
            physics_enabled: true,
            link_distance: layout.link_distance,
            link_strength: layout.link_strength,
            charge_strength: layout.charge_strength,
            collision_radius: layout.collision_radius,
            cluster_strength: layout.cluster_strength,
            center_y_strength: layout.center_y_strength,
            velocity_decay: layout.velocity_decay,

            data_dir: None,
        }
    }
}

impl Settings {
    /// Get the path to the settings file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("mindmeld-native");
            p.push("settings.json");
            p
        })
    }

    /// Layout parameters with the user's adjustments applied
    pub fn layout(&self) -> ForceLayout {
        ForceLayout {
            link_distance: self.link_distance,
            link_strength: self.link_strength,
            charge_strength: self.charge_strength,
            collision_radius: self.collision_radius,
            cluster_strength: self.cluster_strength,
            center_y_strength: self.center_y_strength,
            velocity_decay: self.velocity_decay,
            ..ForceLayout::default()
        }
    }

    /// Put the physics sliders back to their defaults
    pub fn reset_physics(&mut self) {
        let defaults = Self::default();
        self.link_distance = defaults.link_distance;
        self.link_strength = defaults.link_strength;
        self.charge_strength = defaults.charge_strength;
        self.collision_radius = defaults.collision_radius;
        self.cluster_strength = defaults.cluster_strength;
        self.center_y_strength = defaults.center_y_strength;
        self.velocity_decay = defaults.velocity_decay;
    }

    /// Load settings from disk, returning defaults if file doesn't exist or is invalid
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    tracing::info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("Failed to parse settings file: {}, using defaults", e);
                    Self::default()
                }
            },
            // File doesn't exist yet, that's fine
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => tracing::warn!("Could not determine config directory, settings not saved"),
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!("Failed to create config directory: {}", e);
                return;
            }
        }

        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::error!("Failed to write settings file: {}", e);
                } else {
                    tracing::debug!("Saved settings to {:?}", path);
                }
            }
            Err(e) => tracing::error!("Failed to serialize settings: {}", e),
        }
    }
}
