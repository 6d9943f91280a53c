//! Spawner settings
//!
//! Stored as JSON. Missing fields fall back to their defaults so older files
//! keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{CLEANUP_INTERVAL_SECS, DEFAULT_ANGLE_STEP_DEG, DEFAULT_MAX_RADIUS, DEFAULT_SEARCH_STEP};
use crate::error::SettingsError;

/// Where each item in a batch starts its radius search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RadiusPolicy {
    /// Every item starts at the anchor
    #[default]
    ResetPerItem,
    /// Each item starts on the ring where the previous one stopped
    CarryForward,
}

impl RadiusPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadiusPolicy::ResetPerItem => "ResetPerItem",
            RadiusPolicy::CarryForward => "CarryForward",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reset" | "resetperitem" | "reset_per_item" => Some(RadiusPolicy::ResetPerItem),
            "carry" | "carryforward" | "carry_forward" => Some(RadiusPolicy::CarryForward),
            _ => None,
        }
    }
}

/// Spawner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Scheduling ===
    /// Master switch for timed random events
    pub random_events: bool,
    /// Seconds between random event rolls
    pub check_interval_secs: f32,
    /// Shortest wait after an event before the next one may happen
    pub min_interval_secs: f32,
    /// Longest wait after an event before the next one may happen
    pub max_interval_secs: f32,
    /// No random events before this many seconds have passed
    pub initial_delay_secs: f32,
    /// Probability (0.0 - 1.0) that an eligible roll emits an event
    pub random_chance: f32,

    // === Walking ===
    /// Metres along the rails ahead of the train where obstacles appear
    pub spawn_distance: f32,

    // === Placement ===
    /// Radial step of the ring search
    pub search_step: f32,
    /// Angular step between candidates on a ring (degrees)
    pub search_angle_step_deg: f32,
    /// Search radius for obstacles that do not define their own
    pub default_max_radius: f32,
    pub radius_policy: RadiusPolicy,

    // === Lifecycle ===
    /// Seconds between distance-based cleanups
    pub cleanup_interval_secs: f32,
    /// Obstacles farther than this from the train are removed
    pub cleanup_distance: f32,
    /// No new event within this distance of an existing obstacle
    pub nearby_threshold: f32,

    /// RNG seed for reproducible runs
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Scheduling
            random_events: true,
            check_interval_secs: 1.0,
            min_interval_secs: 120.0,
            max_interval_secs: 360.0,
            initial_delay_secs: 30.0,
            random_chance: 0.25,

            // Walking
            spawn_distance: 500.0,

            // Placement
            search_step: DEFAULT_SEARCH_STEP,
            search_angle_step_deg: DEFAULT_ANGLE_STEP_DEG,
            default_max_radius: DEFAULT_MAX_RADIUS,
            radius_policy: RadiusPolicy::ResetPerItem,

            // Lifecycle
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            cleanup_distance: 1500.0,
            nearby_threshold: 100.0,

            seed: 0,
        }
    }
}

impl Settings {
    /// Parse and validate settings JSON
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("{err}");
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save settings to a JSON file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Reject values the director cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("check_interval_secs", self.check_interval_secs),
            ("search_step", self.search_step),
            ("search_angle_step_deg", self.search_angle_step_deg),
            ("cleanup_interval_secs", self.cleanup_interval_secs),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SettingsError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("min_interval_secs", self.min_interval_secs),
            ("initial_delay_secs", self.initial_delay_secs),
            ("spawn_distance", self.spawn_distance),
            ("default_max_radius", self.default_max_radius),
            ("cleanup_distance", self.cleanup_distance),
            ("nearby_threshold", self.nearby_threshold),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(SettingsError::Invalid(format!("{name} must not be negative, got {value}")));
            }
        }

        if !(self.max_interval_secs >= self.min_interval_secs) || !self.max_interval_secs.is_finite() {
            return Err(SettingsError::Invalid(format!(
                "max_interval_secs ({}) is below min_interval_secs ({})",
                self.max_interval_secs, self.min_interval_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.random_chance) {
            return Err(SettingsError::Invalid(format!(
                "random_chance must be within 0..=1, got {}",
                self.random_chance
            )));
        }
        Ok(())
    }
}
