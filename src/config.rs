use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

// Playfield
pub const PLAYFIELD_WIDTH: f32 = 512.0;
pub const PLAYFIELD_HEIGHT: f32 = 384.0;

// Base circle diameter at CS 5 before the CS scale factor is applied.
pub const BASE_CIRCLE_DIAMETER: f32 = 64.0;

/// Gameplay tunables. The defaults are the reference values; individual
/// fields can be overridden from a JSON file for sync experiments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Slider tail judgement happens this many ms before the slider ends,
    /// clamped so the check never lands before the slider's midpoint.
    pub slider_end_check_offset_ms: f64,
    /// Follow-circle radius as a multiple of the circle radius.
    pub follow_radius_factor: f32,

    // Spinner physics
    pub spinner_acceleration: f64, // rad/ms^2
    pub spinner_deceleration_delay_ms: f64,
    pub spinner_velocity_cap: f64, // rad/ms

    // Stacking
    pub stack_distance: f32,
    pub stack_shift: f32, // px per stack height unit, applied on both axes

    // Scoring
    pub combo_break_threshold: u32,
    pub combo_color_count: u32,
    pub mod_multiplier: f64,

    // Rendering window
    pub fade_out_ms: f64,

    // Clock drift correction
    pub media_nudge_interval_ms: f64,
    pub observed_media_offset_ms: f64,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            slider_end_check_offset_ms: 36.0,
            follow_radius_factor: 2.0,
            spinner_acceleration: 0.00039,
            spinner_deceleration_delay_ms: 20.0,
            spinner_velocity_cap: 0.05,
            stack_distance: 3.0,
            stack_shift: -4.0,
            combo_break_threshold: 20,
            combo_color_count: 4,
            mod_multiplier: 1.0,
            fade_out_ms: 175.0,
            media_nudge_interval_ms: 333.0,
            observed_media_offset_ms: 12.0,
        }
    }
}

impl GameplayConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overrides_keep_defaults() {
        let config: GameplayConfig =
            serde_json::from_str(r#"{ "slider_end_check_offset_ms": 0.0 }"#).unwrap();
        assert_eq!(config.slider_end_check_offset_ms, 0.0);
        assert_eq!(config.combo_break_threshold, 20);
        assert_eq!(config.spinner_acceleration, 0.00039);
    }
}
