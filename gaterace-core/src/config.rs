//! Static course configuration with serde defaults and validation.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CURVE_EDGY, DEFAULT_CURVE_RAD, DEFAULT_GATE_WIDTH, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_NUM_POINTS, DEFAULT_MIN_NUM_POINTS, DEFAULT_MIN_POINT_DISTANCE, DEFAULT_NUM_LAPS,
    DEFAULT_SAMPLES_PER_SEGMENT, DEFAULT_SHARED_TRACK_ID, DEFAULT_TRACK_SCALE,
    MAX_GATES_PER_TRACK, MIN_GATES_PER_TRACK,
};
use crate::numbers::u32_to_f32;

/// Errors raised when course configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("point count minimum {min} exceeds maximum {max}")]
    PointCountRange { min: u32, max: u32 },
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f32,
        value: f32,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error(
        "min_point_distance {value:.3} cannot be honoured by a {max_num_points}-gate fallback loop (limit {limit:.3})"
    )]
    SpacingUnreachable {
        value: f32,
        max_num_points: u32,
        limit: f32,
    },
    #[error("course configuration could not be parsed: {message}")]
    Parse { message: String },
}

/// Closed set of layouts the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackLayout {
    /// Rejection-sampled random loop smoothed with Bezier segments.
    #[default]
    RandomLoop,
    /// Evenly spaced gates on the inscribed circle; also the exhaustion fallback.
    RegularPolygon,
}

/// Track generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    #[serde(default = "TrackConfig::default_scale")]
    pub scale: f32,
    /// Minimum spacing between consecutive gates, as a fraction of the unit square.
    #[serde(default = "TrackConfig::default_min_point_distance")]
    pub min_point_distance: f32,
    #[serde(default = "TrackConfig::default_min_num_points")]
    pub min_num_points: u32,
    #[serde(default = "TrackConfig::default_max_num_points")]
    pub max_num_points: u32,
    /// Bezier handle length relative to the segment length.
    #[serde(default = "TrackConfig::default_rad")]
    pub rad: f32,
    /// 0 blends incoming and outgoing edges evenly, larger values sharpen corners.
    #[serde(default = "TrackConfig::default_edgy")]
    pub edgy: f32,
    #[serde(default = "TrackConfig::default_samples_per_segment")]
    pub samples_per_segment: u32,
    /// Rejection-sampling budget before falling back to the regular layout.
    #[serde(default = "TrackConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub layout: TrackLayout,
}

impl TrackConfig {
    const fn default_scale() -> f32 {
        DEFAULT_TRACK_SCALE
    }

    const fn default_min_point_distance() -> f32 {
        DEFAULT_MIN_POINT_DISTANCE
    }

    const fn default_min_num_points() -> u32 {
        DEFAULT_MIN_NUM_POINTS
    }

    const fn default_max_num_points() -> u32 {
        DEFAULT_MAX_NUM_POINTS
    }

    const fn default_rad() -> f32 {
        DEFAULT_CURVE_RAD
    }

    const fn default_edgy() -> f32 {
        DEFAULT_CURVE_EDGY
    }

    const fn default_samples_per_segment() -> u32 {
        DEFAULT_SAMPLES_PER_SEGMENT
    }

    const fn default_max_attempts() -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    /// Edge length of the regular fallback loop with the most gates, in unit-square terms.
    #[must_use]
    pub fn fallback_spacing(&self) -> f32 {
        (std::f32::consts::PI / u32_to_f32(self.max_num_points.max(MIN_GATES_PER_TRACK))).sin()
    }

    /// Check every field against its documented bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::MinViolation {
                field: "track.scale",
                min: f32::EPSILON,
                value: self.scale,
            });
        }
        self.validate_point_counts()?;
        if !(0.0..1.0).contains(&self.min_point_distance) {
            return Err(ConfigError::RangeViolation {
                field: "track.min_point_distance",
                min: 0.0,
                max: 1.0,
                value: self.min_point_distance,
            });
        }
        let limit = self.fallback_spacing();
        if self.min_point_distance > limit {
            return Err(ConfigError::SpacingUnreachable {
                value: self.min_point_distance,
                max_num_points: self.max_num_points,
                limit,
            });
        }
        if !self.rad.is_finite() || !(0.0..=1.0).contains(&self.rad) {
            return Err(ConfigError::RangeViolation {
                field: "track.rad",
                min: 0.0,
                max: 1.0,
                value: self.rad,
            });
        }
        if !self.edgy.is_finite() || self.edgy < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "track.edgy",
                min: 0.0,
                value: self.edgy,
            });
        }
        if self.samples_per_segment < 2 {
            return Err(ConfigError::MinViolation {
                field: "track.samples_per_segment",
                min: 2.0,
                value: u32_to_f32(self.samples_per_segment),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::MinViolation {
                field: "track.max_attempts",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }

    fn validate_point_counts(&self) -> Result<(), ConfigError> {
        if self.min_num_points < MIN_GATES_PER_TRACK {
            return Err(ConfigError::MinViolation {
                field: "track.min_num_points",
                min: u32_to_f32(MIN_GATES_PER_TRACK),
                value: u32_to_f32(self.min_num_points),
            });
        }
        if self.min_num_points > self.max_num_points {
            return Err(ConfigError::PointCountRange {
                min: self.min_num_points,
                max: self.max_num_points,
            });
        }
        if self.max_num_points > MAX_GATES_PER_TRACK {
            return Err(ConfigError::RangeViolation {
                field: "track.max_num_points",
                min: u32_to_f32(MIN_GATES_PER_TRACK),
                max: u32_to_f32(MAX_GATES_PER_TRACK),
                value: u32_to_f32(self.max_num_points),
            });
        }
        Ok(())
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            scale: Self::default_scale(),
            min_point_distance: Self::default_min_point_distance(),
            min_num_points: Self::default_min_num_points(),
            max_num_points: Self::default_max_num_points(),
            rad: Self::default_rad(),
            edgy: Self::default_edgy(),
            samples_per_segment: Self::default_samples_per_segment(),
            max_attempts: Self::default_max_attempts(),
            layout: TrackLayout::default(),
        }
    }
}

/// Gate-passage rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageConfig {
    /// Full lateral width of a gate; the valid window is `|y| < gate_width / 2`.
    #[serde(default = "PassageConfig::default_gate_width")]
    pub gate_width: f32,
    #[serde(default = "PassageConfig::default_num_laps")]
    pub num_laps: u32,
    /// When set, laps repeat forever and never request termination.
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub spawn_at_random_gate: bool,
}

impl PassageConfig {
    const fn default_gate_width() -> f32 {
        DEFAULT_GATE_WIDTH
    }

    const fn default_num_laps() -> u32 {
        DEFAULT_NUM_LAPS
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when the gate width or lap count is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gate_width.is_finite() || self.gate_width <= 0.0 {
            return Err(ConfigError::MinViolation {
                field: "passage.gate_width",
                min: f32::EPSILON,
                value: self.gate_width,
            });
        }
        if self.num_laps == 0 {
            return Err(ConfigError::MinViolation {
                field: "passage.num_laps",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for PassageConfig {
    fn default() -> Self {
        Self {
            gate_width: Self::default_gate_width(),
            num_laps: Self::default_num_laps(),
            looping: false,
            spawn_at_random_gate: false,
        }
    }
}

/// How a slot's track stream is seeded before each regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSeeding {
    /// Continue the slot's own stream; every reset yields a new track.
    Fresh,
    /// Reseed slot `e` from `(id, e)`; each slot keeps one track across resets.
    FixedPerSlot(u32),
    /// Reseed every slot from `id`; all slots share one track.
    Shared(u32),
}

/// Complete course configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaceConfig {
    #[serde(default)]
    pub track: TrackConfig,
    #[serde(default)]
    pub passage: PassageConfig,
    #[serde(default)]
    pub fixed_track_id: Option<u32>,
    #[serde(default)]
    pub same_track_for_all_envs: bool,
}

impl RaceConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and any validation error
    /// for out-of-bounds values.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|err| ConfigError::Parse {
            message: err.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when any nested section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.track.validate()?;
        self.passage.validate()
    }

    /// Resolve the seeding mode implied by `fixed_track_id` and `same_track_for_all_envs`.
    #[must_use]
    pub fn seeding(&self) -> TrackSeeding {
        match (self.same_track_for_all_envs, self.fixed_track_id) {
            (true, id) => TrackSeeding::Shared(id.unwrap_or(DEFAULT_SHARED_TRACK_ID)),
            (false, Some(id)) => TrackSeeding::FixedPerSlot(id),
            (false, None) => TrackSeeding::Fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = RaceConfig::from_json_str("{}").expect("defaults are valid");
        assert_eq!(cfg, RaceConfig::default());
        assert_eq!(cfg.seeding(), TrackSeeding::Fresh);
    }

    #[test]
    fn loop_field_uses_plain_name() {
        let cfg = RaceConfig::from_json_str(r#"{"passage": {"loop": true, "num_laps": 3}}"#)
            .expect("valid passage overlay");
        assert!(cfg.passage.looping);
        assert_eq!(cfg.passage.num_laps, 3);
        assert!((cfg.passage.gate_width - DEFAULT_GATE_WIDTH).abs() < f32::EPSILON);
    }

    #[test]
    fn point_bounds_validation_catches_min_above_max() {
        let cfg = TrackConfig {
            min_num_points: 9,
            max_num_points: 5,
            ..TrackConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::PointCountRange { min: 9, max: 5 })
        );
    }

    #[test]
    fn single_gate_tracks_are_rejected() {
        let cfg = TrackConfig {
            min_num_points: 1,
            ..TrackConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MinViolation { field, .. }) if field == "track.min_num_points"
        ));
    }

    #[test]
    fn spacing_must_fit_the_fallback_loop() {
        let cfg = TrackConfig {
            max_num_points: 12,
            min_point_distance: 0.3,
            ..TrackConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SpacingUnreachable { max_num_points: 12, .. })
        ));
    }

    #[test]
    fn negative_scale_and_zero_laps_fail() {
        let cfg = TrackConfig {
            scale: -1.0,
            ..TrackConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::MinViolation { field, .. }) if field == "track.scale"));
        let passage = PassageConfig {
            num_laps: 0,
            ..PassageConfig::default()
        };
        assert!(passage.validate().is_err());
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        assert!(matches!(
            RaceConfig::from_json_str("{not json"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn seeding_modes_follow_flags() {
        let shared = RaceConfig {
            same_track_for_all_envs: true,
            fixed_track_id: Some(17),
            ..RaceConfig::default()
        };
        assert_eq!(shared.seeding(), TrackSeeding::Shared(17));
        let fixed = RaceConfig {
            fixed_track_id: Some(4),
            ..RaceConfig::default()
        };
        assert_eq!(fixed.seeding(), TrackSeeding::FixedPerSlot(4));
    }
}
