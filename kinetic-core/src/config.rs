//! Engine Configuration
//!
//! Tunables for the frame clock and the spring integrator. Every field has a
//! default, so a configuration file only needs to name what it changes:
//!
//! ```json
//! {
//!     "clock": { "frame_interval_ms": 8 },
//!     "spring": { "tension": 300.0, "friction": 20.0 }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Frame interval used when none is configured.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Default origami tension of [`SpringConfig::default`].
pub const DEFAULT_ORIGAMI_TENSION: f64 = 40.0;

/// Default origami friction of [`SpringConfig::default`].
pub const DEFAULT_ORIGAMI_FRICTION: f64 = 7.0;

/// Default speed and displacement below which a spring is at rest.
pub const DEFAULT_REST_THRESHOLD: f64 = 0.005;

/// Frame clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Time between frames, in milliseconds.
    pub frame_interval_ms: u64,
}

impl ClockConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "clock.frame_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

/// Physical parameters of a damped spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    /// Stiffness: acceleration per unit of displacement.
    pub tension: f64,

    /// Damping: deceleration per unit of velocity.
    pub friction: f64,

    /// Speed below which the spring may come to rest.
    pub rest_speed_threshold: f64,

    /// Distance from the target below which the spring may come to rest.
    pub rest_displacement_threshold: f64,

    /// Snap to the target as soon as it is crossed.
    pub overshoot_clamping: bool,
}

impl SpringConfig {
    /// Spring with the given raw tension and friction.
    pub fn new(tension: f64, friction: f64) -> Self {
        Self {
            tension,
            friction,
            ..Self::default()
        }
    }

    /// Spring from the tension/friction scale used by Origami prototypes.
    pub fn from_origami(tension: f64, friction: f64) -> Self {
        Self::new(origami_tension(tension), origami_friction(friction))
    }

    /// Spring whose friction exactly cancels oscillation.
    pub fn critically_damped(tension: f64) -> Self {
        Self::new(tension, 2.0 * tension.max(0.0).sqrt())
    }

    pub fn with_overshoot_clamping(mut self, clamp: bool) -> Self {
        self.overshoot_clamping = clamp;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("tension", self.tension),
            ("friction", self.friction),
            ("rest_speed_threshold", self.rest_speed_threshold),
            ("rest_displacement_threshold", self.rest_displacement_threshold),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "spring.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            tension: origami_tension(DEFAULT_ORIGAMI_TENSION),
            friction: origami_friction(DEFAULT_ORIGAMI_FRICTION),
            rest_speed_threshold: DEFAULT_REST_THRESHOLD,
            rest_displacement_threshold: DEFAULT_REST_THRESHOLD,
            overshoot_clamping: false,
        }
    }
}

fn origami_tension(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        (value - 30.0) * 3.62 + 194.0
    }
}

fn origami_friction(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        (value - 8.0) * 3.0 + 25.0
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub clock: ClockConfig,
    pub spring: SpringConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        self.spring.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spring_matches_origami_preset() {
        let config = SpringConfig::default();
        assert!((config.tension - 230.2).abs() < 1e-9);
        assert!((config.friction - 22.0).abs() < 1e-9);
        assert_eq!(config, SpringConfig::from_origami(40.0, 7.0));
    }

    #[test]
    fn zero_origami_values_stay_zero() {
        let config = SpringConfig::from_origami(0.0, 0.0);
        assert_eq!(config.tension, 0.0);
        assert_eq!(config.friction, 0.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "clock": { "frame_interval_ms": 8 } }"#).unwrap();
        assert_eq!(config.clock.frame_interval(), Duration::from_millis(8));
        assert_eq!(config.spring, SpringConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_json(r#"{ "clock": { "frame_interval_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json(r#"{ "spring": { "friction": -1.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
