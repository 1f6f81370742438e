//! Match Configuration
//!
//! Rules constants shared by every participant. All clients of one match must
//! use the same configuration or their replays diverge.

use serde::{Serialize, Deserialize};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("Invalid match configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("Invalid value for {field}: {reason}")]
    OutOfBounds {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },
}

/// Configuration for match simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Distance a ship may deviate from its coast point per point of thrust
    pub distance_per_thrust: f64,
    /// Extra clearance added to every asteroid field radius
    pub asteroid_clearance: f64,
    /// Half width of the generated play area
    pub arena_half_width: f64,
    /// Half height of the generated play area
    pub arena_half_height: f64,
    /// Fewest asteroid fields generated for a match
    pub min_asteroid_fields: i32,
    /// Most asteroid fields generated for a match
    pub max_asteroid_fields: i32,
    /// Smallest asteroid field radius
    pub min_asteroid_radius: f64,
    /// Largest asteroid field radius
    pub max_asteroid_radius: f64,
    /// How many recent initiative starters the fairness queue remembers
    pub fairness_window: usize,
    /// Extra thrust granted by the All Ahead Full order
    pub all_ahead_thrust_bonus: i32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance_per_thrust: 2.0,
            asteroid_clearance: 2.5,
            arena_half_width: 60.0,
            arena_half_height: 40.0,
            min_asteroid_fields: 2,
            max_asteroid_fields: 5,
            min_asteroid_radius: 3.0,
            max_asteroid_radius: 8.0,
            fairness_window: 2,
            all_ahead_thrust_bonus: 2,
        }
    }
}

impl MatchConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.distance_per_thrust > 0.0) {
            return Err(ConfigError::OutOfBounds {
                field: "distance_per_thrust",
                reason: "must be positive",
            });
        }
        if self.asteroid_clearance < 0.0 {
            return Err(ConfigError::OutOfBounds {
                field: "asteroid_clearance",
                reason: "must not be negative",
            });
        }
        if self.min_asteroid_fields < 0 || self.min_asteroid_fields > self.max_asteroid_fields {
            return Err(ConfigError::OutOfBounds {
                field: "min_asteroid_fields",
                reason: "must be between 0 and max_asteroid_fields",
            });
        }
        if self.min_asteroid_radius > self.max_asteroid_radius {
            return Err(ConfigError::OutOfBounds {
                field: "min_asteroid_radius",
                reason: "must not exceed max_asteroid_radius",
            });
        }
        Ok(())
    }
}
