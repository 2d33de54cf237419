//! Tunable thresholds for sample filtering, the offline queue and the
//! stop-time save policy.
//!
//! All structs deserialize with `#[serde(default)]`, so a host only needs to
//! supply the fields it wants to override.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// How calories are estimated for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CalorieModel {
    /// Linear model: a fixed number of kcal per kilometre. Default: 65.
    Flat { kcal_per_km: f64 },
    /// MET model: `met × weight_kg × hours` of active time.
    Met { weight_kg: f64, met: f64 },
}

impl Default for CalorieModel {
    fn default() -> Self {
        CalorieModel::Flat { kcal_per_km: 65.0 }
    }
}

/// Configuration for statistics derivation and the live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Smallest step accepted into cumulative distance.
    /// Default: 0.001 km (1 m, below this is standing-still jitter)
    pub min_segment_km: f64,

    /// Largest step accepted into cumulative distance.
    /// Default: 0.05 km (50 m, above this is a GPS spike at 1 Hz)
    pub max_segment_km: f64,

    /// Device-reported speed is trusted only when strictly below this.
    /// Default: 10.0 m/s
    pub max_device_speed_mps: f64,

    /// Speeds at or above this are unrealistic for foot running and rejected.
    /// Default: 30.0 km/h
    pub max_running_speed_kmh: f64,

    /// Speeds above this count as moving and feed the average.
    /// Default: 0.5 km/h
    pub min_moving_speed_kmh: f64,

    /// Number of moving speeds averaged into `avg_speed_kmh`.
    /// Default: 50
    pub speed_history_len: u32,

    /// Number of raw samples retained by the aggregator.
    /// Default: 1000
    pub sample_history_len: u32,

    /// Single-step climbs at or above this are treated as altimeter noise.
    /// Default: 10.0 m
    pub max_elevation_step_m: f64,

    /// Upper bound for reported duration.
    /// Default: 86400 s (24h)
    pub max_duration_seconds: u32,

    /// Period of the live duration refresh.
    /// Default: 1000 ms
    pub tick_interval_ms: u64,

    /// Calorie estimation model. Default: flat 65 kcal/km.
    pub calorie_model: CalorieModel,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_segment_km: 0.001,
            max_segment_km: 0.05,
            max_device_speed_mps: 10.0,
            max_running_speed_kmh: 30.0,
            min_moving_speed_kmh: 0.5,
            speed_history_len: 50,
            sample_history_len: 1000,
            max_elevation_step_m: 10.0,
            max_duration_seconds: 86_400,
            tick_interval_ms: 1000,
            calorie_model: CalorieModel::default(),
        }
    }
}

impl TrackerConfig {
    /// Parse a configuration from host-supplied JSON. Missing fields keep
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations whose thresholds cannot work together.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_segment_km >= 0.0 && self.min_segment_km <= self.max_segment_km) {
            return Err(TrackerError::Config {
                message: format!(
                    "segment bounds must satisfy 0 <= min ({}) <= max ({})",
                    self.min_segment_km, self.max_segment_km
                ),
            });
        }
        if self.speed_history_len == 0 || self.sample_history_len == 0 {
            return Err(TrackerError::Config {
                message: "history lengths must be greater than zero".to_string(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackerError::Config {
                message: "tick_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the offline write queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed attempts after which an item is dropped. Default: 3
    pub max_retries: u32,
    /// Period of the background retry pass. Default: 5000 ms
    pub retry_interval_ms: u64,
    /// Key under which the queue is persisted.
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval_ms: 5000,
            storage_key: "offline_action_queue".to_string(),
        }
    }
}

/// Minimum run size worth persisting when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct SavePolicy {
    /// Default: 10 s
    pub min_duration_seconds: u32,
    /// Default: 0.01 km
    pub min_distance_km: f64,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            min_duration_seconds: 10,
            min_distance_km: 0.01,
        }
    }
}
