//! FFI bindings for mobile platforms (iOS/Android).
//!
//! UniFFI exports for Kotlin and Swift. Free functions are prefixed with
//! `ffi_` to avoid clashing with the internal API. Live statistics are exposed
//! as a [`StatsAggregator`] object the host owns, fed from its own location
//! listener.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::geo_math;
use crate::record::{Bounds, FinalRunRecord};
use crate::{init_logging, Coordinate, SessionStats, StatsSnapshot, SystemClock, TrackerConfig};

// ============================================================================
// Formulas
// ============================================================================

/// Great-circle distance between two fixes in kilometres.
#[uniffi::export]
pub fn ffi_distance_km(a: Coordinate, b: Coordinate) -> f64 {
    geo_math::distance_km(&a, &b)
}

/// Speed between two fixes in km/h (0 when time does not advance).
#[uniffi::export]
pub fn ffi_speed_kmh(a: Coordinate, b: Coordinate) -> f64 {
    geo_math::speed_kmh(&a, &b)
}

/// Pace string `M:SS` per kilometre for a speed in km/h.
#[uniffi::export]
pub fn ffi_pace_from_speed(speed_kmh: f64) -> String {
    geo_math::pace_from_speed(speed_kmh)
}

/// Flat-rate calorie estimate for a distance.
#[uniffi::export]
pub fn ffi_calories_from_distance(distance_km: f64) -> u32 {
    geo_math::calories_from_distance(distance_km)
}

/// Encode a route as a simplified Google polyline for upload.
#[uniffi::export]
pub fn ffi_encode_route(points: Vec<Coordinate>) -> String {
    FinalRunRecord {
        route: points,
        ..FinalRunRecord::default()
    }
    .encoded_polyline()
}

/// Bounding box of a route, or `None` for an empty route.
#[uniffi::export]
pub fn ffi_route_bounds(points: Vec<Coordinate>) -> Option<Bounds> {
    Bounds::from_points(&points)
}

// ============================================================================
// Configuration
// ============================================================================

#[uniffi::export]
pub fn default_tracker_config() -> TrackerConfig {
    TrackerConfig::default()
}

/// Parse host-supplied JSON. Missing fields take their defaults.
#[uniffi::export]
pub fn ffi_tracker_config_from_json(json: String) -> Option<TrackerConfig> {
    init_logging();
    match TrackerConfig::from_json(&json) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("[RunTrackerRust] Rejected tracker config: {}", e);
            None
        }
    }
}

// ============================================================================
// Stats Aggregator
// ============================================================================

/// Statistics aggregator driven by the host's location stream.
#[derive(uniffi::Object)]
pub struct StatsAggregator {
    stats: Mutex<SessionStats<SystemClock>>,
}

impl StatsAggregator {
    fn stats(&self) -> MutexGuard<'_, SessionStats<SystemClock>> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[uniffi::export]
impl StatsAggregator {
    #[uniffi::constructor]
    pub fn new(config: TrackerConfig) -> Arc<Self> {
        init_logging();
        info!("[RunTrackerRust] StatsAggregator created");
        Arc::new(Self {
            stats: Mutex::new(SessionStats::new(SystemClock, config)),
        })
    }

    /// Zero everything and start the duration clock now.
    pub fn start(&self) {
        self.stats().start();
    }

    /// Fold in one fix. Returns false if it was dropped.
    pub fn update(&self, sample: Coordinate) -> bool {
        let accepted = self.stats().update(sample);
        if !accepted {
            debug!(
                "[RunTrackerRust] Sample at t={} dropped",
                sample.timestamp_millis
            );
        }
        accepted
    }

    /// Recompute duration from the wall clock and return the result.
    pub fn refresh(&self) -> StatsSnapshot {
        let mut stats = self.stats();
        stats.refresh_duration();
        stats.snapshot()
    }

    /// Exclude `millis` of paused time from the duration.
    pub fn exclude_paused(&self, millis: i64) {
        self.stats().shift_start(millis);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats().snapshot()
    }

    pub fn reset(&self) {
        self.stats().reset();
    }
}
