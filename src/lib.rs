//! # Run Tracker
//!
//! Live GPS run tracking and offline persistence for mobile fitness apps.
//!
//! This library provides:
//! - Distance, speed, pace and calorie formulas ([`geo_math`])
//! - A noise-filtering statistics aggregator ([`SessionStats`])
//! - A start/pause/resume/stop session state machine ([`TrackingSession`])
//! - An async tracker that wires a location provider to a session ([`RunTracker`])
//! - A durable, ordered, retrying queue of backend writes ([`OfflineActionQueue`])
//!
//! ## Features
//!
//! - **`persistence`** - SQLite-backed key-value store for the offline queue (default)
//! - **`http`** - REST backend for queued writes
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use run_tracker::{Coordinate, SessionStats, ManualClock, TrackerConfig};
//!
//! let clock = ManualClock::new(0);
//! let mut stats = SessionStats::new(clock.clone(), TrackerConfig::default());
//! stats.start();
//!
//! stats.update(Coordinate::new(51.5074, -0.1278, 0));
//! clock.advance_secs(5);
//! stats.update(Coordinate::new(51.5075, -0.1278, 5_000));
//!
//! let snapshot = stats.snapshot();
//! assert!(snapshot.distance_km > 0.0);
//! assert_eq!(snapshot.duration_seconds, 5);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Thresholds and policies
pub mod config;
pub use config::{CalorieModel, QueueConfig, SavePolicy, TrackerConfig};

// Wall-clock sources
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Distance/speed/pace/calorie formulas
pub mod geo_math;

// Statistics aggregation over a sample stream
pub mod stats;
pub use stats::{SessionStats, StatsSnapshot};

// Location provider capability
pub mod location;
pub use location::{LocationProvider, SampleCallback, SubscriptionHandle};

// Session state machine
pub mod session;
pub use session::{SessionState, TrackingSession};

// Finished run records and upload encoding
pub mod record;
pub use record::{Bounds, FinalRunRecord};

// Typed backend write actions
pub mod actions;
pub use actions::{
    AchievementPayload, Action, ActionKind, GoalPayload, GoalType, QueuedAction, RunPayload,
};

// Durable key-value storage
pub mod storage;
#[cfg(feature = "persistence")]
pub use storage::SqliteStore;
pub use storage::{KeyValueStore, MemoryStore};

// Backend and connectivity collaborators
pub mod backend;
pub use backend::{dispatch, Backend, Connectivity, ConnectivityFlag};

// Offline write queue
pub mod queue;
pub use queue::{OfflineActionQueue, ProcessReport, QueueEvent, SubmitOutcome};

// Async composition of provider, session and ticker
pub mod tracker;
pub use tracker::{persist_run, RunOutcome, RunTracker};

// REST backend for queued writes
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::RestBackend;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RunTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// One timestamped GPS fix from the device.
///
/// # Example
/// ```
/// use run_tracker::Coordinate;
/// let fix = Coordinate::new(51.5074, -0.1278, 1_700_000_000_000)
///     .with_altitude(35.0)
///     .with_speed(2.8);
/// assert!(fix.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in metres, when the provider reports one
    pub altitude: Option<f64>,
    /// Device-reported ground speed in m/s
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy radius in metres
    pub accuracy_m: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp_millis: i64,
}

impl Coordinate {
    /// Create a fix with position and time only.
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            speed_mps: None,
            accuracy_m: None,
            timestamp_millis,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Check if the fix has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}
