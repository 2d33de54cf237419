//! # Tracking Session
//!
//! State machine for one run:
//!
//! ```text
//! Idle ──start──▶ Active ──pause──▶ Paused
//!                   ▲  │              │
//!                   │  └────stop──┐   │
//!                   └───resume────┼───┘
//!                                 ▼
//!                              Stopped
//! ```
//!
//! Illegal transitions return [`TrackerError::InvalidState`] and leave the
//! session untouched. Paused wall-clock time never counts towards duration:
//! resuming moves the duration reference forward by the paused span.

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::location::LocationProvider;
use crate::record::FinalRunRecord;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Paused,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// One run-tracking lifecycle from start to stop.
pub struct TrackingSession<P: LocationProvider, C: Clock> {
    provider: Arc<P>,
    stats: SessionStats<C>,
    route: Vec<Coordinate>,
    state: SessionState,
    started_at_millis: Option<i64>,
    paused_at_millis: Option<i64>,
    /// Kept so a repeated stop returns the same record
    final_record: Option<FinalRunRecord>,
}

impl<P: LocationProvider, C: Clock> TrackingSession<P, C> {
    pub fn new(provider: Arc<P>, clock: C, config: TrackerConfig) -> Self {
        Self {
            provider,
            stats: SessionStats::new(clock, config),
            route: Vec::new(),
            state: SessionState::Idle,
            started_at_millis: None,
            paused_at_millis: None,
            final_record: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }

    pub fn config(&self) -> &TrackerConfig {
        self.stats.config()
    }

    /// Begin tracking. Only valid while idle.
    ///
    /// Fails with [`TrackerError::PermissionDenied`] when the location
    /// permission is refused and [`TrackerError::LocationUnavailable`] when the
    /// provider cannot produce a fix.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(self.reject("start"));
        }
        if !self.provider.request_permission() {
            warn!("Location permission denied, session stays idle");
            return Err(TrackerError::PermissionDenied);
        }
        if self.provider.current_position().is_none() {
            warn!("No location fix available, session stays idle");
            return Err(TrackerError::LocationUnavailable);
        }

        self.stats.start();
        self.route.clear();
        self.started_at_millis = self.stats.started_at_millis();
        self.paused_at_millis = None;
        self.state = SessionState::Active;
        info!("Session started at {:?}", self.started_at_millis);
        Ok(())
    }

    /// Feed one sample. Ignored unless the session is active.
    pub fn ingest(&mut self, sample: Coordinate) {
        if self.state != SessionState::Active {
            return;
        }
        if self.stats.update(sample) {
            self.route.push(sample);
        }
    }

    /// Recompute the wall-clock duration. Frozen unless active.
    pub fn refresh(&mut self) {
        if self.state == SessionState::Active {
            self.stats.refresh_duration();
        }
    }

    /// Suspend tracking. Only valid while active.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(self.reject("pause"));
        }
        self.stats.refresh_duration();
        self.paused_at_millis = Some(self.stats.clock().now_millis());
        self.state = SessionState::Paused;
        info!(
            "Session paused after {}s",
            self.stats.snapshot().duration_seconds
        );
        Ok(())
    }

    /// Continue tracking after a pause. Re-checks the location permission.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != SessionState::Paused {
            return Err(self.reject("resume"));
        }
        if !self.provider.request_permission() {
            warn!("Location permission revoked while paused");
            return Err(TrackerError::PermissionDenied);
        }

        let now = self.stats.clock().now_millis();
        if let Some(paused_at) = self.paused_at_millis.take() {
            self.stats.shift_start(now - paused_at);
        }
        self.state = SessionState::Active;
        info!("Session resumed");
        Ok(())
    }

    /// Finish the session and hand back its record.
    ///
    /// Stopping an idle session returns [`FinalRunRecord::empty`]; stopping
    /// twice returns the first record again.
    pub fn stop(&mut self) -> FinalRunRecord {
        match self.state {
            SessionState::Idle => FinalRunRecord::empty(),
            SessionState::Stopped => self.final_record.clone().unwrap_or_default(),
            SessionState::Active | SessionState::Paused => {
                if self.state == SessionState::Active {
                    self.stats.refresh_duration();
                }
                let ended_at = self
                    .paused_at_millis
                    .take()
                    .unwrap_or_else(|| self.stats.clock().now_millis());
                self.state = SessionState::Stopped;

                let record = FinalRunRecord {
                    started_at_millis: self.started_at_millis,
                    ended_at_millis: Some(ended_at),
                    stats: self.stats.snapshot(),
                    route: std::mem::take(&mut self.route),
                };
                info!(
                    "Session stopped: {:.2} km in {}s, {} route points",
                    record.stats.distance_km,
                    record.stats.duration_seconds,
                    record.route.len()
                );
                self.final_record = Some(record.clone());
                record
            }
        }
    }

    /// Throw away all progress and return to idle.
    pub fn reset(&mut self) {
        self.stats.reset();
        self.route.clear();
        self.state = SessionState::Idle;
        self.started_at_millis = None;
        self.paused_at_millis = None;
        self.final_record = None;
    }

    fn reject(&self, operation: &'static str) -> TrackerError {
        warn!("Ignoring {} while session is {}", operation, self.state);
        TrackerError::invalid_state(operation, self.state)
    }
}
