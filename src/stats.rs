//! # Session Statistics
//!
//! Running aggregate over a stream of GPS samples. Each [`SessionStats::update`]
//! filters GPS noise before it reaches the totals:
//!
//! - Distance steps outside 1–50 m are ignored (standing jitter, spikes)
//! - Speeds at or above 30 km/h are rejected as unrealistic on foot
//! - Single-step climbs of 10 m or more are treated as altimeter noise
//! - Samples that do not move forward in time are dropped
//!
//! Duration is measured against the wall clock, not sample timestamps, so a
//! session that stops receiving fixes still reports elapsed time.

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{CalorieModel, TrackerConfig};
use crate::geo_math;
use crate::Coordinate;

/// Aggregated statistics for an in-progress or finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct StatsSnapshot {
    /// Cumulative accepted distance
    pub distance_km: f64,
    /// Instantaneous speed of the latest sample (0 when rejected)
    pub current_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Mean of the recent moving-speed history
    pub avg_speed_kmh: f64,
    pub elevation_gain_m: f64,
    /// Active time, excluding pauses
    pub duration_seconds: u32,
    /// Pace derived from `avg_speed_kmh`, formatted `M:SS` per km
    pub pace: String,
    pub calories_kcal: u32,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            distance_km: 0.0,
            current_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            avg_speed_kmh: 0.0,
            elevation_gain_m: 0.0,
            duration_seconds: 0,
            pace: "0:00".to_string(),
            calories_kcal: 0,
        }
    }
}

/// Mutable aggregator producing a [`StatsSnapshot`].
pub struct SessionStats<C: Clock> {
    clock: C,
    config: TrackerConfig,
    snapshot: StatsSnapshot,
    samples: VecDeque<Coordinate>,
    speed_history: VecDeque<f64>,
    previous: Option<Coordinate>,
    /// Wall-clock reference for duration; moved forward across pauses
    started_at_millis: Option<i64>,
}

impl<C: Clock> SessionStats<C> {
    pub fn new(clock: C, config: TrackerConfig) -> Self {
        Self {
            clock,
            config,
            snapshot: StatsSnapshot::default(),
            samples: VecDeque::new(),
            speed_history: VecDeque::new(),
            previous: None,
            started_at_millis: None,
        }
    }

    /// Reset and begin measuring duration from now.
    pub fn start(&mut self) {
        self.reset();
        self.started_at_millis = Some(self.clock.now_millis());
    }

    /// Zero every field and forget all history.
    pub fn reset(&mut self) {
        self.snapshot = StatsSnapshot::default();
        self.samples.clear();
        self.speed_history.clear();
        self.previous = None;
        self.started_at_millis = None;
    }

    /// Fold one sample into the statistics.
    ///
    /// Returns `false` when the sample was dropped for not advancing in time
    /// (or for having invalid coordinates).
    pub fn update(&mut self, sample: Coordinate) -> bool {
        if !sample.is_valid() {
            debug!("Dropping sample with invalid coordinates at t={}", sample.timestamp_millis);
            return false;
        }
        if let Some(prev) = &self.previous {
            if sample.timestamp_millis <= prev.timestamp_millis {
                debug!(
                    "Dropping out-of-order sample: t={} after t={}",
                    sample.timestamp_millis, prev.timestamp_millis
                );
                return false;
            }
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.config.sample_history_len as usize {
            self.samples.pop_front();
        }

        let mut speed = 0.0;
        if let Some(prev) = self.previous {
            let delta = geo_math::distance_km(&prev, &sample);
            if delta >= self.config.min_segment_km && delta <= self.config.max_segment_km {
                self.snapshot.distance_km += delta;
            } else {
                debug!("Ignoring {:.1}m step (outside segment bounds)", delta * 1000.0);
            }

            speed = self.instantaneous_speed(&prev, &sample, delta);
            if speed > 0.0 {
                self.snapshot.max_speed_kmh = self.snapshot.max_speed_kmh.max(speed);
            }
            if speed > self.config.min_moving_speed_kmh {
                self.speed_history.push_back(speed);
                while self.speed_history.len() > self.config.speed_history_len as usize {
                    self.speed_history.pop_front();
                }
                self.snapshot.avg_speed_kmh =
                    self.speed_history.iter().sum::<f64>() / self.speed_history.len() as f64;
            }

            if let (Some(from), Some(to)) = (prev.altitude, sample.altitude) {
                let rise = to - from;
                if rise > 0.0 && rise < self.config.max_elevation_step_m {
                    self.snapshot.elevation_gain_m += rise;
                }
            }
        }
        self.previous = Some(sample);

        self.refresh_duration();
        self.snapshot.pace = geo_math::pace_from_speed(self.snapshot.avg_speed_kmh);
        self.snapshot.current_speed_kmh = speed;
        true
    }

    /// Speed for a step: trusted device speed first, derived speed otherwise.
    /// Unrealistic values collapse to zero.
    fn instantaneous_speed(&self, prev: &Coordinate, sample: &Coordinate, delta_km: f64) -> f64 {
        let speed = match sample.speed_mps {
            Some(v) if v > 0.0 && v < self.config.max_device_speed_mps => v * 3.6,
            _ => {
                let elapsed_ms = sample.timestamp_millis - prev.timestamp_millis;
                if elapsed_ms <= 0 {
                    0.0
                } else {
                    delta_km / (elapsed_ms as f64 / 3_600_000.0)
                }
            }
        };

        if !speed.is_finite() || speed >= self.config.max_running_speed_kmh {
            debug!("Rejecting unrealistic speed {:.1} km/h", speed);
            0.0
        } else {
            speed
        }
    }

    /// Recompute duration and calories from the wall clock without a new sample.
    pub fn refresh_duration(&mut self) {
        if let Some(started) = self.started_at_millis {
            let elapsed_secs = (self.clock.now_millis() - started).max(0) / 1000;
            self.snapshot.duration_seconds =
                elapsed_secs.min(self.config.max_duration_seconds as i64) as u32;
        }
        self.snapshot.calories_kcal = match self.config.calorie_model {
            CalorieModel::Flat { kcal_per_km } => {
                geo_math::calories_per_km(self.snapshot.distance_km, kcal_per_km)
            }
            CalorieModel::Met { weight_kg, met } => {
                geo_math::calories_from_met(self.snapshot.duration_seconds, weight_kg, met)
            }
        };
    }

    /// Move the duration reference forward, e.g. by the length of a pause.
    pub fn shift_start(&mut self, millis: i64) {
        if let Some(started) = self.started_at_millis.as_mut() {
            *started += millis.max(0);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.clone()
    }

    /// Most recent samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &Coordinate> {
        self.samples.iter()
    }

    pub fn started_at_millis(&self) -> Option<i64> {
        self.started_at_millis
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn stats_at(clock: &ManualClock) -> SessionStats<ManualClock> {
        let mut stats = SessionStats::new(clock.clone(), TrackerConfig::default());
        stats.start();
        stats
    }

    /// A track heading north at roughly `metres_per_step` per second.
    fn northbound(steps: usize, metres_per_step: f64) -> Vec<Coordinate> {
        let deg_per_m = 1.0 / 111_195.0;
        (0..steps)
            .map(|i| {
                Coordinate::new(i as f64 * metres_per_step * deg_per_m, 0.0, i as i64 * 1000)
            })
            .collect()
    }

    #[test]
    fn test_first_sample_scenario() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        stats.update(Coordinate::new(0.0, 0.0, 0).with_altitude(0.0));
        clock.set(1_000);
        stats.update(Coordinate::new(0.0001, 0.0001, 1_000).with_altitude(5.0));

        let snap = stats.snapshot();
        assert!(snap.distance_km > 0.0 && snap.distance_km < 0.02);
        assert_eq!(snap.elevation_gain_m, 5.0);
        assert_eq!(snap.duration_seconds, 1);
        // ~15.7 m in 1 s derives ~57 km/h, which is rejected
        assert_eq!(snap.current_speed_kmh, 0.0);
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        assert!(stats.update(Coordinate::new(0.0, 0.0, 0)));
        assert!(!stats.update(Coordinate::new(91.0, 0.0, 1_000)));
        assert!(!stats.update(Coordinate::new(f64::NAN, 0.0, 2_000)));
        assert_eq!(stats.samples().count(), 1);

        // The bad fixes did not advance the previous timestamp
        clock.set(3_000);
        assert!(stats.update(Coordinate::new(0.00002, 0.0, 500)));
        assert!(stats.snapshot().distance_km > 0.0);
    }

    #[test]
    fn test_gps_spike_not_counted() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        stats.update(Coordinate::new(0.0, 0.0, 0));
        // ~200 m north
        stats.update(Coordinate::new(0.0018, 0.0, 1_000));

        assert_eq!(stats.snapshot().distance_km, 0.0);
    }

    #[test]
    fn test_jitter_not_counted() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        for sample in northbound(10, 0.5) {
            stats.update(sample);
        }
        assert_eq!(stats.snapshot().distance_km, 0.0);
    }

    #[test]
    fn test_steady_run_distance_and_pace() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        // 3 m/s = 10.8 km/h for 200 s
        for sample in northbound(201, 3.0) {
            clock.set(sample.timestamp_millis);
            stats.update(sample);
        }

        let snap = stats.snapshot();
        assert!((snap.distance_km - 0.6).abs() < 0.001, "got {}", snap.distance_km);
        assert!((snap.avg_speed_kmh - 10.8).abs() < 0.05, "got {}", snap.avg_speed_kmh);
        assert_eq!(snap.pace, "5:33");
        assert_eq!(snap.duration_seconds, 200);
        assert_eq!(snap.calories_kcal, 39);
    }

    #[test]
    fn test_device_speed_preferred() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        stats.update(Coordinate::new(0.0, 0.0, 0));
        stats.update(Coordinate::new(0.00002, 0.0, 1_000).with_speed(2.5));
        assert!((stats.snapshot().current_speed_kmh - 9.0).abs() < 1e-9);

        // Device speed above 10 m/s is ignored in favour of the derived speed
        stats.update(Coordinate::new(0.00004, 0.0, 2_000).with_speed(12.0));
        let derived = stats.snapshot().current_speed_kmh;
        assert!(derived > 7.0 && derived < 9.0, "got {}", derived);
    }

    #[test]
    fn test_max_speed_dominates_current() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        let speeds = [0.1, 3.0, 0.3, 5.0, 2.0, 40.0, 1.0];
        let mut previous_max = 0.0;
        for (i, v) in speeds.iter().enumerate() {
            let fix = Coordinate::new(i as f64 * 0.00002, 0.0, i as i64 * 1000).with_speed(*v);
            stats.update(fix);
            let snap = stats.snapshot();
            if i > 0 {
                assert!(snap.max_speed_kmh >= snap.current_speed_kmh);
            }
            assert!(snap.max_speed_kmh >= previous_max);
            previous_max = snap.max_speed_kmh;
        }
    }

    #[test]
    fn test_average_uses_recent_history() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        // 60 moving samples: first 10 at 2 m/s, last 50 at 3 m/s
        for i in 0..61 {
            let v = if i <= 10 { 2.0 } else { 3.0 };
            let fix = Coordinate::new(i as f64 * 0.00002, 0.0, i as i64 * 1000).with_speed(v);
            stats.update(fix);
        }
        assert!((stats.snapshot().avg_speed_kmh - 10.8).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_filters() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        let altitudes = [100.0, 103.0, 101.0, 125.0, 127.0];
        for (i, alt) in altitudes.iter().enumerate() {
            let fix = Coordinate::new(i as f64 * 0.00002, 0.0, i as i64 * 1000).with_altitude(*alt);
            stats.update(fix);
        }
        // +3 counted, -2 ignored, +24 ignored as noise, +2 counted
        assert_eq!(stats.snapshot().elevation_gain_m, 5.0);
    }

    #[test]
    fn test_out_of_order_samples_dropped() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);

        assert!(stats.update(Coordinate::new(0.0, 0.0, 2_000)));
        assert!(!stats.update(Coordinate::new(0.00002, 0.0, 1_000)));
        assert!(!stats.update(Coordinate::new(0.00002, 0.0, 2_000)));
        assert_eq!(stats.samples().count(), 1);
    }

    #[test]
    fn test_duration_capped() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);
        clock.advance_secs(200_000);
        stats.refresh_duration();
        assert_eq!(stats.snapshot().duration_seconds, 86_400);
    }

    #[test]
    fn test_sample_history_bounded() {
        let clock = ManualClock::new(0);
        let config = TrackerConfig {
            sample_history_len: 5,
            ..TrackerConfig::default()
        };
        let mut stats = SessionStats::new(clock, config);
        stats.start();
        for sample in northbound(20, 3.0) {
            stats.update(sample);
        }
        let kept: Vec<i64> = stats.samples().map(|s| s.timestamp_millis).collect();
        assert_eq!(kept, vec![15_000, 16_000, 17_000, 18_000, 19_000]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let clock = ManualClock::new(0);
        let mut stats = stats_at(&clock);
        for sample in northbound(10, 3.0) {
            stats.update(sample);
        }
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.samples().count(), 0);

        // No previous pointer: the next sample contributes no distance
        stats.update(Coordinate::new(1.0, 1.0, 50_000));
        assert_eq!(stats.snapshot().distance_km, 0.0);
    }

    #[test]
    fn test_met_calorie_model() {
        let clock = ManualClock::new(0);
        let config = TrackerConfig {
            calorie_model: CalorieModel::Met {
                weight_kg: 70.0,
                met: 9.8,
            },
            ..TrackerConfig::default()
        };
        let mut stats = SessionStats::new(clock.clone(), config);
        stats.start();
        clock.advance_secs(1800);
        stats.refresh_duration();
        assert_eq!(stats.snapshot().calories_kcal, 343);
    }
}
