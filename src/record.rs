//! Finished run records.
//!
//! A [`FinalRunRecord`] is what a session hands back on stop: the final
//! statistics plus the full accepted route. Whether it is worth persisting is
//! the caller's decision, made with [`FinalRunRecord::is_worth_saving`].

use geo::{algorithm::simplify::Simplify, Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::config::SavePolicy;
use crate::stats::StatsSnapshot;
use crate::Coordinate;

/// Douglas-Peucker tolerance for uploaded routes, in degrees (~1 m).
pub const ROUTE_SIMPLIFY_TOLERANCE: f64 = 0.00001;

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from route samples.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }
}

/// Final statistics and route of a stopped session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FinalRunRecord {
    /// Unix millis when the session started; `None` for a never-started session
    pub started_at_millis: Option<i64>,
    /// Unix millis when the session stopped
    pub ended_at_millis: Option<i64>,
    pub stats: StatsSnapshot,
    /// Accepted samples in arrival order
    pub route: Vec<Coordinate>,
}

impl FinalRunRecord {
    /// The zero record returned when stopping a session that never started.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.started_at_millis.is_none()
    }

    /// `false` when the run is too short (in time or distance) to keep.
    pub fn is_worth_saving(&self, policy: &SavePolicy) -> bool {
        !self.is_empty()
            && self.stats.duration_seconds >= policy.min_duration_seconds
            && self.stats.distance_km >= policy.min_distance_km
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.route)
    }

    /// Route simplified with Douglas-Peucker, as (latitude, longitude) pairs.
    pub fn simplified_route(&self, tolerance: f64) -> Vec<(f64, f64)> {
        self.simplified_line(tolerance)
            .0
            .into_iter()
            .map(|c| (c.y, c.x))
            .collect()
    }

    /// Route as a Google encoded polyline (precision 5), simplified first.
    /// Empty when the route has fewer than two points.
    pub fn encoded_polyline(&self) -> String {
        if self.route.len() < 2 {
            return String::new();
        }
        let line = self.simplified_line(ROUTE_SIMPLIFY_TOLERANCE);
        polyline::encode_coordinates(line, 5).unwrap_or_default()
    }

    fn simplified_line(&self, tolerance: f64) -> LineString<f64> {
        // geo expects (x, y) = (lng, lat)
        let line: LineString<f64> = self
            .route
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect();
        if line.0.len() < 3 {
            return line;
        }
        line.simplify(&tolerance)
    }
}
