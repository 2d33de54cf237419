//! Distance, speed, pace and calorie formulas.
//!
//! Pure functions over [`Coordinate`] pairs and scalars.

use crate::Coordinate;

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Flat calorie model: kcal burned per kilometre run.
pub const KCAL_PER_KM: f64 = 65.0;

/// Great-circle distance between two samples in kilometres.
///
/// # Example
/// ```
/// use run_tracker::{Coordinate, geo_math::distance_km};
/// let a = Coordinate::new(51.5074, -0.1278, 0);
/// assert_eq!(distance_km(&a, &a), 0.0);
/// ```
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Haversine distance between two lat/lng pairs in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // Clamp guards against a > 1 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Average speed between two samples in km/h. Zero when no time elapsed.
pub fn speed_kmh(a: &Coordinate, b: &Coordinate) -> f64 {
    let elapsed_ms = b.timestamp_millis - a.timestamp_millis;
    if elapsed_ms <= 0 {
        return 0.0;
    }
    let hours = elapsed_ms as f64 / 3_600_000.0;
    distance_km(a, b) / hours
}

/// Format a speed as pace in `M:SS` minutes per kilometre.
///
/// Zero (or any non-positive / non-finite) speed yields `"0:00"`.
pub fn pace_from_speed(speed_kmh: f64) -> String {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return "0:00".to_string();
    }

    let pace_minutes = 60.0 / speed_kmh;
    let mut minutes = pace_minutes.floor() as u64;
    let mut seconds = ((pace_minutes - minutes as f64) * 60.0).round() as u64;
    if seconds == 60 {
        minutes += 1;
        seconds = 0;
    }

    format!("{}:{:02}", minutes, seconds)
}

/// Flat-model calories for a distance, rounded to the nearest kcal.
pub fn calories_from_distance(distance_km: f64) -> u32 {
    calories_per_km(distance_km, KCAL_PER_KM)
}

pub(crate) fn calories_per_km(distance_km: f64, kcal_per_km: f64) -> u32 {
    (distance_km.max(0.0) * kcal_per_km).round() as u32
}

/// MET-model calories: `met × weight_kg × hours`, rounded.
pub fn calories_from_met(duration_seconds: u32, weight_kg: f64, met: f64) -> u32 {
    let hours = duration_seconds as f64 / 3600.0;
    (met * weight_kg * hours).max(0.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64, t: i64) -> Coordinate {
        Coordinate::new(lat, lng, t)
    }

    #[test]
    fn test_distance_symmetric() {
        let pairs = [
            (at(51.5074, -0.1278, 0), at(48.8566, 2.3522, 0)),
            (at(0.0, 0.0, 0), at(0.0001, 0.0001, 0)),
            (at(-33.8688, 151.2093, 0), at(40.7128, -74.0060, 0)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
            assert_eq!(distance_km(&a, &a), 0.0);
        }
    }

    #[test]
    fn test_known_distance() {
        // London to Paris is ~343.5 km on a 6371 km sphere
        let d = distance_km(&at(51.5074, -0.1278, 0), &at(48.8566, 2.3522, 0));
        assert!((d - 343.5).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_speed_guards_elapsed_time() {
        let a = at(0.0, 0.0, 1_000);
        let b = at(0.001, 0.0, 1_000);
        assert_eq!(speed_kmh(&a, &b), 0.0);
        assert_eq!(speed_kmh(&b, &a), 0.0);

        let c = at(0.001, 0.0, 11_000);
        // ~111 m in 10 s is ~40 km/h
        let v = speed_kmh(&a, &c);
        assert!((v - 40.03).abs() < 0.1, "got {}", v);
    }

    #[test]
    fn test_pace_formatting() {
        assert_eq!(pace_from_speed(0.0), "0:00");
        assert_eq!(pace_from_speed(12.0), "5:00");
        assert_eq!(pace_from_speed(10.0), "6:00");
        assert_eq!(pace_from_speed(11.0), "5:27");
        assert_eq!(pace_from_speed(f64::NAN), "0:00");
        // 60 / 10.0084 = 5.9950 min; 59.7 s rounds up into the next minute
        assert_eq!(pace_from_speed(10.0084), "6:00");
    }

    #[test]
    fn test_calories() {
        assert_eq!(calories_from_distance(10.0), 650);
        assert_eq!(calories_from_distance(0.0), 0);
        assert_eq!(calories_from_distance(0.01), 1);
        // 9.8 MET, 70 kg, 30 min
        assert_eq!(calories_from_met(1800, 70.0, 9.8), 343);
    }
}
