#![forbid(unsafe_code)]

//! Great-circle distance and route statistics.

mod format;

pub use format::{format_distance, format_duration, format_speed};

use crate::domain::{GeoFix, RoutePoint, TripStats};
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;

/// Mean earth radius used for all distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

const MPS_TO_KMH: f64 = 3.6;

/// Haversine distance between two fixes, in meters.
///
/// Coordinates are assumed to be in range; see [`GeoFix::new`].
pub fn distance_meters(a: &GeoFix, b: &GeoFix) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Statistics for a route recorded between `started_at` and `ended_at`.
pub fn compute_trip_stats(
    route: &[RoutePoint],
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> TripStats {
    compute_trip_stats_excluding(route, started_at, ended_at, TimeDelta::zero())
}

/// Like [`compute_trip_stats`], but `paused` is subtracted from the duration
/// so speeds reflect moving time only.
pub fn compute_trip_stats_excluding(
    route: &[RoutePoint],
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    paused: TimeDelta,
) -> TripStats {
    let mut total_distance = 0.0;
    let mut max_speed_kmh: f64 = 0.0;
    let mut gain = 0.0;
    let mut loss = 0.0;

    for (prev, next) in route.iter().tuple_windows() {
        let distance = distance_meters(prev, next);
        total_distance += distance;

        // Duplicate or out-of-order timestamps carry no usable speed.
        let dt = seconds(next.timestamp - prev.timestamp);
        if dt > 0.0 {
            max_speed_kmh = max_speed_kmh.max(distance / dt * MPS_TO_KMH);
        }

        if let (Some(from), Some(to)) = (prev.elevation, next.elevation) {
            let climb = to - from;
            if climb > 0.0 {
                gain += climb;
            } else {
                loss -= climb;
            }
        }
    }

    let duration = seconds(ended_at - started_at - paused).max(0.0);
    let average_speed_kmh = if duration > 0.0 {
        total_distance / duration * MPS_TO_KMH
    } else {
        0.0
    };

    TripStats {
        total_distance_meters: total_distance,
        duration_seconds: duration,
        average_speed_kmh,
        max_speed_kmh,
        point_count: route.len(),
        elevation_gain_meters: gain,
        elevation_loss_meters: loss,
        start_point: route.first().cloned(),
        end_point: route.last().cloned(),
        started_at,
        ended_at,
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn fix(lat: f64, lon: f64, secs: i64) -> GeoFix {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        GeoFix::new(lat, lon, t0 + TimeDelta::seconds(secs)).unwrap()
    }

    #[test]
    fn identical_points_are_zero_apart() {
        let a = fix(48.85, 2.35, 0);
        assert_eq!(distance_meters(&a, &a), 0.0);
    }

    #[test]
    fn tenth_of_a_degree_over_an_hour() {
        let route = [fix(0.0, 0.0, 0), fix(0.1, 0.0, 3600)];
        let stats = compute_trip_stats(&route, route[0].timestamp, route[1].timestamp);

        assert!((stats.total_distance_meters - 11_100.0).abs() / 11_100.0 < 0.01);
        assert!((stats.average_speed_kmh - 11.1).abs() / 11.1 < 0.01);
        assert!((stats.max_speed_kmh - stats.average_speed_kmh).abs() < 1e-9);
        assert_eq!(stats.duration_seconds, 3600.0);
        assert_eq!(stats.point_count, 2);
    }

    #[test]
    fn short_route_has_no_speed() {
        let only = fix(10.0, 10.0, 0);
        let stats = compute_trip_stats(
            std::slice::from_ref(&only),
            only.timestamp,
            only.timestamp + TimeDelta::seconds(90),
        );
        assert_eq!(stats.total_distance_meters, 0.0);
        assert_eq!(stats.max_speed_kmh, 0.0);
        assert_eq!(stats.average_speed_kmh, 0.0);
        assert_eq!(stats.duration_seconds, 90.0);

        let empty = compute_trip_stats(&[], only.timestamp, only.timestamp);
        assert_eq!(empty.point_count, 0);
        assert_eq!(empty.start_point, None);
    }

    #[test]
    fn duplicate_timestamps_do_not_inflate_max_speed() {
        let route = [fix(0.0, 0.0, 0), fix(0.01, 0.0, 0), fix(0.02, 0.0, 60)];
        let stats = compute_trip_stats(&route, route[0].timestamp, route[2].timestamp);

        let second_leg = distance_meters(&route[1], &route[2]) / 60.0 * MPS_TO_KMH;
        assert!(stats.max_speed_kmh.is_finite());
        assert!((stats.max_speed_kmh - second_leg).abs() < 1e-9);
        // Distance still counts the zero-time leg.
        assert!(stats.total_distance_meters > distance_meters(&route[1], &route[2]));
    }

    #[test]
    fn backwards_timestamps_do_not_count_toward_max_speed() {
        let route = [fix(0.0, 0.0, 0), fix(0.01, 0.0, 120), fix(0.02, 0.0, 60)];
        let stats = compute_trip_stats(&route, route[0].timestamp, route[1].timestamp);

        let first_leg = distance_meters(&route[0], &route[1]) / 120.0 * MPS_TO_KMH;
        assert!((stats.max_speed_kmh - first_leg).abs() < 1e-9);
        assert!(stats.max_speed_kmh > 0.0);
        assert_eq!(stats.duration_seconds, 120.0);
        // The backwards leg still adds distance.
        let legs = distance_meters(&route[0], &route[1]) + distance_meters(&route[1], &route[2]);
        assert!((stats.total_distance_meters - legs).abs() < 1e-9);
    }

    #[test]
    fn pauses_are_excluded_from_duration() {
        let route = [fix(0.0, 0.0, 0), fix(0.1, 0.0, 3600)];
        let stats = compute_trip_stats_excluding(
            &route,
            route[0].timestamp,
            route[1].timestamp + TimeDelta::minutes(30),
            TimeDelta::minutes(30),
        );
        assert_eq!(stats.duration_seconds, 3600.0);
    }

    #[test]
    fn elevation_changes_are_split() {
        let route = [
            fix(0.0, 0.0, 0).with_elevation(100.0),
            fix(0.001, 0.0, 10).with_elevation(130.0),
            fix(0.002, 0.0, 20),
            fix(0.003, 0.0, 30).with_elevation(90.0),
            fix(0.004, 0.0, 40).with_elevation(80.0),
        ];
        let stats = compute_trip_stats(&route, route[0].timestamp, route[4].timestamp);
        assert_eq!(stats.elevation_gain_meters, 30.0);
        assert_eq!(stats.elevation_loss_meters, 10.0);
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let a = fix(lat1, lon1, 0);
            let b = fix(lat2, lon2, 0);
            let ab = distance_meters(&a, &b);
            prop_assert!((ab - distance_meters(&b, &a)).abs() < 1e-6);
            prop_assert!(ab >= 0.0);
            prop_assert!(ab <= std::f64::consts::PI * EARTH_RADIUS_METERS + 1e-3);
        }

        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let a = fix(lat, lon, 0);
            prop_assert_eq!(distance_meters(&a, &a), 0.0);
        }
    }
}
