#![forbid(unsafe_code)]

//! Decides which fixes become route points.

use crate::clock::delta;
use crate::domain::{GeoFix, RoutePoint};
use crate::geodesy::distance_meters;
use chrono::{DateTime, Utc};
use config::{RecordingConfig, RecordingMode};

/// Whether `fix` should be appended to the route.
///
/// The first fix of a session is always recorded. In time mode the fix
/// timestamp is compared with `last_recorded_at`; in distance mode the fix is
/// compared with the last recorded point.
pub fn should_record(
    fix: &GeoFix,
    last_recorded_point: Option<&RoutePoint>,
    last_recorded_at: Option<DateTime<Utc>>,
    config: &RecordingConfig,
) -> bool {
    let Some(last) = last_recorded_point else {
        return true;
    };

    match config.mode {
        RecordingMode::Time => {
            let since = last_recorded_at.unwrap_or(last.timestamp);
            fix.timestamp - since >= delta(config.interval)
        }
        RecordingMode::Distance => distance_meters(last, fix) >= config.min_distance_meters,
    }
}

/// Apply the policy to a complete sequence of fixes.
pub fn thin_route<'a>(
    fixes: impl IntoIterator<Item = &'a GeoFix>,
    config: &RecordingConfig,
) -> Vec<RoutePoint> {
    let mut route: Vec<RoutePoint> = Vec::new();
    for fix in fixes {
        let last = route.last();
        if should_record(fix, last, last.map(|p| p.timestamp), config) {
            route.push(fix.clone());
        }
    }
    route
}
