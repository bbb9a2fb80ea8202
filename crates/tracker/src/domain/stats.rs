#![forbid(unsafe_code)]

use crate::domain::RoutePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregates derived from a finished route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    pub total_distance_meters: f64,
    pub duration_seconds: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub point_count: usize,
    pub elevation_gain_meters: f64,
    pub elevation_loss_meters: f64,
    pub start_point: Option<RoutePoint>,
    pub end_point: Option<RoutePoint>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}
