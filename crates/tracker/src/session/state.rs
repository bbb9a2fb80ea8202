#![forbid(unsafe_code)]

use crate::domain::{GeoFix, RoutePoint, TripStats};
use crate::error::{PersistenceError, PositionError};
use chrono::{DateTime, TimeDelta, Utc};
use config::RecordingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Tracking,
    Paused,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Tracking => "tracking",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Data of a trip in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    /// Fixed when the trip starts.
    pub recording: RecordingConfig,
    pub route: Vec<RoutePoint>,
    pub started_at: DateTime<Utc>,
    pub last_recorded_at: DateTime<Utc>,
    pub accumulated_pause: TimeDelta,
    pub current_fix: Option<GeoFix>,
}

impl Trip {
    pub(crate) fn begin(recording: RecordingConfig, first: GeoFix, now: DateTime<Utc>) -> Self {
        Self {
            recording,
            current_fix: Some(first.clone()),
            route: vec![first],
            started_at: now,
            last_recorded_at: now,
            accumulated_pause: TimeDelta::zero(),
        }
    }

    pub fn last_recorded_point(&self) -> Option<&RoutePoint> {
        self.route.last()
    }
}

/// A stopped trip, ready to be stored or discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedTrip {
    pub recording: RecordingConfig,
    pub route: Vec<RoutePoint>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Time spent tracking, pauses excluded.
    pub active: Duration,
    pub stats: TripStats,
}

/// What the map collaborator needs to redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub state: SessionState,
    pub current_fix: Option<GeoFix>,
    pub route_len: usize,
    pub last_point: Option<RoutePoint>,
}

impl Default for LiveView {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            current_fix: None,
            route_len: 0,
            last_point: None,
        }
    }
}

/// Failures reported without interrupting the session.
#[derive(Debug, thiserror::Error)]
pub enum Advisory {
    #[error("position error: {0}")]
    Position(PositionError),

    #[error("failed to persist session snapshot: {0}")]
    Snapshot(PersistenceError),

    #[error("failed to load recording settings: {0}")]
    Settings(PersistenceError),

    #[error("map error: {0}")]
    Map(String),

    /// The position subscription could not be re-opened. Tracking continues
    /// with stale data until the user stops or pauses.
    #[error("lost position updates after {attempts} attempts: {error}")]
    WatchLost { attempts: u32, error: PositionError },
}

impl Advisory {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WatchLost { .. })
    }
}

/// Outcome of the process-start snapshot check.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// No trip was in progress.
    Fresh,
    /// An in-progress trip was restored.
    Resumed {
        state: SessionState,
        points: usize,
    },
    /// A trip was in progress but went quiet for too long; it was discarded.
    Interrupted {
        last_seen: DateTime<Utc>,
        points: usize,
    },
}
