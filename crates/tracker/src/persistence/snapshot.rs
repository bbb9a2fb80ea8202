#![forbid(unsafe_code)]

use crate::domain::{GeoFix, RoutePoint};
use crate::session::SessionState;
use chrono::{DateTime, Utc};
use config::RecordingConfig;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Durable copy of an in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub state: SessionState,
    pub recording: RecordingConfig,
    pub route: Vec<RoutePoint>,
    pub started_at: DateTime<Utc>,
    pub last_recorded_point: Option<RoutePoint>,
    pub last_recorded_at: DateTime<Utc>,
    pub current_fix: Option<GeoFix>,
    pub accumulated_pause_ms: i64,
    pub paused_at: Option<DateTime<Utc>>,
    /// When this snapshot was written.
    pub saved_at: DateTime<Utc>,
    /// Set by an exit flush: the process went away on purpose mid-trip.
    #[serde(default)]
    pub interrupted: bool,
}

impl SessionSnapshot {
    /// Most recent sign of life.
    pub fn heartbeat(&self) -> DateTime<Utc> {
        self.saved_at.max(self.last_recorded_at)
    }
}
