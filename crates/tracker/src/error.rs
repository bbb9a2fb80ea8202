#![forbid(unsafe_code)]

use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failures reported by a position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    Unavailable,

    #[error("timed out waiting for a position")]
    Timeout,

    #[error("location services are not supported")]
    Unsupported,
}

impl PositionError {
    /// Errors that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::Unsupported)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocode lookup rate limited, retry in {retry_in:?}")]
    RateLimited { retry_in: Duration },

    #[cfg(feature = "nominatim")]
    #[error("geocode request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocode backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings error: {0}")]
    Settings(#[from] config::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unsupported snapshot schema version {found}")]
    SchemaMismatch { found: u32 },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("no trip with id {0}")]
    TripMissing(i64),

    #[error("invalid trip update: {0}")]
    InvalidUpdate(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("position error: {0}")]
    Position(#[from] PositionError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("config error: {0}")]
    Config(#[from] config::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("invalid fix: {0}")]
    InvalidFix(String),

    #[error("invalid trip: {0}")]
    InvalidTrip(String),
}
