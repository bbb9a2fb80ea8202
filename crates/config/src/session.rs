#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Session {
    /// Timeout for a single one-shot fix request, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub fix_timeout: Duration,

    /// Attempts at acquiring the initial fix before a start is aborted.
    pub start_attempts: u32,

    /// Pause between initial fix attempts, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub start_backoff: Duration,

    /// A snapshot older than this is treated as an interrupted trip.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub interruption_threshold: Duration,

    /// Consecutive failed re-subscriptions tolerated before giving up.
    pub watch_retry_limit: u32,

    /// Pause before re-opening a dead subscription, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub watch_backoff: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            fix_timeout: Duration::from_secs(5),
            start_attempts: 3,
            start_backoff: Duration::from_secs(1),
            interruption_threshold: Duration::from_secs(30),
            watch_retry_limit: 5,
            watch_backoff: Duration::from_secs(1),
        }
    }
}
