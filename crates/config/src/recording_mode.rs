#![forbid(unsafe_code)]

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which fixes get promoted into the route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// One point per elapsed interval.
    #[default]
    Time,
    /// One point per travelled distance.
    Distance,
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => f.write_str("time"),
            Self::Distance => f.write_str("distance"),
        }
    }
}

impl FromStr for RecordingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "distance" => Ok(Self::Distance),
            other => Err(Error::InvalidRecording(format!(
                "unknown recording mode `{other}`, expected `time` or `distance`"
            ))),
        }
    }
}
