#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Geocode {
    pub enabled: bool,

    /// Minimum spacing between outbound lookups, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub min_interval: Duration,

    /// Number of cached addresses before the oldest is evicted.
    pub capacity: usize,

    pub endpoint: String,

    pub user_agent: String,
}

impl Default for Geocode {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval: Duration::from_secs(1),
            capacity: 100,
            endpoint: "https://nominatim.openstreetmap.org/reverse".into(),
            user_agent: concat!("trip-recorder/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}
