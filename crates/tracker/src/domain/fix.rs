#![forbid(unsafe_code)]

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One position reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFix")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Altitude above sea level in meters, when the sensor reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

/// Unchecked wire form of a [`GeoFix`].
#[derive(Deserialize)]
struct RawFix {
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    elevation: Option<f64>,
}

impl TryFrom<RawFix> for GeoFix {
    type Error = Error;

    fn try_from(raw: RawFix) -> Result<Self, Self::Error> {
        let fix = Self::new(raw.latitude, raw.longitude, raw.timestamp)?;
        Ok(match raw.elevation {
            Some(elevation) => fix.with_elevation(elevation),
            None => fix,
        })
    }
}

/// A fix that made it into the route.
pub type RoutePoint = GeoFix;

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Result<Self, Error> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidFix(format!("latitude {latitude} out of range")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidFix(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            timestamp,
            elevation: None,
        })
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation.is_finite().then_some(elevation);
        self
    }

    /// The same position observed at another instant.
    pub fn restamped(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}
