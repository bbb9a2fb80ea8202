#![forbid(unsafe_code)]

use crate::clock::{Clock, delta, non_negative};
use crate::error::GeocodeError;
use crate::geocode::BoundedMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const UNKNOWN_LOCATION: &str = "Unknown location";
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";

/// Reverse-geocoding backend.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// A display address for the coordinate, `None` if the backend knows
    /// nothing about it.
    async fn reverse(&self, latitude: f64, longitude: f64)
    -> Result<Option<String>, GeocodeError>;
}

/// Coordinate rounded to five decimals (about a meter).
type CacheKey = (i64, i64);

fn cache_key(latitude: f64, longitude: f64) -> CacheKey {
    (
        (latitude * 1e5).round() as i64,
        (longitude * 1e5).round() as i64,
    )
}

/// Rate-limited, size-bounded front for a [`Geocoder`].
///
/// Cache hits are always served. A miss within `min_interval` of the last
/// completed backend call is rejected with [`GeocodeError::RateLimited`].
/// Only found addresses are cached.
pub struct GeocodeCache<G> {
    geocoder: G,
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    entries: BoundedMap<CacheKey, String>,
    last_lookup: Option<DateTime<Utc>>,
}

impl<G: Geocoder> GeocodeCache<G> {
    pub fn new(geocoder: G, clock: Arc<dyn Clock>, min_interval: Duration, capacity: usize) -> Self {
        Self {
            geocoder,
            clock,
            min_interval,
            entries: BoundedMap::new(capacity),
            last_lookup: None,
        }
    }

    pub fn from_config(geocoder: G, clock: Arc<dyn Clock>, config: &config::Geocode) -> Self {
        Self::new(geocoder, clock, config.min_interval, config.capacity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn lookup(
        &mut self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, GeocodeError> {
        let key = cache_key(latitude, longitude);
        if let Some(address) = self.entries.get(&key) {
            trace!(latitude, longitude, "geocode cache hit");
            return Ok(Some(address.clone()));
        }

        let now = self.clock.now();
        if let Some(last) = self.last_lookup {
            let ready_at = last + delta(self.min_interval);
            if now < ready_at {
                return Err(GeocodeError::RateLimited {
                    retry_in: non_negative(ready_at - now),
                });
            }
        }

        let result = self.geocoder.reverse(latitude, longitude).await;
        self.last_lookup = Some(self.clock.now());

        let address = result?;
        if let Some(address) = &address {
            if let Some((evicted, _)) = self.entries.insert(key, address.clone()) {
                trace!(?evicted, "geocode cache full, evicted oldest entry");
            }
            debug!(latitude, longitude, %address, "address resolved");
        }
        Ok(address)
    }

    /// Like [`lookup`](Self::lookup), but never fails. Any error, rate
    /// limiting included, yields [`LOCATION_UNAVAILABLE`].
    pub async fn address_or_placeholder(&mut self, latitude: f64, longitude: f64) -> String {
        match self.lookup(latitude, longitude).await {
            Ok(Some(address)) => address,
            Ok(None) => UNKNOWN_LOCATION.to_owned(),
            Err(GeocodeError::RateLimited { retry_in }) => {
                debug!(?retry_in, latitude, longitude, "geocode rate limited");
                LOCATION_UNAVAILABLE.to_owned()
            }
            Err(err) => {
                warn!(%err, latitude, longitude, "reverse geocoding failed");
                LOCATION_UNAVAILABLE.to_owned()
            }
        }
    }
}
