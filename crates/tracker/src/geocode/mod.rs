#![forbid(unsafe_code)]

mod bounded_map;
mod cache;
#[cfg(feature = "nominatim")]
mod nominatim;

pub use bounded_map::BoundedMap;
pub use cache::{GeocodeCache, Geocoder, LOCATION_UNAVAILABLE, UNKNOWN_LOCATION};
#[cfg(feature = "nominatim")]
pub use nominatim::NominatimGeocoder;
