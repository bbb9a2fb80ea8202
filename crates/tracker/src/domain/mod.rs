#![forbid(unsafe_code)]

mod fix;
mod stats;

pub use fix::{GeoFix, RoutePoint};
pub use stats::TripStats;
