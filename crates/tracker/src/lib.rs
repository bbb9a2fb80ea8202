#![forbid(unsafe_code)]

pub mod clock;
pub mod domain;
mod error;
pub mod geocode;
pub mod geodesy;
pub mod persistence;
pub mod policy;
pub mod position;
pub mod session;

pub use domain::{GeoFix, RoutePoint, TripStats};
pub use error::{Error, GeocodeError, PersistenceError, PositionError};
pub use session::{Services, SessionState, TripSession};
