#![forbid(unsafe_code)]

mod machine;
mod state;

pub use machine::{Services, TripSession};
pub use state::{Advisory, FinishedTrip, LiveView, Recovery, SessionState, Trip};
