#![forbid(unsafe_code)]

mod repo;
mod settings;
mod snapshot;
mod trips;

pub use repo::{Database, MemorySnapshotStore, NoopSnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use settings::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
pub use snapshot::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot};
pub use trips::{SqliteTripStore, TripRecord, TripStore, TripUpdate};
