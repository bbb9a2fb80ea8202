#![forbid(unsafe_code)]

use crate::error::Error;
use crate::recording_mode::RecordingMode;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::Path;
use std::time::Duration;
use toml_edit::{DocumentMut, Item};

const RECORDING_TABLE: &str = "recording";

#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    pub mode: RecordingMode,

    /// Minimum time between recorded points, in whole seconds.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub interval: Duration,

    /// Minimum travelled distance between recorded points.
    pub min_distance_meters: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Time,
            interval: Duration::from_secs(20),
            min_distance_meters: 100.0,
        }
    }
}

impl RecordingConfig {
    pub fn time(interval: Duration) -> Self {
        Self {
            mode: RecordingMode::Time,
            interval,
            ..Self::default()
        }
    }

    pub fn distance(min_distance_meters: f64) -> Self {
        Self {
            mode: RecordingMode::Distance,
            min_distance_meters,
            ..Self::default()
        }
    }

    /// Reject a zero interval or a non-positive distance threshold.
    pub fn validate(&self) -> Result<(), Error> {
        if self.interval.as_secs() == 0 {
            return Err(Error::InvalidRecording(
                "interval must be at least one second".into(),
            ));
        }
        if !self.min_distance_meters.is_finite() || self.min_distance_meters <= 0.0 {
            return Err(Error::InvalidRecording(format!(
                "min_distance_meters must be positive, got {}",
                self.min_distance_meters
            )));
        }
        Ok(())
    }

    /// Rewrite the `[recording]` table of a TOML file, keeping the rest of
    /// the document (comments included) untouched. Creates the file if it
    /// does not exist.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.validate()?;
        let path = path.as_ref();
        let mut doc = match std::fs::read_to_string(path) {
            Ok(raw) => raw.parse::<DocumentMut>()?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => DocumentMut::new(),
            Err(err) => return Err(err.into()),
        };

        let table = toml_edit::ser::to_document(self)?;
        doc[RECORDING_TABLE] = Item::Table(table.as_table().clone());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, doc.to_string())?;
        Ok(())
    }
}
