#![forbid(unsafe_code)]

mod error;
mod geocode;
mod persistence;
mod recording;
mod recording_mode;
mod session;

pub use error::Error;
pub use geocode::Geocode;
pub use persistence::Persistence;
pub use recording::RecordingConfig;
pub use recording_mode::RecordingMode;
pub use session::Session;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub recording: RecordingConfig,
    pub session: Session,
    pub geocode: Geocode,
    pub persistence: Persistence,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file layered over the defaults. A missing file yields
    /// the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath(path.to_owned()));
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()?;
        config.recording.validate()?;
        Ok(config)
    }

    /// Write the whole config as a fresh TOML document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.recording.validate()?;
        let raw = toml_edit::ser::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
