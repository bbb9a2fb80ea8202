#![forbid(unsafe_code)]

use crate::error::PersistenceError;
use async_trait::async_trait;
use config::{Config, RecordingConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Durable home of the user's recording settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<RecordingConfig, PersistenceError>;

    async fn save(&self, recording: &RecordingConfig) -> Result<(), PersistenceError>;
}

/// Reads and writes the `[recording]` table of the config file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsStore for TomlSettingsStore {
    async fn load(&self) -> Result<RecordingConfig, PersistenceError> {
        let path = self.path.clone();
        let config = tokio::task::spawn_blocking(move || Config::load(path)).await??;
        Ok(config.recording)
    }

    async fn save(&self, recording: &RecordingConfig) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        let recording = *recording;
        tokio::task::spawn_blocking(move || recording.store(path)).await??;
        debug!(path = %self.path.display(), "recording settings saved");
        Ok(())
    }
}

/// Settings held in memory. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore(Arc<Mutex<RecordingConfig>>);

impl MemorySettingsStore {
    pub fn new(recording: RecordingConfig) -> Self {
        Self(Arc::new(Mutex::new(recording)))
    }

    pub fn get(&self) -> RecordingConfig {
        *self.0.lock()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<RecordingConfig, PersistenceError> {
        Ok(self.get())
    }

    async fn save(&self, recording: &RecordingConfig) -> Result<(), PersistenceError> {
        recording.validate()?;
        *self.0.lock() = *recording;
        Ok(())
    }
}
