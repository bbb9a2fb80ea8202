#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Persistence {
    /// Path to the SQLite database holding trips and the session snapshot.
    ///
    /// `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,

    /// Write crash-recovery snapshots while tracking.
    pub snapshots: bool,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            database_path: None,
            snapshots: true,
        }
    }
}
