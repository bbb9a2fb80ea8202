#![forbid(unsafe_code)]

use crate::error::PersistenceError;
use crate::persistence::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot, if any.
    async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError>;
    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
    /// Remove the stored snapshot. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Default)]
pub struct NoopSnapshotStore;

#[async_trait]
impl SnapshotStore for NoopSnapshotStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Keeps the snapshot in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore(Arc<Mutex<Option<SessionSnapshot>>>);

impl MemorySnapshotStore {
    pub fn get(&self) -> Option<SessionSnapshot> {
        self.0.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(self.get())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        *self.0.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.0.lock().take();
        Ok(())
    }
}

/// SQLite database shared by the snapshot and trip stores.
#[derive(Debug, Clone)]
pub struct Database {
    path: Option<PathBuf>,
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) a database file and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_owned();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;
        debug!(path = %path.display(), "database opened");
        Ok(Self {
            path: Some(path),
            pool,
        })
    }

    /// A private database that lives as long as this handle.
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database; keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;
        Ok(Self { path: None, pool })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let row = sqlx::query("SELECT schema_version, payload FROM session_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: i64 = row.try_get("schema_version")?;
        let schema_version = u32::try_from(raw).map_err(|_| {
            PersistenceError::Corrupt(format!("schema version out of range: {raw}"))
        })?;
        if schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(PersistenceError::SchemaMismatch {
                found: schema_version,
            });
        }

        let payload: String = row.try_get("payload")?;
        Ok(Some(serde_json::from_str(&payload)?))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query(
            "INSERT INTO session_snapshot (id, schema_version, state, saved_at, payload) \
             VALUES (1, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             schema_version = excluded.schema_version, state = excluded.state, \
             saved_at = excluded.saved_at, payload = excluded.payload",
        )
        .bind(i64::from(snapshot.schema_version))
        .bind(snapshot.state.to_string())
        .bind(snapshot.saved_at.timestamp_millis())
        .bind(payload)
        .execute(&self.pool)
        .await?;
        debug!(points = snapshot.route.len(), "snapshot persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM session_snapshot")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
