#![forbid(unsafe_code)]

use crate::domain::RoutePoint;
use crate::error::{Error, PersistenceError};
use crate::persistence::Database;
use crate::session::FinishedTrip;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};

/// A completed trip as kept in trip history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    pub name: String,
    pub notes: String,
    pub route: Vec<RoutePoint>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub start_point: Option<RoutePoint>,
    pub end_point: Option<RoutePoint>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripRecord {
    /// Build a record from a finished trip. The name is trimmed and must not
    /// be empty.
    pub fn new(
        name: &str,
        notes: &str,
        finished: &FinishedTrip,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidTrip("a trip needs a name".into()));
        }

        let stats = &finished.stats;
        Ok(Self {
            id: None,
            name: name.to_owned(),
            notes: notes.trim().to_owned(),
            route: finished.route.clone(),
            distance_meters: stats.total_distance_meters,
            duration_seconds: stats.duration_seconds,
            average_speed_kmh: stats.average_speed_kmh,
            max_speed_kmh: stats.max_speed_kmh,
            start_point: stats.start_point.clone(),
            end_point: stats.end_point.clone(),
            start_time: finished.started_at,
            end_time: finished.ended_at,
            is_favorite: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a stored trip. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub is_favorite: Option<bool>,
}

impl TripUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.notes.is_none() && self.is_favorite.is_none()
    }
}

#[async_trait]
pub trait TripStore: Send + Sync {
    /// Store a new trip and return its id.
    async fn insert(&self, record: &TripRecord) -> Result<i64, PersistenceError>;

    /// All trips, newest first.
    async fn list(&self) -> Result<Vec<TripRecord>, PersistenceError>;

    async fn update(
        &self,
        id: i64,
        update: &TripUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTripStore {
    pool: SqlitePool,
}

impl SqliteTripStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl TripStore for SqliteTripStore {
    async fn insert(&self, record: &TripRecord) -> Result<i64, PersistenceError> {
        let route = serde_json::to_string(&record.route)?;
        let start_point = record
            .start_point
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let end_point = record
            .end_point
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let id = sqlx::query(
            "INSERT INTO trips (name, notes, route, distance_meters, duration_seconds, \
             average_speed_kmh, max_speed_kmh, start_point, end_point, start_time, end_time, \
             is_favorite, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.name)
        .bind(&record.notes)
        .bind(route)
        .bind(record.distance_meters)
        .bind(record.duration_seconds)
        .bind(record.average_speed_kmh)
        .bind(record.max_speed_kmh)
        .bind(start_point)
        .bind(end_point)
        .bind(record.start_time.timestamp_millis())
        .bind(record.end_time.timestamp_millis())
        .bind(record.is_favorite)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(id, name = %record.name, points = record.route.len(), "trip saved");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<TripRecord>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, name, notes, route, distance_meters, duration_seconds, \
             average_speed_kmh, max_speed_kmh, start_point, end_point, start_time, end_time, \
             is_favorite, created_at, updated_at \
             FROM trips ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_trip).collect()
    }

    async fn update(
        &self,
        id: i64,
        update: &TripUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(PersistenceError::InvalidUpdate(
                    "trip name cannot be blank".into(),
                ));
            }
            other => other,
        };

        let result = sqlx::query(
            "UPDATE trips SET \
             name = COALESCE(?, name), \
             notes = COALESCE(?, notes), \
             is_favorite = COALESCE(?, is_favorite), \
             updated_at = ? \
             WHERE id = ?",
        )
        .bind(name)
        .bind(update.notes.as_deref())
        .bind(update.is_favorite)
        .bind(at.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::TripMissing(id));
        }
        debug!(id, ?update, "trip updated");
        Ok(())
    }
}

fn decode_trip(row: &SqliteRow) -> Result<TripRecord, PersistenceError> {
    let point = |column: &str| -> Result<Option<RoutePoint>, PersistenceError> {
        let raw: Option<String> = row.try_get(column)?;
        Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
    };
    let route: String = row.try_get("route")?;

    Ok(TripRecord {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        notes: row.try_get("notes")?,
        route: serde_json::from_str(&route)?,
        distance_meters: row.try_get("distance_meters")?,
        duration_seconds: row.try_get("duration_seconds")?,
        average_speed_kmh: row.try_get("average_speed_kmh")?,
        max_speed_kmh: row.try_get("max_speed_kmh")?,
        start_point: point("start_point")?,
        end_point: point("end_point")?,
        start_time: millis(row, "start_time")?,
        end_time: millis(row, "end_time")?,
        is_favorite: row.try_get("is_favorite")?,
        created_at: millis(row, "created_at")?,
        updated_at: millis(row, "updated_at")?,
    })
}

fn millis(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, PersistenceError> {
    let raw: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(raw)
        .ok_or_else(|| PersistenceError::Corrupt(format!("{column} out of range: {raw}")))
}
