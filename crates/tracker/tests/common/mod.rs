#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use config::Config;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracker::clock::ManualClock;
use tracker::persistence::{
    MemorySettingsStore, MemorySnapshotStore, SessionSnapshot, SnapshotStore,
};
use tracker::position::{FixSink, PositionSource, Subscription};
use tracker::{GeoFix, PersistenceError, PositionError, Services, TripSession};

/// Meters per degree of latitude on the haversine sphere.
pub const METERS_PER_DEGREE: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::TimeDelta::seconds(secs)
}

/// A fix `meters` due north of the origin, observed `secs` after `t0`.
pub fn north(meters: f64, secs: i64) -> GeoFix {
    GeoFix::new(45.0 + meters / METERS_PER_DEGREE, 7.0, at(secs)).unwrap()
}

#[derive(Default)]
struct Script {
    one_shots: VecDeque<Result<GeoFix, PositionError>>,
    watch_failures: VecDeque<PositionError>,
    sinks: Vec<FixSink>,
    fix_requests: usize,
    watch_requests: usize,
}

/// Position source driven by the test. Clones share the script.
#[derive(Clone, Default)]
pub struct ScriptedSource(Arc<Mutex<Script>>);

impl ScriptedSource {
    pub fn push_fix(&self, fix: GeoFix) {
        self.0.lock().one_shots.push_back(Ok(fix));
    }

    pub fn push_error(&self, error: PositionError) {
        self.0.lock().one_shots.push_back(Err(error));
    }

    pub fn fail_next_watch(&self, error: PositionError) {
        self.0.lock().watch_failures.push_back(error);
    }

    pub fn fix_requests(&self) -> usize {
        self.0.lock().fix_requests
    }

    pub fn watch_requests(&self) -> usize {
        self.0.lock().watch_requests
    }

    /// Sink of the most recently opened subscription.
    pub fn sink(&self) -> FixSink {
        self.0
            .lock()
            .sinks
            .last()
            .cloned()
            .expect("no subscription was opened")
    }

    pub fn emit(&self, fix: GeoFix) {
        assert!(self.sink().fix(fix));
    }

    pub fn emit_error(&self, error: PositionError) {
        assert!(self.sink().error(error));
    }

    pub fn close(&self, error: PositionError) {
        assert!(self.sink().closed(error));
    }
}

#[async_trait]
impl PositionSource for ScriptedSource {
    async fn current_fix(&self, _timeout: Duration) -> Result<GeoFix, PositionError> {
        let mut script = self.0.lock();
        script.fix_requests += 1;
        script
            .one_shots
            .pop_front()
            .unwrap_or(Err(PositionError::Unavailable))
    }

    fn watch(&self, sink: FixSink) -> Result<Subscription, PositionError> {
        let mut script = self.0.lock();
        script.watch_requests += 1;
        if let Some(error) = script.watch_failures.pop_front() {
            return Err(error);
        }
        let subscription = Subscription::new(sink.id(), CancellationToken::new());
        script.sinks.push(sink);
        Ok(subscription)
    }
}

/// Snapshot store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenSnapshotStore;

#[async_trait]
impl SnapshotStore for BrokenSnapshotStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        Err(PersistenceError::Corrupt("disk full".into()))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

pub struct Harness {
    pub source: ScriptedSource,
    pub snapshots: MemorySnapshotStore,
    pub settings: MemorySettingsStore,
    pub clock: ManualClock,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            source: ScriptedSource::default(),
            snapshots: MemorySnapshotStore::default(),
            settings: MemorySettingsStore::new(config.recording),
            clock: ManualClock::new(t0()),
            config,
        }
    }

    pub fn session(&self) -> TripSession {
        self.session_with(Box::new(self.snapshots.clone()))
    }

    pub fn session_with(&self, snapshots: Box<dyn SnapshotStore>) -> TripSession {
        TripSession::new(
            &self.config,
            Services {
                source: Box::new(self.source.clone()),
                snapshots,
                settings: Box::new(self.settings.clone()),
                clock: Arc::new(self.clock.clone()),
            },
        )
    }

    /// Queue an initial fix at the origin and start tracking.
    pub async fn started(&self) -> TripSession {
        self.source.push_fix(north(0.0, 0));
        let mut session = self.session();
        session.start().await.unwrap();
        session
    }
}

/// Apply every event currently waiting on the session channel.
pub async fn drain(session: &mut TripSession) {
    let events = session.events();
    while let Ok(event) = events.try_recv() {
        session.handle(event).await;
    }
}
