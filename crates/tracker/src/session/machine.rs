#![forbid(unsafe_code)]

use crate::clock::{Clock, delta, non_negative};
use crate::domain::{GeoFix, RoutePoint};
use crate::error::{Error, PositionError};
use crate::geodesy::compute_trip_stats_excluding;
use crate::persistence::{
    SNAPSHOT_SCHEMA_VERSION, SessionSnapshot, SettingsStore, SnapshotStore,
};
use crate::policy::should_record;
use crate::position::{FixSink, PositionSource, SourceEvent, Subscription, SubscriptionId};
use crate::session::{Advisory, FinishedTrip, LiveView, Recovery, SessionState, Trip};
use chrono::{DateTime, TimeDelta, Utc};
use config::{Config, RecordingConfig};
use flume::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Collaborators the session talks to.
pub struct Services {
    pub source: Box<dyn PositionSource>,
    pub snapshots: Box<dyn SnapshotStore>,
    pub settings: Box<dyn SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Tracking(Trip),
    Paused {
        trip: Trip,
        since: DateTime<Utc>,
    },
    Stopped(FinishedTrip),
}

/// Trip lifecycle: Idle -> Tracking <-> Paused -> Stopped.
///
/// All mutation goes through `&mut self`. Position fixes arrive as
/// [`SourceEvent`]s on the channel returned by [`TripSession::events`] and are
/// applied by [`TripSession::handle`], one at a time.
pub struct TripSession {
    tuning: config::Session,
    recording: RecordingConfig,
    services: Services,
    phase: Phase,
    events_tx: Sender<SourceEvent>,
    events_rx: Receiver<SourceEvent>,
    subscription: Option<Subscription>,
    next_subscription: u64,
    watch_failures: u32,
    advisories: Vec<Advisory>,
    view: watch::Sender<LiveView>,
}

impl TripSession {
    pub fn new(config: &Config, services: Services) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        let (view, _) = watch::channel(LiveView::default());
        Self {
            tuning: config.session.clone(),
            recording: config.recording,
            services,
            phase: Phase::Idle,
            events_tx,
            events_rx,
            subscription: None,
            next_subscription: 0,
            watch_failures: 0,
            advisories: Vec::new(),
            view,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Tracking(_) => SessionState::Tracking,
            Phase::Paused { .. } => SessionState::Paused,
            Phase::Stopped(_) => SessionState::Stopped,
        }
    }

    /// Settings for the next trip.
    pub fn recording(&self) -> &RecordingConfig {
        &self.recording
    }

    /// The trip in progress, if tracking or paused.
    pub fn trip(&self) -> Option<&Trip> {
        match &self.phase {
            Phase::Tracking(trip) | Phase::Paused { trip, .. } => Some(trip),
            Phase::Idle | Phase::Stopped(_) => None,
        }
    }

    pub fn route(&self) -> &[RoutePoint] {
        match &self.phase {
            Phase::Tracking(trip) | Phase::Paused { trip, .. } => &trip.route,
            Phase::Stopped(finished) => &finished.route,
            Phase::Idle => &[],
        }
    }

    pub fn current_fix(&self) -> Option<&GeoFix> {
        self.trip().and_then(|trip| trip.current_fix.as_ref())
    }

    /// Tracking time so far, pauses excluded. Frozen while paused.
    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            Phase::Idle => Duration::ZERO,
            Phase::Tracking(trip) => non_negative(
                self.services.clock.now() - trip.started_at - trip.accumulated_pause,
            ),
            Phase::Paused { trip, since } => {
                non_negative(*since - trip.started_at - trip.accumulated_pause)
            }
            Phase::Stopped(finished) => finished.active,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    /// Receiving end of the position event channel.
    pub fn events(&self) -> Receiver<SourceEvent> {
        self.events_rx.clone()
    }

    /// Live position and route summary for map rendering.
    pub fn view(&self) -> watch::Receiver<LiveView> {
        self.view.subscribe()
    }

    /// Drain non-fatal failures reported since the last call.
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    /// Replace the recording settings and persist them. Not allowed while a
    /// trip is in progress.
    pub async fn set_recording(&mut self, recording: RecordingConfig) -> Result<(), Error> {
        self.ensure_inactive("change recording settings")?;
        recording.validate()?;
        self.services.settings.save(&recording).await?;
        info!(
            mode = %recording.mode,
            interval = ?recording.interval,
            min_distance_meters = recording.min_distance_meters,
            "recording settings updated"
        );
        self.recording = recording;
        Ok(())
    }

    /// Refresh the recording settings from the settings store. A store
    /// failure keeps the current settings and is reported as an advisory.
    pub async fn load_recording(&mut self) -> Result<&RecordingConfig, Error> {
        self.ensure_inactive("load recording settings")?;
        let loaded = self
            .services
            .settings
            .load()
            .await
            .and_then(|recording| {
                recording.validate()?;
                Ok(recording)
            });
        match loaded {
            Ok(recording) => self.recording = recording,
            Err(err) => {
                warn!(%err, "keeping current recording settings");
                self.advise(Advisory::Settings(err));
            }
        }
        Ok(&self.recording)
    }

    /// Acquire an initial fix and begin tracking.
    ///
    /// The fix request is retried with a fixed backoff; permanent errors and
    /// the last transient error abort the start and leave the session idle.
    pub async fn start(&mut self) -> Result<(), Error> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(self.invalid("start"));
        }

        let fix = self.acquire_initial_fix().await?;
        self.watch_failures = 0;
        if let Err(err) = self.open_watch() {
            warn!(%err, "could not subscribe to position updates");
            return Err(err.into());
        }

        let trip = Trip::begin(self.recording, fix, self.services.clock.now());
        info!(
            mode = %trip.recording.mode,
            latitude = trip.route[0].latitude,
            longitude = trip.route[0].longitude,
            "trip started"
        );
        self.phase = Phase::Tracking(trip);
        self.persist().await;
        self.publish();
        Ok(())
    }

    /// Apply one position event. Events from cancelled subscriptions are
    /// ignored.
    pub async fn handle(&mut self, event: SourceEvent) {
        let active = self.subscription.as_ref().map(Subscription::id);
        if active != Some(event.subscription()) {
            trace!(subscription = %event.subscription(), "dropping stale position event");
            return;
        }

        match event {
            SourceEvent::Fix { fix, .. } => self.on_fix(fix).await,
            SourceEvent::Error { error, .. } => {
                warn!(%error, "position error while tracking");
                self.advise(Advisory::Position(error));
            }
            SourceEvent::Closed { error, .. } => {
                warn!(%error, "position subscription closed");
                self.subscription = None;
                self.reopen_watch(error).await;
            }
        }
    }

    /// Relay a map failure. Never affects the trip.
    pub fn report_map_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "map error");
        self.advise(Advisory::Map(message));
    }

    pub async fn pause(&mut self) -> Result<(), Error> {
        match std::mem::take(&mut self.phase) {
            Phase::Tracking(trip) => {
                self.cancel_watch();
                let since = self.services.clock.now();
                info!(points = trip.route.len(), "trip paused");
                self.phase = Phase::Paused { trip, since };
                self.persist().await;
                self.publish();
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("pause"))
            }
        }
    }

    pub async fn resume(&mut self) -> Result<(), Error> {
        match std::mem::take(&mut self.phase) {
            Phase::Paused { mut trip, since } => {
                let paused = (self.services.clock.now() - since).max(TimeDelta::zero());
                trip.accumulated_pause += paused;
                info!(paused_ms = paused.num_milliseconds(), "trip resumed");
                self.phase = Phase::Tracking(trip);
                self.watch_failures = 0;
                if let Err(err) = self.open_watch() {
                    self.reopen_watch(err).await;
                }
                self.persist().await;
                self.publish();
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("resume"))
            }
        }
    }

    /// Finish the trip and compute its statistics. The snapshot is cleared.
    pub async fn stop(&mut self) -> Result<FinishedTrip, Error> {
        let (mut trip, paused_since) = match std::mem::take(&mut self.phase) {
            Phase::Tracking(trip) => (trip, None),
            Phase::Paused { trip, since } => (trip, Some(since)),
            other => {
                self.phase = other;
                return Err(self.invalid("stop"));
            }
        };

        self.cancel_watch();
        let ended_at = self.services.clock.now();
        if let Some(since) = paused_since {
            trip.accumulated_pause += (ended_at - since).max(TimeDelta::zero());
        }

        let stats = compute_trip_stats_excluding(
            &trip.route,
            trip.started_at,
            ended_at,
            trip.accumulated_pause,
        );
        let finished = FinishedTrip {
            recording: trip.recording,
            active: non_negative(ended_at - trip.started_at - trip.accumulated_pause),
            route: trip.route,
            started_at: trip.started_at,
            ended_at,
            stats,
        };

        self.discard_snapshot().await;
        info!(
            points = finished.stats.point_count,
            distance_meters = finished.stats.total_distance_meters,
            active = ?finished.active,
            "trip stopped"
        );
        self.phase = Phase::Stopped(finished.clone());
        self.publish();
        Ok(finished)
    }

    /// Return a stopped session to idle, handing back the finished trip.
    pub fn reset(&mut self) -> Result<FinishedTrip, Error> {
        match std::mem::take(&mut self.phase) {
            Phase::Stopped(finished) => {
                self.publish();
                Ok(finished)
            }
            other => {
                self.phase = other;
                Err(self.invalid("reset"))
            }
        }
    }

    /// Inspect the persisted snapshot at process start.
    ///
    /// A snapshot that has been silent for longer than the interruption
    /// threshold, or that was flushed on exit while tracking, is discarded. A
    /// fresh tracking snapshot is restored and position updates resume. A
    /// fresh paused one is restored as paused.
    pub async fn recover(&mut self) -> Result<Recovery, Error> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(self.invalid("recover"));
        }

        let snapshot = match self.services.snapshots.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(Recovery::Fresh),
            Err(err) => {
                warn!(%err, "unreadable session snapshot, discarding");
                self.advise(Advisory::Snapshot(err));
                self.discard_snapshot().await;
                return Ok(Recovery::Fresh);
            }
        };

        let now = self.services.clock.now();
        let last_seen = snapshot.heartbeat();
        let points = snapshot.route.len();
        let stale = now - last_seen > delta(self.tuning.interruption_threshold);
        let state = snapshot.state;
        let interrupted = snapshot.interrupted;
        let paused_at = snapshot.paused_at.unwrap_or(snapshot.saved_at);

        match state {
            SessionState::Tracking | SessionState::Paused if interrupted || stale => {
                warn!(%last_seen, points, interrupted, "previous trip was interrupted, discarding");
                self.discard_snapshot().await;
                Ok(Recovery::Interrupted { last_seen, points })
            }
            SessionState::Tracking | SessionState::Paused => {
                let Some(trip) = restore_trip(snapshot) else {
                    warn!("session snapshot has an empty route, discarding");
                    self.discard_snapshot().await;
                    return Ok(Recovery::Fresh);
                };

                if state == SessionState::Paused {
                    self.phase = Phase::Paused {
                        trip,
                        since: paused_at,
                    };
                } else {
                    self.phase = Phase::Tracking(trip);
                    self.watch_failures = 0;
                    if let Err(err) = self.open_watch() {
                        self.reopen_watch(err).await;
                    }
                    self.persist().await;
                }
                info!(%state, points, "restored trip in progress");
                self.publish();
                Ok(Recovery::Resumed { state, points })
            }
            SessionState::Idle | SessionState::Stopped => {
                debug!(%state, "ignoring snapshot of an inactive session");
                self.discard_snapshot().await;
                Ok(Recovery::Fresh)
            }
        }
    }

    /// Flush the snapshot before the process goes away. A tracking trip is
    /// marked interrupted so the next start discards it.
    pub async fn mark_interrupted(&mut self) -> Result<(), Error> {
        let Some(mut snapshot) = self.snapshot() else {
            return Err(self.invalid("flush"));
        };
        snapshot.interrupted = snapshot.state == SessionState::Tracking;
        self.services.snapshots.save(&snapshot).await?;
        debug!(interrupted = snapshot.interrupted, "snapshot flushed on exit");
        Ok(())
    }

    async fn acquire_initial_fix(&mut self) -> Result<GeoFix, PositionError> {
        let attempts = self.tuning.start_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .services
                .source
                .current_fix(self.tuning.fix_timeout)
                .await
            {
                Ok(fix) => return Ok(fix),
                Err(err) if err.is_permanent() => {
                    warn!(%err, "cannot start trip");
                    return Err(err);
                }
                Err(err) if attempt >= attempts => {
                    warn!(%err, attempts, "no initial fix, giving up");
                    return Err(err);
                }
                Err(err) => {
                    debug!(%err, attempt, "initial fix failed, retrying");
                    self.services.clock.sleep(self.tuning.start_backoff).await;
                }
            }
        }
    }

    async fn on_fix(&mut self, fix: GeoFix) {
        let Phase::Tracking(trip) = &mut self.phase else {
            return;
        };
        self.watch_failures = 0;

        let last = trip.last_recorded_point();
        let in_order = last.is_none_or(|point| fix.timestamp >= point.timestamp);
        let record = in_order
            && should_record(&fix, last, Some(trip.last_recorded_at), &trip.recording);

        trip.current_fix = Some(fix.clone());
        if record {
            trip.last_recorded_at = fix.timestamp;
            trip.route.push(fix);
            debug!(points = trip.route.len(), "route point recorded");
        } else if !in_order {
            debug!(timestamp = %fix.timestamp, "ignoring out-of-order fix");
        } else {
            trace!("fix below recording threshold");
        }

        self.persist().await;
        self.publish();
    }

    /// Re-open a dead subscription, backing off between attempts, until it
    /// works or the retry ceiling is hit. The session stays tracking either
    /// way.
    async fn reopen_watch(&mut self, mut error: PositionError) {
        loop {
            if !matches!(self.phase, Phase::Tracking(_)) {
                return;
            }
            if self.watch_failures >= self.tuning.watch_retry_limit {
                error!(attempts = self.watch_failures, %error, "giving up on position updates");
                self.advise(Advisory::WatchLost {
                    attempts: self.watch_failures,
                    error,
                });
                return;
            }

            self.watch_failures += 1;
            warn!(attempt = self.watch_failures, %error, "re-opening position subscription");
            self.services.clock.sleep(self.tuning.watch_backoff).await;
            match self.open_watch() {
                Ok(()) => return,
                Err(err) => error = err,
            }
        }
    }

    fn open_watch(&mut self) -> Result<(), PositionError> {
        self.cancel_watch();
        self.next_subscription += 1;
        let sink = FixSink::new(
            SubscriptionId(self.next_subscription),
            self.events_tx.clone(),
        );
        let subscription = self.services.source.watch(sink)?;
        debug!(subscription = %subscription.id(), "position subscription opened");
        self.subscription = Some(subscription);
        Ok(())
    }

    fn cancel_watch(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            debug!(subscription = %subscription.id(), "position subscription cancelled");
        }
    }

    fn snapshot(&self) -> Option<SessionSnapshot> {
        let (trip, state, paused_at) = match &self.phase {
            Phase::Tracking(trip) => (trip, SessionState::Tracking, None),
            Phase::Paused { trip, since } => (trip, SessionState::Paused, Some(*since)),
            Phase::Idle | Phase::Stopped(_) => return None,
        };

        Some(SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            state,
            recording: trip.recording,
            route: trip.route.clone(),
            started_at: trip.started_at,
            last_recorded_point: trip.route.last().cloned(),
            last_recorded_at: trip.last_recorded_at,
            current_fix: trip.current_fix.clone(),
            accumulated_pause_ms: trip.accumulated_pause.num_milliseconds(),
            paused_at,
            saved_at: self.services.clock.now(),
            interrupted: false,
        })
    }

    /// Best effort: a failed write is reported, never rolled back.
    async fn persist(&mut self) {
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        if let Err(err) = self.services.snapshots.save(&snapshot).await {
            warn!(%err, "failed to write session snapshot");
            self.advise(Advisory::Snapshot(err));
        }
    }

    async fn discard_snapshot(&mut self) {
        if let Err(err) = self.services.snapshots.clear().await {
            warn!(%err, "failed to clear session snapshot");
            self.advise(Advisory::Snapshot(err));
        }
    }

    fn publish(&self) {
        let route = self.route();
        self.view.send_replace(LiveView {
            state: self.state(),
            current_fix: self.current_fix().cloned(),
            route_len: route.len(),
            last_point: route.last().cloned(),
        });
    }

    fn advise(&mut self, advisory: Advisory) {
        self.advisories.push(advisory);
    }

    fn ensure_inactive(&self, operation: &'static str) -> Result<(), Error> {
        match self.phase {
            Phase::Tracking(_) | Phase::Paused { .. } => Err(self.invalid(operation)),
            Phase::Idle | Phase::Stopped(_) => Ok(()),
        }
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidTransition {
            operation,
            state: self.state(),
        }
    }
}

impl Drop for TripSession {
    fn drop(&mut self) {
        self.cancel_watch();
    }
}

fn restore_trip(snapshot: SessionSnapshot) -> Option<Trip> {
    if snapshot.route.is_empty() {
        return None;
    }
    if snapshot.last_recorded_point.as_ref() != snapshot.route.last() {
        warn!("snapshot last point disagrees with its route, trusting the route");
    }
    Some(Trip {
        recording: snapshot.recording,
        route: snapshot.route,
        started_at: snapshot.started_at,
        last_recorded_at: snapshot.last_recorded_at,
        accumulated_pause: TimeDelta::milliseconds(snapshot.accumulated_pause_ms.max(0)),
        current_fix: snapshot.current_fix,
    })
}
