#![forbid(unsafe_code)]

use crate::clock::{Clock, non_negative};
use crate::domain::GeoFix;
use crate::error::{Error, PositionError};
use crate::position::{FixSink, PositionSource, Subscription, with_timeout};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Row {
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    elevation: Option<f64>,
}

/// Read fixes from CSV with a `latitude,longitude,timestamp[,elevation]`
/// header. Timestamps are RFC 3339.
pub fn read_fixes<R: Read>(reader: R) -> Result<Vec<GeoFix>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut fixes = Vec::new();
    for row in rdr.deserialize::<Row>() {
        let row = row?;
        let mut fix = GeoFix::new(row.latitude, row.longitude, row.timestamp)?;
        if let Some(elevation) = row.elevation {
            fix = fix.with_elevation(elevation);
        }
        fixes.push(fix);
    }
    Ok(fixes)
}

/// Replays a recorded track as if it came from a live sensor.
///
/// Gaps between fixes are reproduced (divided by the speed factor) and every
/// delivered fix is stamped with the clock's current time. Playback position
/// is shared between subscriptions, so a paused session resumes where it
/// stopped. Once the track is exhausted the source stays quiet.
#[derive(Clone)]
pub struct ReplaySource {
    fixes: Arc<Vec<GeoFix>>,
    cursor: Arc<AtomicUsize>,
    speed: f64,
    clock: Arc<dyn Clock>,
}

impl ReplaySource {
    pub fn new(fixes: Vec<GeoFix>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fixes: Arc::new(fixes),
            cursor: Arc::new(AtomicUsize::new(0)),
            speed: 1.0,
            clock,
        }
    }

    pub fn from_path(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let path = path.as_ref();
        let fixes = read_fixes(std::fs::File::open(path)?)?;
        info!(path = %path.display(), fixes = fixes.len(), "loaded replay track");
        Ok(Self::new(fixes, clock))
    }

    /// Playback speed multiplier; non-positive values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
        self
    }

    pub fn remaining(&self) -> usize {
        self.fixes
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    fn gap_before(&self, index: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        let (Some(prev), Some(next)) = (self.fixes.get(index - 1), self.fixes.get(index)) else {
            return Duration::ZERO;
        };
        non_negative(next.timestamp - prev.timestamp).div_f64(self.speed)
    }
}

#[async_trait]
impl PositionSource for ReplaySource {
    async fn current_fix(&self, timeout: Duration) -> Result<GeoFix, PositionError> {
        with_timeout(timeout, async {
            let index = self.cursor.load(Ordering::SeqCst);
            let fix = self.fixes.get(index).ok_or(PositionError::Unavailable)?;
            self.cursor.store(index + 1, Ordering::SeqCst);
            Ok(fix.restamped(self.clock.now()))
        })
        .await
    }

    fn watch(&self, sink: FixSink) -> Result<Subscription, PositionError> {
        let token = CancellationToken::new();
        let subscription = Subscription::new(sink.id(), token.clone());
        let source = self.clone();

        tokio::spawn(async move {
            loop {
                let index = source.cursor.load(Ordering::SeqCst);
                let Some(fix) = source.fixes.get(index) else {
                    debug!(subscription = %sink.id(), "replay track exhausted");
                    token.cancelled().await;
                    return;
                };

                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = source.clock.sleep(source.gap_before(index)) => {}
                }

                if !sink.fix(fix.restamped(source.clock.now())) {
                    return;
                }
                source.cursor.store(index + 1, Ordering::SeqCst);
            }
        });

        Ok(subscription)
    }
}
