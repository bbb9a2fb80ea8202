#![forbid(unsafe_code)]

use crate::domain::GeoFix;
use crate::error::PositionError;
use async_trait::async_trait;
use flume::Sender;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Request a single fix. Fails with [`PositionError::Timeout`] once
    /// `timeout` has passed. Never retries.
    async fn current_fix(&self, timeout: Duration) -> Result<GeoFix, PositionError>;

    /// Start delivering fixes into `sink` until the returned subscription is
    /// cancelled. Errors pushed into the sink do not end the subscription.
    fn watch(&self, sink: FixSink) -> Result<Subscription, PositionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Messages a subscription delivers to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix {
        subscription: SubscriptionId,
        fix: GeoFix,
    },
    /// Transient sensor failure; the subscription stays open.
    Error {
        subscription: SubscriptionId,
        error: PositionError,
    },
    /// The subscription died and will deliver nothing more.
    Closed {
        subscription: SubscriptionId,
        error: PositionError,
    },
}

impl SourceEvent {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            Self::Fix { subscription, .. }
            | Self::Error { subscription, .. }
            | Self::Closed { subscription, .. } => *subscription,
        }
    }
}

/// Write end handed to a source when a subscription is opened.
#[derive(Debug, Clone)]
pub struct FixSink {
    id: SubscriptionId,
    tx: Sender<SourceEvent>,
}

impl FixSink {
    pub fn new(id: SubscriptionId, tx: Sender<SourceEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns `false` once nobody is listening anymore.
    pub fn fix(&self, fix: GeoFix) -> bool {
        self.send(SourceEvent::Fix {
            subscription: self.id,
            fix,
        })
    }

    pub fn error(&self, error: PositionError) -> bool {
        self.send(SourceEvent::Error {
            subscription: self.id,
            error,
        })
    }

    pub fn closed(&self, error: PositionError) -> bool {
        self.send(SourceEvent::Closed {
            subscription: self.id,
            error,
        })
    }

    fn send(&self, event: SourceEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Handle for a running watch. Cancelling is idempotent; dropping cancels.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    token: CancellationToken,
}

impl Subscription {
    pub fn new(id: SubscriptionId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Bound a fix request, mapping expiry to [`PositionError::Timeout`].
pub async fn with_timeout<F>(timeout: Duration, request: F) -> Result<GeoFix, PositionError>
where
    F: Future<Output = Result<GeoFix, PositionError>>,
{
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| PositionError::Timeout)?
}
