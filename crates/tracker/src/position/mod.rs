#![forbid(unsafe_code)]

mod replay;
mod source;

pub use replay::{ReplaySource, read_fixes};
pub use source::{
    FixSink, PositionSource, SourceEvent, Subscription, SubscriptionId, with_timeout,
};
