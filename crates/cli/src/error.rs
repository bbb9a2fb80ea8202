use crate::signals::SignalEvent;
use flume::SendError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to install signal handler: {0}")]
    SignalHandler(#[source] io::Error),

    #[error("Failed to send signal event: {0}")]
    SendSignal(#[from] SendError<SignalEvent>),

    #[error("`settings set` needs a config file, pass one with --conffile")]
    NoConfigFile,

    #[error("Nothing to change, pass at least one field")]
    EmptyUpdate,
}
