use std::path::PathBuf;

use crate::queue::QueueKind;

/// Errors that stop the mediator from starting.
#[derive(Debug, thiserror::Error)]
pub enum MediatorError {
    /// The platform-support probe failed.
    #[error("platform does not support the IOC mediator")]
    PlatformUnsupported,

    /// No boot reason was supplied.
    #[error("missing IOC boot reason")]
    MissingBootReason,

    /// Invalid startup parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for [`MediatorConfig`](crate::MediatorConfig).
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel open failure on a critical channel.
    #[error("channel error: {0}")]
    Channel(#[from] iocmed_channel::ChannelError),

    /// The readiness multiplexer could not be created or armed.
    #[error("multiplexer setup failed: {0}")]
    Multiplexer(std::io::Error),

    /// A mediator thread could not be spawned.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MediatorError>;

/// Queue-level failures seen by the worker threads.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A thread panicked while holding the queue lock.
    #[error("{0:?} queue lock poisoned")]
    Poisoned(QueueKind),
}
