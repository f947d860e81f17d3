use std::path::PathBuf;

use crate::id::ChannelId;

/// Errors that can occur while opening or using a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to open a native character device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A step of the virtual UART setup failed.
    #[error("virtual uart setup failed at {stage} for {path}: {source}")]
    VirtualUart {
        path: PathBuf,
        stage: &'static str,
        source: std::io::Error,
    },

    /// The virtual UART path exceeds the configured maximum.
    #[error("virtual uart path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A channel the mediator cannot run without failed to open.
    #[error("critical channel {id} unavailable: {source}")]
    CriticalUnavailable {
        id: ChannelId,
        source: Box<ChannelError>,
    },

    /// The channel has no open handle (disabled, failed to open, or closed).
    #[error("channel {0} is not open")]
    NotOpen(ChannelId),

    /// The channel accepted zero bytes on write.
    #[error("channel {0} closed")]
    Closed(ChannelId),

    /// An I/O error occurred on an open channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
