use std::fmt;
use std::io;

use iocmed_channel::ChannelError;
use iocmed_frame::FrameError;
use iocmed_mediator::MediatorError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CHANNEL_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => CHANNEL_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Open { source, .. } | ChannelError::VirtualUart { source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
        }
        ChannelError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        ChannelError::Io(source) => io_error(context, source),
        other => CliError::new(CHANNEL_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::ServiceTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn mediator_error(context: &str, err: MediatorError) -> CliError {
    match err {
        MediatorError::PlatformUnsupported => {
            CliError::new(HEALTH_CHECK_FAILED, format!("{context}: {err}"))
        }
        MediatorError::MissingBootReason | MediatorError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        MediatorError::ConfigRead { source, path } => {
            io_error(&format!("{context}: reading {}", path.display()), source)
        }
        MediatorError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        MediatorError::Channel(err) => channel_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
