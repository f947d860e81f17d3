use std::ffi::c_void;

use iocmed_mediator::Mediator;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IocmedResult {
    Ok = 0,
    InvalidArgument = 1,
    PlatformUnsupported = 2,
    MissingBootReason = 3,
    ConfigError = 4,
    ChannelError = 5,
    ChannelClosed = 6,
    Internal = 99,
}

pub const IOCMED_OK: IocmedResult = IocmedResult::Ok;
pub const IOCMED_ERR_INVALID_ARGUMENT: IocmedResult = IocmedResult::InvalidArgument;
pub const IOCMED_ERR_PLATFORM_UNSUPPORTED: IocmedResult = IocmedResult::PlatformUnsupported;
pub const IOCMED_ERR_MISSING_BOOT_REASON: IocmedResult = IocmedResult::MissingBootReason;
pub const IOCMED_ERR_CONFIG: IocmedResult = IocmedResult::ConfigError;
pub const IOCMED_ERR_CHANNEL: IocmedResult = IocmedResult::ChannelError;
pub const IOCMED_ERR_CHANNEL_CLOSED: IocmedResult = IocmedResult::ChannelClosed;
pub const IOCMED_ERR_INTERNAL: IocmedResult = IocmedResult::Internal;

/// Drop counters copied out by `iocmed_stats`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IocmedStats {
    pub frames_dropped: u64,
    pub bytes_dropped: u64,
}

pub type IocmedHandle = *mut c_void;

pub(crate) struct MediatorHandle {
    pub(crate) mediator: Mediator,
}
