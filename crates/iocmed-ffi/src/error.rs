use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use iocmed_channel::ChannelError;
use iocmed_mediator::MediatorError;

use crate::types::IocmedResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| *state.borrow_mut() = CString::default());
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> IocmedResult {
    set_error_message(message);
    IocmedResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_channel_error(err: &ChannelError) -> IocmedResult {
    set_error_message(err.to_string());
    match err {
        ChannelError::NotOpen(_) | ChannelError::Closed(_) => IocmedResult::ChannelClosed,
        _ => IocmedResult::ChannelError,
    }
}

pub(crate) fn map_mediator_error(err: &MediatorError) -> IocmedResult {
    if let MediatorError::Channel(channel) = err {
        return map_channel_error(channel);
    }
    set_error_message(err.to_string());
    match err {
        MediatorError::PlatformUnsupported => IocmedResult::PlatformUnsupported,
        MediatorError::MissingBootReason => IocmedResult::MissingBootReason,
        MediatorError::InvalidConfig(_)
        | MediatorError::ConfigRead { .. }
        | MediatorError::Json(_) => IocmedResult::ConfigError,
        MediatorError::Channel(_) => IocmedResult::ChannelError,
        MediatorError::Multiplexer(_) | MediatorError::Spawn { .. } => IocmedResult::Internal,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
