//! iocmed-ffi: C-ABI exports for embedding the IOC mediator in a device model.

mod args;
mod error;
mod mediator;
mod types;

use std::panic::AssertUnwindSafe;

pub use mediator::{
    iocmed_deinit, iocmed_init, iocmed_init_from_file, iocmed_is_core_running, iocmed_stats,
    iocmed_xmit,
};
pub use types::{
    IocmedHandle, IocmedResult, IocmedStats, IOCMED_ERR_CHANNEL, IOCMED_ERR_CHANNEL_CLOSED,
    IOCMED_ERR_CONFIG, IOCMED_ERR_INTERNAL, IOCMED_ERR_INVALID_ARGUMENT,
    IOCMED_ERR_MISSING_BOOT_REASON, IOCMED_ERR_PLATFORM_UNSUPPORTED, IOCMED_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Message for the last failed call on this thread, or an empty string.
#[no_mangle]
pub extern "C" fn iocmed_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
