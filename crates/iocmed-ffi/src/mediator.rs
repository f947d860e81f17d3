use std::os::raw::c_char;

use iocmed_channel::ChannelId;
use iocmed_mediator::{Mediator, MediatorConfig};

use crate::args;
use crate::error;
use crate::types::{IocmedHandle, IocmedResult, IocmedStats, MediatorHandle};

fn with_mediator<T>(handle: IocmedHandle, on_error: T, f: impl FnOnce(&Mediator) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("mediator handle cannot be null");
        return on_error;
    }

    let mediator_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *const MediatorHandle) }
    };

    f(&mediator_handle.mediator)
}

fn start(config: iocmed_mediator::Result<MediatorConfig>) -> IocmedHandle {
    match config.and_then(Mediator::start) {
        Ok(mediator) => Box::into_raw(Box::new(MediatorHandle { mediator })) as IocmedHandle,
        Err(err) => {
            let _ = error::map_mediator_error(&err);
            std::ptr::null_mut()
        }
    }
}

/// Start a mediator from a device-model option string
/// (`<virtual uart path>,<boot reason>`).
///
/// Returns NULL on failure; `iocmed_last_error` describes why.
///
/// # Safety
/// `opts` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn iocmed_init(opts: *const c_char) -> IocmedHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(opts) = (unsafe { args::required_str_arg(opts, "opts") }) else {
            return std::ptr::null_mut();
        };
        start(MediatorConfig::from_opts(opts))
    })
}

/// Start a mediator from a JSON configuration file.
///
/// # Safety
/// `path` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn iocmed_init_from_file(path: *const c_char) -> IocmedHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(path) = (unsafe { args::required_str_arg(path, "path") }) else {
            return std::ptr::null_mut();
        };
        start(MediatorConfig::from_json_file(path))
    })
}

/// Stop the mediator and free its handle.
///
/// # Safety
/// `handle` must be null or a handle returned by `iocmed_init*`, not yet freed.
#[no_mangle]
pub unsafe extern "C" fn iocmed_deinit(handle: IocmedHandle) {
    crate::ffi_boundary((), || {
        if handle.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by iocmed_init*.
        let MediatorHandle { mediator } = *unsafe { Box::from_raw(handle as *mut MediatorHandle) };
        mediator.deinit();
    });
}

/// Write raw bytes to the channel addressed by `mux`.
///
/// # Safety
/// `handle` must be a valid mediator handle. If `len > 0`, `data` must be
/// readable for `len` bytes. `out_written` may be null.
#[no_mangle]
pub unsafe extern "C" fn iocmed_xmit(
    handle: IocmedHandle,
    mux: u8,
    data: *const u8,
    len: usize,
    out_written: *mut usize,
) -> IocmedResult {
    crate::ffi_boundary(IocmedResult::Internal, || {
        error::clear_error_state();

        let Some(id) = ChannelId::from_mux(mux) else {
            return error::set_invalid_argument(format!("unknown channel mux {mux}"));
        };
        // SAFETY: We validate null/length in helper.
        let Some(payload) = (unsafe { args::bytes_arg(data, len, "data") }) else {
            return IocmedResult::InvalidArgument;
        };

        with_mediator(handle, IocmedResult::InvalidArgument, |mediator| {
            match mediator.xmit(id, payload) {
                Ok(written) => {
                    if !out_written.is_null() {
                        // SAFETY: Pointer was checked for null above.
                        unsafe { *out_written = written };
                    }
                    IocmedResult::Ok
                }
                Err(err) => error::map_mediator_error(&err),
            }
        })
    })
}

/// Copy the drop counters into `out_stats`.
///
/// # Safety
/// `handle` must be a valid mediator handle; `out_stats` must be writable.
#[no_mangle]
pub unsafe extern "C" fn iocmed_stats(
    handle: IocmedHandle,
    out_stats: *mut IocmedStats,
) -> IocmedResult {
    crate::ffi_boundary(IocmedResult::Internal, || {
        error::clear_error_state();

        if out_stats.is_null() {
            return error::set_invalid_argument("out_stats cannot be null");
        }
        with_mediator(handle, IocmedResult::InvalidArgument, |mediator| {
            let stats = mediator.stats();
            // SAFETY: Pointer was checked for null above.
            unsafe {
                *out_stats = IocmedStats {
                    frames_dropped: stats.frames_dropped,
                    bytes_dropped: stats.bytes_dropped,
                };
            }
            IocmedResult::Ok
        })
    })
}

/// 1 while the core thread is polling, 0 after it exited or on a bad handle.
///
/// # Safety
/// `handle` must be null or a valid mediator handle.
#[no_mangle]
pub unsafe extern "C" fn iocmed_is_core_running(handle: IocmedHandle) -> i32 {
    crate::ffi_boundary(0, || {
        with_mediator(handle, 0, |mediator| i32::from(mediator.is_core_running()))
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;

    fn last_error() -> String {
        // SAFETY: iocmed_last_error returns a pointer to a thread-local CString.
        unsafe { CStr::from_ptr(crate::iocmed_last_error()) }
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn init_rejects_null_opts() {
        // SAFETY: Null is explicitly handled.
        let handle = unsafe { iocmed_init(std::ptr::null()) };
        assert!(handle.is_null());
        assert!(last_error().contains("opts cannot be null"));
    }

    #[test]
    fn init_rejects_empty_path() {
        let opts = CString::new(",0x20").unwrap();
        // SAFETY: `opts` is a valid C string.
        let handle = unsafe { iocmed_init(opts.as_ptr()) };
        assert!(handle.is_null());
        assert!(last_error().contains("virtual uart path"));
    }

    #[test]
    fn init_from_missing_file_fails() {
        let path = CString::new("/nonexistent/iocmed.json").unwrap();
        // SAFETY: `path` is a valid C string.
        let handle = unsafe { iocmed_init_from_file(path.as_ptr()) };
        assert!(handle.is_null());
        assert!(last_error().contains("failed to read config"));
    }

    #[test]
    fn xmit_rejects_null_handle_and_unknown_mux() {
        let data = [1u8, 2, 3];
        // SAFETY: Null handle is explicitly handled.
        let result = unsafe {
            iocmed_xmit(
                std::ptr::null_mut(),
                ChannelId::Raw0.mux(),
                data.as_ptr(),
                data.len(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, IocmedResult::InvalidArgument);

        // SAFETY: Mux is validated before the handle is touched.
        let result = unsafe {
            iocmed_xmit(
                std::ptr::null_mut(),
                0xFF,
                data.as_ptr(),
                data.len(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, IocmedResult::InvalidArgument);
        assert!(last_error().contains("unknown channel mux"));
    }

    #[test]
    fn stats_and_liveness_reject_null_handle() {
        let mut stats = IocmedStats::default();
        // SAFETY: Null handle is explicitly handled.
        let result = unsafe { iocmed_stats(std::ptr::null_mut(), &mut stats) };
        assert_eq!(result, IocmedResult::InvalidArgument);
        // SAFETY: Null handle is explicitly handled.
        assert_eq!(unsafe { iocmed_is_core_running(std::ptr::null_mut()) }, 0);
    }

    #[test]
    fn deinit_null_is_noop() {
        // SAFETY: Null is explicitly handled.
        unsafe { iocmed_deinit(std::ptr::null_mut()) };
    }
}
