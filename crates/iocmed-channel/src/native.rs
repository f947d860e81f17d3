use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::debug;

use crate::error::{ChannelError, Result};

/// Open a native CBC character device read-write, non-blocking, without
/// acquiring it as controlling terminal.
pub fn open_native(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| ChannelError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(?path, "opened native channel");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_existing_device_non_blocking() {
        let file = open_native(Path::new("/dev/null")).unwrap();
        // SAFETY: fcntl(F_GETFL) only reads descriptor flags of an open fd.
        let flags = unsafe { libc::fcntl(std::os::fd::AsRawFd::as_raw_fd(&file), libc::F_GETFL) };
        assert!(flags & libc::O_NONBLOCK != 0);
    }

    #[test]
    fn missing_device_reports_path() {
        let err = open_native(Path::new("/dev/cbc-does-not-exist")).unwrap_err();
        match err {
            ChannelError::Open { path, source } => {
                assert_eq!(path, Path::new("/dev/cbc-does-not-exist"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
