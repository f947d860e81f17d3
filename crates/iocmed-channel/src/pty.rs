use std::ffi::CStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ChannelError, Result};

/// Pseudo-terminal pair backing the guest-visible virtual UART.
///
/// The mediator keeps the master; the slave is exposed at a configured path
/// as a symlink for the device model's UART backend to open.
#[derive(Debug)]
pub struct VirtualUart {
    master: File,
    /// Held so the master never sees a hang-up while no guest has the slave open.
    _keepalive: File,
    link: PathBuf,
    slave: PathBuf,
}

impl VirtualUart {
    /// Maximum length of the guest-visible path.
    pub const MAX_PATH_LEN: usize = 128;
    /// Permission mode applied to the slave device.
    pub const SLAVE_MODE: u32 = 0o660;

    /// Allocate a pty pair and expose its slave at `link`, replacing any
    /// stale entry at that path.
    pub fn open(link: impl AsRef<Path>) -> Result<Self> {
        let link = link.as_ref().to_path_buf();
        let len = link.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(ChannelError::PathTooLong {
                path: link,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let fail = |stage: &'static str| {
            let link = link.clone();
            move |source: io::Error| ChannelError::VirtualUart {
                path: link,
                stage,
                source,
            }
        };

        let master = open_tty("/dev/ptmx").map_err(fail("open ptmx"))?;
        let slave = unlock_slave(&master).map_err(fail("unlock slave"))?;

        match std::fs::remove_file(&link) {
            Ok(()) => debug!(path = ?link, "removed stale virtual uart link"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(fail("remove stale link")(err)),
        }
        std::os::unix::fs::symlink(&slave, &link).map_err(fail("symlink"))?;

        let configured = std::fs::set_permissions(
            &link,
            std::fs::Permissions::from_mode(Self::SLAVE_MODE),
        )
        .map_err(fail("chmod"))
        .and_then(|()| make_raw(&master).map_err(fail("termios")))
        .and_then(|()| open_tty(&slave).map_err(fail("open slave")));

        let keepalive = match configured {
            Ok(keepalive) => keepalive,
            Err(err) => {
                let _ = std::fs::remove_file(&link);
                return Err(err);
            }
        };

        info!(path = ?link, slave = ?slave, "virtual uart ready");
        Ok(Self {
            master,
            _keepalive: keepalive,
            link,
            slave,
        })
    }

    /// The pty master the mediator reads from and writes to.
    pub fn master(&self) -> &File {
        &self.master
    }

    /// The guest-visible path.
    pub fn path(&self) -> &Path {
        &self.link
    }

    /// The `/dev/pts/N` node the path points at.
    pub fn slave_path(&self) -> &Path {
        &self.slave
    }
}

impl Drop for VirtualUart {
    fn drop(&mut self) {
        match std::fs::read_link(&self.link) {
            Ok(target) if target == self.slave => {
                debug!(path = ?self.link, "removing virtual uart link");
                let _ = std::fs::remove_file(&self.link);
            }
            _ => debug!(path = ?self.link, "virtual uart link replaced; skipping cleanup"),
        }
    }
}

fn open_tty(path: impl AsRef<Path>) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
}

fn cvt(rc: libc::c_int) -> io::Result<()> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn unlock_slave(master: &File) -> io::Result<PathBuf> {
    let fd = master.as_raw_fd();
    // SAFETY: `fd` is an open pty master owned by `master`.
    cvt(unsafe { libc::grantpt(fd) })?;
    // SAFETY: as above.
    cvt(unsafe { libc::unlockpt(fd) })?;

    let mut buf = [0 as libc::c_char; 128];
    // SAFETY: `buf` is writable for `buf.len()` bytes; ptsname_r NUL-terminates on success.
    let rc = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    // SAFETY: ptsname_r succeeded, so `buf` holds a NUL-terminated string.
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

fn make_raw(master: &File) -> io::Result<()> {
    let fd = master.as_raw_fd();
    // SAFETY: termios is plain old data; tcgetattr fully initialises it on success.
    let mut attr: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `fd` is an open terminal and `attr` is a valid termios.
    cvt(unsafe { libc::tcgetattr(fd, &mut attr) })?;
    // SAFETY: `attr` is a valid termios obtained from tcgetattr.
    unsafe { libc::cfmakeraw(&mut attr) };
    attr.c_cflag |= libc::CLOCAL;
    // SAFETY: `fd` is an open terminal and `attr` is a valid termios.
    cvt(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &attr) })
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn temp_link(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("iocmed-pty-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let link = dir.join("vuart");
        (dir, link)
    }

    #[test]
    fn exposes_slave_and_passes_raw_bytes() {
        let (dir, link) = temp_link("raw");
        let uart = VirtualUart::open(&link).unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), uart.slave_path());

        let mut guest = open_tty(&link).unwrap();
        guest.write_all(&[0xA5, 0x0D, 0x0A, 0x03]).unwrap();

        let mut master = uart.master();
        let mut buf = [0u8; 4];
        let mut got = 0;
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while got < buf.len() && std::time::Instant::now() < deadline {
            match master.read(&mut buf[got..]) {
                Ok(n) => got += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                Err(err) => panic!("read failed: {err}"),
            }
        }
        // Raw mode: no CR/LF translation, no echo processing.
        assert_eq!(buf, [0xA5, 0x0D, 0x0A, 0x03]);

        drop(uart);
        assert!(std::fs::symlink_metadata(&link).is_err(), "link should be removed");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replaces_stale_path() {
        let (dir, link) = temp_link("stale");
        std::fs::write(&link, b"stale").unwrap();

        let uart = VirtualUart::open(&link).unwrap();
        assert!(std::fs::symlink_metadata(&link)
            .unwrap()
            .file_type()
            .is_symlink());

        drop(uart);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_keeps_replaced_link() {
        let (dir, link) = temp_link("replaced");
        let uart = VirtualUart::open(&link).unwrap();

        std::fs::remove_file(&link).unwrap();
        std::fs::write(&link, b"someone else").unwrap();

        drop(uart);
        assert!(link.exists(), "drop must not remove a path it no longer owns");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_long_path() {
        let long = PathBuf::from(format!("/tmp/{}", "v".repeat(200)));
        let err = VirtualUart::open(&long).unwrap_err();
        assert!(matches!(err, ChannelError::PathTooLong { .. }));
    }
}
