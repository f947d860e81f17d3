use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};

use crate::pty::VirtualUart;

/// Ownership state of one channel's OS handle.
///
/// Closing replaces the handle with [`ChannelHandle::Closed`] and drops the
/// descriptor, so a second close is a no-op and a closed channel can never be
/// read from or written to.
#[derive(Debug, Default)]
pub enum ChannelHandle {
    #[default]
    Closed,
    /// An open native character device.
    Native(File),
    /// The pseudo-terminal master backing the virtual UART.
    Virtual(VirtualUart),
}

impl ChannelHandle {
    pub fn is_open(&self) -> bool {
        !matches!(self, ChannelHandle::Closed)
    }

    /// The file to read from and write to, if open.
    pub fn file(&self) -> Option<&File> {
        match self {
            ChannelHandle::Closed => None,
            ChannelHandle::Native(file) => Some(file),
            ChannelHandle::Virtual(uart) => Some(uart.master()),
        }
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file().map(AsRawFd::as_raw_fd)
    }

    /// Close the handle. Returns whether anything was open.
    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        *self = ChannelHandle::Closed;
        was_open
    }
}
