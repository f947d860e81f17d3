use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ChannelSpec;
use crate::error::{ChannelError, Result};
use crate::handle::ChannelHandle;
use crate::id::ChannelId;
use crate::native::open_native;
use crate::pty::VirtualUart;

#[derive(Debug)]
struct Entry {
    path: Option<PathBuf>,
    enabled: bool,
    handle: ChannelHandle,
}

/// Registry of every channel the mediator knows about.
///
/// Built once from configuration, opened during startup, then read-only
/// until shutdown closes it. Reads and writes go through `&File`, so the
/// table can be shared between the core thread and the workers without a
/// lock.
#[derive(Debug)]
pub struct ChannelTable {
    entries: Vec<Entry>,
    virtual_uart_path: PathBuf,
}

impl ChannelTable {
    /// Build a table from channel specs. Channels without a spec are disabled.
    pub fn new(specs: &[ChannelSpec], virtual_uart_path: impl Into<PathBuf>) -> Self {
        let mut entries: Vec<Entry> = ChannelId::ALL
            .iter()
            .map(|_| Entry {
                path: None,
                enabled: false,
                handle: ChannelHandle::Closed,
            })
            .collect();
        for spec in specs {
            let entry = &mut entries[spec.id.index()];
            entry.path = spec.path.clone();
            entry.enabled = spec.enabled;
        }
        Self {
            entries,
            virtual_uart_path: virtual_uart_path.into(),
        }
    }

    /// Open every enabled channel.
    ///
    /// A failure on a critical channel closes whatever was already opened and
    /// returns [`ChannelError::CriticalUnavailable`]. Other failures are logged
    /// and leave the channel closed. Returns the number of open channels.
    pub fn open_channels(&mut self) -> Result<usize> {
        let mut opened = 0usize;
        for id in ChannelId::ALL {
            let entry = &self.entries[id.index()];
            if !entry.enabled || entry.handle.is_open() {
                continue;
            }

            let result = if id.is_native() {
                match &entry.path {
                    Some(path) => open_native(path).map(ChannelHandle::Native),
                    None => Err(ChannelError::NotOpen(id)),
                }
            } else {
                VirtualUart::open(&self.virtual_uart_path).map(ChannelHandle::Virtual)
            };

            match result {
                Ok(handle) => {
                    self.entries[id.index()].handle = handle;
                    opened += 1;
                }
                Err(err) if id.is_critical() => {
                    self.close_channels();
                    return Err(ChannelError::CriticalUnavailable {
                        id,
                        source: Box::new(err),
                    });
                }
                Err(err) => warn!(channel = %id, error = %err, "channel unavailable"),
            }
        }
        info!(opened, "channels opened");
        Ok(self.open_count())
    }

    /// Close every open handle. Safe to call repeatedly and on channels that
    /// never opened. Returns how many handles were closed.
    pub fn close_channels(&mut self) -> usize {
        let mut closed = 0usize;
        for (entry, id) in self.entries.iter_mut().zip(ChannelId::ALL) {
            if entry.handle.close() {
                debug!(channel = %id, "closed channel");
                closed += 1;
            }
        }
        closed
    }

    /// Adopt an already-open handle for a channel and mark it enabled.
    pub fn attach(&mut self, id: ChannelId, file: File) {
        let entry = &mut self.entries[id.index()];
        entry.enabled = true;
        entry.handle = ChannelHandle::Native(file);
    }

    pub fn is_enabled(&self, id: ChannelId) -> bool {
        self.entries[id.index()].enabled
    }

    pub fn is_open(&self, id: ChannelId) -> bool {
        self.entries[id.index()].handle.is_open()
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.handle.is_open()).count()
    }

    /// Configured device path of a native channel.
    pub fn path(&self, id: ChannelId) -> Option<&Path> {
        if id.is_native() {
            self.entries[id.index()].path.as_deref()
        } else {
            Some(&self.virtual_uart_path)
        }
    }

    pub fn virtual_uart_path(&self) -> &Path {
        &self.virtual_uart_path
    }

    /// Raw descriptors of every open channel, for readiness registration.
    pub fn open_handles(&self) -> impl Iterator<Item = (ChannelId, RawFd)> + '_ {
        self.entries
            .iter()
            .zip(ChannelId::ALL)
            .filter_map(|(entry, id)| entry.handle.raw_fd().map(|fd| (id, fd)))
    }

    fn file(&self, id: ChannelId) -> Result<&File> {
        self.entries[id.index()]
            .handle
            .file()
            .ok_or(ChannelError::NotOpen(id))
    }

    /// Single non-blocking read from a channel.
    pub fn recv(&self, id: ChannelId, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file(id)?;
        Ok(file.read(buf)?)
    }

    /// Write the whole buffer to a channel, retrying partial writes.
    ///
    /// Stops at the first error; bytes already written stay written.
    pub fn xmit(&self, id: ChannelId, buf: &[u8]) -> Result<usize> {
        let mut file = self.file(id)?;
        let mut offset = 0usize;
        while offset < buf.len() {
            match file.write(&buf[offset..]) {
                Ok(0) => return Err(ChannelError::Closed(id)),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(channel = %id, written = offset, error = %err, "channel write failed");
                    return Err(ChannelError::Io(err));
                }
            }
        }
        Ok(offset)
    }
}
