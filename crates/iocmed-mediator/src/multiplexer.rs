//! Core thread: readiness multiplexing over every open channel.

use std::io::{self, ErrorKind};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use iocmed_channel::{ChannelError, ChannelId, ChannelTable};
use iocmed_frame::{LinkBoundary, LinkDecoder, MAX_SERVICE_SIZE};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, trace, warn};

use crate::queue::{Placement, QueueKind, RequestQueues};
use crate::request::{Request, RequestType};

/// Reserved for the shutdown waker; channel tokens are table indices.
const WAKE_TOKEN: Token = Token(usize::MAX);

/// Virtual UART bytes read per syscall.
const VUART_CHUNK: usize = 256;

/// Data the core thread had to throw away.
#[derive(Debug, Default)]
pub(crate) struct DropCounters {
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl DropCounters {
    fn record(&self, bytes: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.record_bytes(bytes as u64);
    }

    /// Bytes lost outside any frame (link resync, ring overflow).
    fn record_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

enum ReadOutcome {
    Data(usize),
    Drained,
    Retry,
    Failed(ChannelError),
}

fn classify(result: iocmed_channel::Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Drained,
        Ok(n) => ReadOutcome::Data(n),
        Err(ChannelError::Io(err)) if err.kind() == ErrorKind::WouldBlock => ReadOutcome::Drained,
        Err(ChannelError::Io(err)) if err.kind() == ErrorKind::Interrupted => ReadOutcome::Retry,
        Err(err) => ReadOutcome::Failed(err),
    }
}

/// Owns the poll instance and turns readable channels into requests.
///
/// Registration is edge-triggered, so every event drains its handle until
/// it would block.
pub(crate) struct Multiplexer {
    poll: Poll,
    channels: Arc<ChannelTable>,
    queues: Arc<RequestQueues>,
    decoder: LinkDecoder,
    drops: Arc<DropCounters>,
}

impl Multiplexer {
    /// Create the poll instance and its shutdown waker, then register every
    /// open channel for readability.
    ///
    /// A registration failure is fatal for critical channels; other channels
    /// are skipped with a warning.
    pub(crate) fn new(
        channels: Arc<ChannelTable>,
        queues: Arc<RequestQueues>,
        drops: Arc<DropCounters>,
    ) -> io::Result<(Self, Waker)> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;

        let handles: Vec<(ChannelId, RawFd)> = channels.open_handles().collect();
        for (id, fd) in handles {
            let registered =
                poll.registry()
                    .register(&mut SourceFd(&fd), Token(id.index()), Interest::READABLE);
            match registered {
                Ok(()) => trace!(channel = %id, fd, "registered"),
                Err(err) if id.is_critical() => return Err(err),
                Err(err) => warn!(channel = %id, error = %err, "channel not pollable, ignored"),
            }
        }

        Ok((
            Self {
                poll,
                channels,
                queues,
                decoder: LinkDecoder::new(),
                drops,
            },
            waker,
        ))
    }

    /// Dispatch readiness events until shutdown begins or polling fails.
    pub(crate) fn run(mut self) {
        debug!("core thread started");
        let mut events = Events::with_capacity(ChannelId::COUNT + 1);
        while !self.queues.is_closing() {
            if let Err(err) = self.poll.poll(&mut events, None) {
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %err, "poll failed, core thread exiting");
                return;
            }

            for event in events.iter() {
                if event.token() == WAKE_TOKEN {
                    continue;
                }
                match ChannelId::ALL.get(event.token().0).copied() {
                    Some(ChannelId::VirtualUart) => self.handle_virtual_uart(),
                    Some(id) => self.handle_native(id),
                    None => warn!(token = event.token().0, "event for unknown token"),
                }
            }
        }
        info!("core thread stopped");
    }

    /// Feed every available virtual UART byte to the link decoder.
    pub(crate) fn handle_virtual_uart(&mut self) {
        let mut chunk = [0u8; VUART_CHUNK];
        loop {
            match classify(self.channels.recv(ChannelId::VirtualUart, &mut chunk)) {
                ReadOutcome::Data(n) => {
                    for &byte in &chunk[..n] {
                        if let Some(boundary) = self.decoder.feed_byte(byte) {
                            self.dispatch_link(boundary);
                        }
                    }
                    let lost = self.decoder.take_discarded();
                    if lost > 0 {
                        debug!(bytes = lost, "virtual uart bytes skipped while resyncing");
                        self.drops.record_bytes(lost);
                    }
                }
                ReadOutcome::Drained => return,
                ReadOutcome::Retry => continue,
                ReadOutcome::Failed(err) => {
                    warn!(error = %err, "virtual uart read failed");
                    return;
                }
            }
        }
    }

    fn dispatch_link(&mut self, boundary: LinkBoundary) {
        let Some(mut req) = self.queues.dequeue_free() else {
            warn!(link_len = boundary.link_len, "request pool exhausted, link frame dropped");
            self.decoder.discard(boundary);
            self.drops.record(boundary.link_len);
            return;
        };

        if let Err(err) = self.decoder.take_frame(boundary, req.buf_mut()) {
            warn!(error = %err, "link frame does not fit a request");
            self.decoder.discard(boundary);
            self.drops.record(boundary.link_len);
            self.queues.enqueue(req, QueueKind::Free, Placement::Tail);
            return;
        }
        req.link_len = boundary.link_len;
        req.srv_len = boundary.srv_len;
        req.channel = ChannelId::VirtualUart;
        req.rtype = RequestType::Protocol;
        trace!(id = req.id().0, link_len = req.link_len, "guest frame queued");
        self.queues.enqueue(req, QueueKind::Rx, Placement::Tail);
    }

    /// Read a native channel until it would block, one request per read.
    pub(crate) fn handle_native(&mut self, id: ChannelId) {
        loop {
            let Some(mut req) = self.queues.dequeue_free() else {
                self.drop_pending(id);
                return;
            };
            match classify(self.channels.recv(id, req.service_region_mut())) {
                ReadOutcome::Data(n) => {
                    Self::tag_native(&mut req, id, n);
                    trace!(id = req.id().0, channel = %id, srv_len = n, "native data queued");
                    self.queues.enqueue(req, QueueKind::Tx, Placement::Tail);
                }
                ReadOutcome::Retry => {
                    self.queues.enqueue(req, QueueKind::Free, Placement::Tail);
                }
                ReadOutcome::Drained => {
                    self.queues.enqueue(req, QueueKind::Free, Placement::Tail);
                    return;
                }
                ReadOutcome::Failed(err) => {
                    warn!(channel = %id, error = %err, "native read failed");
                    self.queues.enqueue(req, QueueKind::Free, Placement::Tail);
                    return;
                }
            }
        }
    }

    fn tag_native(req: &mut Request, id: ChannelId, n: usize) {
        req.srv_len = n;
        req.link_len = 0;
        req.channel = id;
        req.rtype = RequestType::Protocol;
    }

    /// Pool exhausted: consume what the channel has so the next edge fires.
    fn drop_pending(&mut self, id: ChannelId) {
        let mut scratch = [0u8; MAX_SERVICE_SIZE];
        let mut frames = 0usize;
        loop {
            match classify(self.channels.recv(id, &mut scratch)) {
                ReadOutcome::Data(n) => {
                    self.drops.record(n);
                    frames += 1;
                }
                ReadOutcome::Retry => continue,
                ReadOutcome::Drained | ReadOutcome::Failed(_) => break,
            }
        }
        if frames > 0 {
            warn!(channel = %id, frames, "request pool exhausted, native data dropped");
        }
    }
}
