//! Request pool and the Free/Rx/Tx queues.
//!
//! The pool is a fixed set of [`Request`]s created once. Queue membership is
//! ownership: a request lives by value in exactly one queue, or in the hands
//! of the one thread that dequeued it, until that thread enqueues it again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::error::QueueError;
use crate::request::{Request, RequestId};

/// The three queues partitioning the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Free,
    Rx,
    Tx,
}

/// A worker direction. Only these queues support blocking dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Guest → native.
    Rx,
    /// Native → guest.
    Tx,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Rx => Direction::Tx,
            Direction::Tx => Direction::Rx,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        }
    }
}

impl From<Direction> for QueueKind {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Rx => QueueKind::Rx,
            Direction::Tx => QueueKind::Tx,
        }
    }
}

/// Where an enqueued request lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Normal arrival.
    Tail,
    /// Cross-direction re-route; overtakes everything already queued.
    Head,
}

/// Queue lengths at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounts {
    pub free: usize,
    pub rx: usize,
    pub tx: usize,
}

impl QueueCounts {
    pub fn queued(&self) -> usize {
        self.free + self.rx + self.tx
    }
}

#[derive(Debug, Default)]
struct WorkQueue {
    items: Mutex<VecDeque<Request>>,
    ready: Condvar,
}

/// The request pool and its three queues.
#[derive(Debug)]
pub struct RequestQueues {
    capacity: usize,
    free: Mutex<VecDeque<Request>>,
    rx: WorkQueue,
    tx: WorkQueue,
    closing: AtomicBool,
}

// Queue contents are only touched through push/pop, which never leave a
// VecDeque half-updated, so a poisoned lock still guards consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RequestQueues {
    /// Allocate `capacity` requests and seed the Free queue with all of them.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|i| Request::new(RequestId(i))).collect();
        Self {
            capacity,
            free: Mutex::new(free),
            rx: WorkQueue::default(),
            tx: WorkQueue::default(),
            closing: AtomicBool::new(false),
        }
    }

    /// Number of requests in the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn work(&self, dir: Direction) -> &WorkQueue {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    /// Hand a request to a queue and wake that queue's worker.
    ///
    /// Requests returned to Free have their metadata cleared.
    pub fn enqueue(&self, mut req: Request, kind: QueueKind, placement: Placement) {
        trace!(id = req.id().0, ?kind, ?placement, "enqueue");
        let dir = match kind {
            QueueKind::Free => {
                req.reset();
                let mut free = lock(&self.free);
                match placement {
                    Placement::Tail => free.push_back(req),
                    Placement::Head => free.push_front(req),
                }
                return;
            }
            QueueKind::Rx => Direction::Rx,
            QueueKind::Tx => Direction::Tx,
        };

        let queue = self.work(dir);
        let mut items = lock(&queue.items);
        match placement {
            Placement::Tail => items.push_back(req),
            Placement::Head => items.push_front(req),
        }
        queue.ready.notify_one();
    }

    /// Take a free request without blocking.
    pub fn dequeue_free(&self) -> Option<Request> {
        lock(&self.free).pop_front()
    }

    /// Take the head of a worker queue without blocking.
    pub fn try_dequeue(&self, dir: Direction) -> Option<Request> {
        lock(&self.work(dir).items).pop_front()
    }

    /// Block until the queue has a request or shutdown begins.
    ///
    /// Returns `Ok(None)` once shutdown has begun, even if requests remain
    /// queued, so a woken worker never processes stale data.
    pub fn dequeue_blocking(&self, dir: Direction) -> Result<Option<Request>, QueueError> {
        let queue = self.work(dir);
        let mut items = lock(&queue.items);
        loop {
            if self.is_closing() {
                return Ok(None);
            }
            if let Some(req) = items.pop_front() {
                return Ok(Some(req));
            }
            items = queue
                .ready
                .wait(items)
                .map_err(|_| QueueError::Poisoned(dir.into()))?;
        }
    }

    /// Set the shutdown flag. Monotonic.
    pub fn begin_shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Wake every waiter of a worker queue, under its lock.
    pub fn wake(&self, dir: Direction) {
        let queue = self.work(dir);
        let _items = lock(&queue.items);
        queue.ready.notify_all();
    }

    /// Consistent snapshot of all three queue lengths.
    ///
    /// Locks are taken in Free → Rx → Tx order; every other operation holds
    /// at most one queue lock, so this cannot deadlock.
    pub fn counts(&self) -> QueueCounts {
        let free = lock(&self.free);
        let rx = lock(&self.rx.items);
        let tx = lock(&self.tx.items);
        QueueCounts {
            free: free.len(),
            rx: rx.len(),
            tx: tx.len(),
        }
    }

    /// Identities currently in a queue, head first.
    pub fn ids(&self, kind: QueueKind) -> Vec<RequestId> {
        let collect = |q: &VecDeque<Request>| q.iter().map(Request::id).collect();
        match kind {
            QueueKind::Free => collect(&lock(&self.free)),
            QueueKind::Rx => collect(&lock(&self.rx.items)),
            QueueKind::Tx => collect(&lock(&self.tx.items)),
        }
    }
}
