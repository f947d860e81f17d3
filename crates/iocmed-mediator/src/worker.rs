use std::sync::Arc;

use iocmed_channel::ChannelTable;
use tracing::{debug, error};

use crate::config::MediatorConfig;
use crate::handler::{HandlerContext, ProtocolHandler, Route};
use crate::queue::{Direction, Placement, QueueKind, RequestQueues};
use crate::request::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Stop,
}

/// Blocking consumer loop shared by the Rx and Tx threads.
pub(crate) struct Worker<H> {
    direction: Direction,
    queues: Arc<RequestQueues>,
    channels: Arc<ChannelTable>,
    config: Arc<MediatorConfig>,
    handler: H,
}

impl<H: ProtocolHandler> Worker<H> {
    pub(crate) fn new(
        direction: Direction,
        queues: Arc<RequestQueues>,
        channels: Arc<ChannelTable>,
        config: Arc<MediatorConfig>,
        handler: H,
    ) -> Self {
        Self {
            direction,
            queues,
            channels,
            config,
            handler,
        }
    }

    /// Wait for one request and run it through the handler.
    pub(crate) fn step(&mut self) -> Step {
        match self.queues.dequeue_blocking(self.direction) {
            Ok(Some(req)) => {
                self.dispatch(req);
                Step::Continue
            }
            Ok(None) => Step::Stop,
            Err(err) => {
                error!(direction = self.direction.name(), error = %err, "worker exiting");
                Step::Stop
            }
        }
    }

    fn dispatch(&mut self, mut req: Request) {
        let routing = match self.direction {
            Direction::Rx => &self.config.rx,
            Direction::Tx => &self.config.tx,
        };
        let ctx = HandlerContext {
            channels: &self.channels,
            routing,
            boot_reason: self.config.boot_reason,
            direction: self.direction,
        };

        match self.handler.process(&mut req, &ctx) {
            Route::Free => self.queues.enqueue(req, QueueKind::Free, Placement::Tail),
            Route::Forward => {
                let target = self.direction.opposite();
                debug!(id = req.id().0, to = target.name(), "request re-routed");
                self.queues.enqueue(req, target.into(), Placement::Head);
            }
        }
    }

    pub(crate) fn run(mut self) {
        debug!(direction = self.direction.name(), "worker started");
        while self.step() == Step::Continue {}
        debug!(direction = self.direction.name(), "worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::request::RequestId;

    fn worker<H: ProtocolHandler>(
        direction: Direction,
        queues: &Arc<RequestQueues>,
        handler: H,
    ) -> Worker<H> {
        Worker::new(
            direction,
            queues.clone(),
            Arc::new(ChannelTable::new(&[], "/tmp/unused")),
            Arc::new(MediatorConfig::new("/tmp/unused", 1)),
            handler,
        )
    }

    #[test]
    fn forwarded_request_lands_at_opposite_head() {
        let queues = Arc::new(RequestQueues::new(3));
        let waiting = queues.dequeue_free().unwrap();
        let waiting_id = waiting.id();
        queues.enqueue(waiting, QueueKind::Tx, Placement::Tail);

        let guest = queues.dequeue_free().unwrap();
        let guest_id = guest.id();
        queues.enqueue(guest, QueueKind::Rx, Placement::Tail);

        let mut rx = worker(Direction::Rx, &queues, |_: &mut Request, _: &HandlerContext<'_>| {
            Route::Forward
        });
        assert_eq!(rx.step(), Step::Continue);

        assert_eq!(queues.ids(QueueKind::Tx), vec![guest_id, waiting_id]);
        assert_eq!(queues.counts().rx, 0);
    }

    #[test]
    fn tx_forward_lands_at_rx_head() {
        let queues = Arc::new(RequestQueues::new(3));
        let waiting = queues.dequeue_free().unwrap();
        let waiting_id = waiting.id();
        queues.enqueue(waiting, QueueKind::Rx, Placement::Tail);

        let native = queues.dequeue_free().unwrap();
        let native_id = native.id();
        queues.enqueue(native, QueueKind::Tx, Placement::Tail);

        let mut tx = worker(Direction::Tx, &queues, |_: &mut Request, _: &HandlerContext<'_>| {
            Route::Forward
        });
        assert_eq!(tx.step(), Step::Continue);

        assert_eq!(queues.ids(QueueKind::Rx), vec![native_id, waiting_id]);
        assert_eq!(queues.counts().tx, 0);
        assert_eq!(queues.counts().free, 1);
    }

    #[test]
    fn finished_request_returns_to_free() {
        let queues = Arc::new(RequestQueues::new(1));
        let req = queues.dequeue_free().unwrap();
        queues.enqueue(req, QueueKind::Tx, Placement::Tail);

        let mut tx = worker(Direction::Tx, &queues, |req: &mut Request, ctx: &HandlerContext<'_>| {
            assert_eq!(ctx.direction, Direction::Tx);
            assert_eq!(ctx.boot_reason, 1);
            assert_eq!(req.id(), RequestId(0));
            Route::Free
        });
        assert_eq!(tx.step(), Step::Continue);
        assert_eq!(queues.counts().free, 1);
    }

    #[test]
    fn run_exits_on_shutdown() {
        let queues = Arc::new(RequestQueues::new(1));
        let rx = worker(Direction::Rx, &queues, |_: &mut Request, _: &HandlerContext<'_>| {
            Route::Free
        });
        let handle = thread::spawn(move || rx.run());

        queues.begin_shutdown();
        queues.wake(Direction::Rx);
        handle.join().unwrap();
    }
}
