use iocmed_channel::ChannelTable;

use crate::config::RoutingConfig;
use crate::queue::Direction;
use crate::request::Request;

/// What a worker does with a request after its handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Done; return the request to the Free queue.
    Free,
    /// Re-route to the head of the opposite direction's queue.
    Forward,
}

/// Read-only state a handler may consult.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub channels: &'a ChannelTable,
    /// Routing tables for the direction being handled.
    pub routing: &'a RoutingConfig,
    pub boot_reason: u32,
    pub direction: Direction,
}

/// Protocol processing for one direction.
///
/// Runs on the direction's worker thread. The handler may transmit, rewrite
/// the request in place, or do nothing; the returned [`Route`] decides where
/// the request goes next.
pub trait ProtocolHandler: Send + 'static {
    fn process(&mut self, req: &mut Request, ctx: &HandlerContext<'_>) -> Route;
}

impl<F> ProtocolHandler for F
where
    F: FnMut(&mut Request, &HandlerContext<'_>) -> Route + Send + 'static,
{
    fn process(&mut self, req: &mut Request, ctx: &HandlerContext<'_>) -> Route {
        self(req, ctx)
    }
}
