//! IOC mediator runtime.
//!
//! Bridges the guest's virtual UART with the native CBC devices through a
//! fixed pool of reusable requests and three threads:
//! - the core thread polls every open channel and turns incoming bytes into requests
//! - the Rx worker runs the guest → native protocol handler
//! - the Tx worker runs the native → guest protocol handler
//!
//! Start with [`Mediator::start`] (default CBC handlers) or [`Mediator::init`]
//! (custom handlers and platform probe).

pub mod config;
pub mod error;
pub mod handler;
pub mod mediator;
mod multiplexer;
pub mod protocol;
pub mod queue;
pub mod request;
mod worker;

pub use config::{
    GroupSpec, MediatorConfig, RoutingConfig, SignalSpec, DEFAULT_POOL_SIZE,
    MAX_POOL_SIZE,
};
pub use error::{MediatorError, QueueError, Result};
pub use handler::{HandlerContext, ProtocolHandler, Route};
pub use mediator::{LifecycleState, Mediator, MediatorStats};
pub use protocol::{CbcRxHandler, CbcTxHandler};
pub use queue::{Direction, Placement, QueueCounts, QueueKind, RequestQueues};
pub use request::{Request, RequestId, RequestType, REQUEST_BUF_SIZE};
