//! CBC link framing for the IOC mediator.
//!
//! Bytes from the virtual UART arrive one at a time and accumulate in a
//! [`RingBuffer`] until the [`LinkDecoder`] recognises a complete link frame:
//! - a 1-byte start-of-frame marker (0xA5)
//! - a 2-byte little-endian service frame length
//! - the service frame itself (mux, command, payload)
//!
//! Native devices deliver bare service frames; the Tx direction wraps them in
//! a link header before they reach the guest.

pub mod error;
pub mod link;
pub mod ring;
pub mod service;

pub use error::{FrameError, Result};
pub use link::{
    encode_link, write_link_header, LinkBoundary, LinkDecoder, LINK_HEADER_SIZE, LINK_SOF,
    MAX_LINK_SIZE, MAX_SERVICE_SIZE, SRV_POS,
};
pub use ring::{RingBuffer, RING_BUFFER_SIZE};
pub use service::{ServiceCommand, ServiceHeader, SERVICE_HEADER_SIZE};
