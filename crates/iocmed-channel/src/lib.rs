//! Channel layer of the IOC mediator.
//!
//! A channel is one OS-level byte endpoint the mediator polls:
//! - the native CBC character devices (`/dev/cbc-*`), opened non-blocking
//! - the virtual UART, a pseudo-terminal whose slave side is exposed to the guest
//!
//! This is the lowest layer of iocmed and the only one that touches the
//! filesystem namespace. Everything else addresses channels through
//! [`ChannelId`] and the [`ChannelTable`].

pub mod config;
pub mod error;
pub mod handle;
pub mod id;
pub mod native;
pub mod probe;
pub mod pty;
pub mod table;

pub use config::{default_channels, ChannelSpec, EARLY_SIGNAL_PATH};
pub use error::{ChannelError, Result};
pub use handle::ChannelHandle;
pub use id::ChannelId;
pub use probe::{DevicePathProbe, PlatformProbe};
pub use pty::VirtualUart;
pub use table::ChannelTable;
