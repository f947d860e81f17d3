//! IOC mediator for virtualized in-vehicle guests.
//!
//! Bridges a guest-facing virtual UART (a pseudo-terminal exposed at a
//! configured path) with the host's native CBC character devices.
//!
//! # Crate Structure
//!
//! - [`channel`] - Channel table, native devices and the virtual UART
//! - [`frame`] - CBC link and service framing
//! - [`mediator`] - Request pool, core thread and Rx/Tx workers (behind `mediator` feature)

/// Re-export channel types.
pub mod channel {
    pub use iocmed_channel::*;
}

/// Re-export frame types.
pub mod frame {
    pub use iocmed_frame::*;
}

/// Re-export mediator types (requires `mediator` feature).
#[cfg(feature = "mediator")]
pub mod mediator {
    pub use iocmed_mediator::*;
}
