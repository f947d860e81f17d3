//! Channel identities.
//!
//! The discriminant doubles as the channel's mux code in CBC service frames
//! and as its index in the [`ChannelTable`](crate::ChannelTable).

use std::fmt;

use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Power management.
    Pmt = 0,
    /// Lifecycle (heartbeat, wakeup reason). Critical.
    Lifecycle = 1,
    /// Vehicle signals.
    Signal = 2,
    /// Early signals, only present once the CBC driver attached.
    EarlySignal = 3,
    Diagnostic = 4,
    Dlt = 5,
    Linda = 6,
    Raw0 = 7,
    Raw1 = 8,
    Raw2 = 9,
    Raw3 = 10,
    Raw4 = 11,
    Raw5 = 12,
    Raw6 = 13,
    Raw7 = 14,
    Raw8 = 15,
    Raw9 = 16,
    Raw10 = 17,
    Raw11 = 18,
    /// Guest-visible serial endpoint backed by a pseudo-terminal. Critical.
    VirtualUart = 19,
}

impl ChannelId {
    /// Number of channel identities.
    pub const COUNT: usize = 20;

    /// Every channel identity, in table order.
    pub const ALL: [ChannelId; Self::COUNT] = [
        ChannelId::Pmt,
        ChannelId::Lifecycle,
        ChannelId::Signal,
        ChannelId::EarlySignal,
        ChannelId::Diagnostic,
        ChannelId::Dlt,
        ChannelId::Linda,
        ChannelId::Raw0,
        ChannelId::Raw1,
        ChannelId::Raw2,
        ChannelId::Raw3,
        ChannelId::Raw4,
        ChannelId::Raw5,
        ChannelId::Raw6,
        ChannelId::Raw7,
        ChannelId::Raw8,
        ChannelId::Raw9,
        ChannelId::Raw10,
        ChannelId::Raw11,
        ChannelId::VirtualUart,
    ];

    /// Position of this channel in the channel table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Mux code carried in the first byte of a service frame.
    pub fn mux(self) -> u8 {
        self as u8
    }

    /// Resolve a service-frame mux code.
    pub fn from_mux(mux: u8) -> Option<Self> {
        Self::ALL.get(mux as usize).copied()
    }

    /// Whether this channel is a native CBC character device.
    pub fn is_native(self) -> bool {
        self != ChannelId::VirtualUart
    }

    /// Whether a failure to open this channel aborts mediator startup.
    pub fn is_critical(self) -> bool {
        matches!(self, ChannelId::Lifecycle | ChannelId::VirtualUart)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Pmt => "pmt",
            ChannelId::Lifecycle => "lifecycle",
            ChannelId::Signal => "signal",
            ChannelId::EarlySignal => "early_signal",
            ChannelId::Diagnostic => "diagnostic",
            ChannelId::Dlt => "dlt",
            ChannelId::Linda => "linda",
            ChannelId::Raw0 => "raw0",
            ChannelId::Raw1 => "raw1",
            ChannelId::Raw2 => "raw2",
            ChannelId::Raw3 => "raw3",
            ChannelId::Raw4 => "raw4",
            ChannelId::Raw5 => "raw5",
            ChannelId::Raw6 => "raw6",
            ChannelId::Raw7 => "raw7",
            ChannelId::Raw8 => "raw8",
            ChannelId::Raw9 => "raw9",
            ChannelId::Raw10 => "raw10",
            ChannelId::Raw11 => "raw11",
            ChannelId::VirtualUart => "virtual_uart",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
