//! Static channel table configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::ChannelId;

/// Early signal device. Created by the CBC driver once it attached, so its
/// presence is what marks a platform as IOC-capable.
pub const EARLY_SIGNAL_PATH: &str = "/dev/cbc-early-signals";

/// Configuration of one channel table entry.
///
/// `path` is the native device node; it is ignored for the virtual UART,
/// whose path comes from the mediator startup parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ChannelSpec {
    pub fn native(id: ChannelId, path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            id,
            path: Some(path.into()),
            enabled,
        }
    }

    pub fn virtual_uart() -> Self {
        Self {
            id: ChannelId::VirtualUart,
            path: None,
            enabled: true,
        }
    }
}

/// The production channel table.
pub fn default_channels() -> Vec<ChannelSpec> {
    let mut specs = vec![
        ChannelSpec::native(ChannelId::Pmt, "/dev/cbc-pmt", false),
        ChannelSpec::native(ChannelId::Lifecycle, "/dev/cbc-lifecycle", true),
        ChannelSpec::native(ChannelId::Signal, "/dev/cbc-signals", true),
        ChannelSpec::native(ChannelId::EarlySignal, EARLY_SIGNAL_PATH, false),
        ChannelSpec::native(ChannelId::Diagnostic, "/dev/cbc-diagnosis", false),
        ChannelSpec::native(ChannelId::Dlt, "/dev/cbc-dlt", false),
        ChannelSpec::native(ChannelId::Linda, "/dev/cbc-linda", false),
    ];
    for (n, id) in ChannelId::ALL[ChannelId::Raw0.index()..=ChannelId::Raw11.index()]
        .iter()
        .enumerate()
    {
        specs.push(ChannelSpec::native(*id, format!("/dev/cbc-raw{n}"), true));
    }
    specs.push(ChannelSpec::virtual_uart());
    specs
}
