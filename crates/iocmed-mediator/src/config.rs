//! Mediator configuration: startup parameters, channel table, and the
//! per-direction signal routing tables.

use std::path::{Path, PathBuf};

use iocmed_channel::{default_channels, ChannelSpec, VirtualUart};
use serde::{Deserialize, Serialize};

use crate::error::{MediatorError, Result};

/// Requests in the pool unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 128;

/// Upper bound on `pool_size`; each request owns a full link frame buffer.
pub const MAX_POOL_SIZE: usize = 4096;

/// One CBC signal known to a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub id: u16,
    /// Encoded width in bits.
    #[serde(default)]
    pub width: u8,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

/// One CBC signal group known to a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: u16,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Signal and group tables plus whitelists for one direction.
///
/// An empty table or whitelist does not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub signals: Vec<SignalSpec>,
    pub groups: Vec<GroupSpec>,
    pub signal_whitelist: Vec<u16>,
    pub group_whitelist: Vec<u16>,
}

impl RoutingConfig {
    pub fn is_signal_allowed(&self, id: u16) -> bool {
        let active = self.signals.is_empty()
            || self.signals.iter().any(|s| s.id == id && s.active);
        let listed = self.signal_whitelist.is_empty() || self.signal_whitelist.contains(&id);
        active && listed
    }

    pub fn is_group_allowed(&self, id: u16) -> bool {
        let active =
            self.groups.is_empty() || self.groups.iter().any(|g| g.id == id && g.active);
        let listed = self.group_whitelist.is_empty() || self.group_whitelist.contains(&id);
        active && listed
    }
}

/// Everything the mediator needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatorConfig {
    /// Where the virtual UART's slave side is exposed.
    pub virtual_uart: PathBuf,
    /// Wakeup reason handed to the protocol handlers. Must be non-zero.
    #[serde(default)]
    pub boot_reason: u32,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelSpec>,
    /// Guest → native routing.
    #[serde(default)]
    pub rx: RoutingConfig,
    /// Native → guest routing.
    #[serde(default)]
    pub tx: RoutingConfig,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl MediatorConfig {
    pub fn new(virtual_uart: impl Into<PathBuf>, boot_reason: u32) -> Self {
        Self {
            virtual_uart: virtual_uart.into(),
            boot_reason,
            pool_size: DEFAULT_POOL_SIZE,
            channels: default_channels(),
            rx: RoutingConfig::default(),
            tx: RoutingConfig::default(),
        }
    }

    /// Parse the device-model option string `<virtual uart path>[,<boot reason>]`.
    ///
    /// The boot reason accepts decimal or `0x`-prefixed hex.
    pub fn from_opts(opts: &str) -> Result<Self> {
        let mut parts = opts.splitn(2, ',');
        let path = parts.next().unwrap_or_default().trim();
        if path.is_empty() {
            return Err(MediatorError::InvalidConfig(
                "missing virtual uart path".to_string(),
            ));
        }
        let boot_reason = match parts.next().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_u32(raw).ok_or_else(|| {
                MediatorError::InvalidConfig(format!("invalid boot reason: {raw}"))
            })?,
            _ => 0,
        };
        Ok(Self::new(path, boot_reason))
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| MediatorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Check parameters that do not depend on the host.
    pub fn validate(&self) -> Result<()> {
        if self.boot_reason == 0 {
            return Err(MediatorError::MissingBootReason);
        }
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(MediatorError::InvalidConfig(format!(
                "pool_size must be 1..={MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        let len = self.virtual_uart.as_os_str().len();
        if len == 0 || len >= VirtualUart::MAX_PATH_LEN {
            return Err(MediatorError::InvalidConfig(format!(
                "virtual uart path must be 1..{} bytes, got {len}",
                VirtualUart::MAX_PATH_LEN
            )));
        }
        Ok(())
    }
}

fn parse_u32(raw: &str) -> Option<u32> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
