use std::path::PathBuf;

use crate::config::EARLY_SIGNAL_PATH;

/// One-shot check for whether this host can run the mediator.
pub trait PlatformProbe {
    fn is_supported(&self) -> bool;
}

impl<F> PlatformProbe for F
where
    F: Fn() -> bool,
{
    fn is_supported(&self) -> bool {
        self()
    }
}

/// Probe that requires a device node to exist.
///
/// The CBC driver creates the early signal node when it attaches, so by
/// default its presence marks the platform as supported.
#[derive(Debug, Clone)]
pub struct DevicePathProbe {
    path: PathBuf,
}

impl DevicePathProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for DevicePathProbe {
    fn default() -> Self {
        Self::new(EARLY_SIGNAL_PATH)
    }
}

impl PlatformProbe for DevicePathProbe {
    fn is_supported(&self) -> bool {
        std::fs::metadata(&self.path).is_ok()
    }
}
