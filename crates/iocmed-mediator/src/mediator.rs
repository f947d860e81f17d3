use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use iocmed_channel::{ChannelId, ChannelTable, DevicePathProbe, PlatformProbe};
use mio::Waker;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MediatorConfig;
use crate::error::{MediatorError, Result};
use crate::handler::ProtocolHandler;
use crate::multiplexer::{DropCounters, Multiplexer};
use crate::protocol::{CbcRxHandler, CbcTxHandler};
use crate::queue::{Direction, QueueCounts, RequestQueues};
use crate::worker::Worker;

/// Where a mediator is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

/// Data dropped by the core thread: frames that found the pool exhausted,
/// plus virtual UART bytes skipped while resyncing the link decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediatorStats {
    pub frames_dropped: u64,
    pub bytes_dropped: u64,
}

/// A running mediator: the channel table, the request pool, and the core,
/// Rx and Tx threads.
///
/// Dropping a mediator shuts it down.
pub struct Mediator {
    state: LifecycleState,
    config: Arc<MediatorConfig>,
    channels: Arc<ChannelTable>,
    queues: Arc<RequestQueues>,
    drops: Arc<DropCounters>,
    waker: Waker,
    core: Option<JoinHandle<()>>,
    rx: Option<JoinHandle<()>>,
    tx: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("state", &self.state)
            .field("virtual_uart", &self.config.virtual_uart)
            .field("open_channels", &self.channels.open_count())
            .field("queues", &self.queues.counts())
            .finish()
    }
}

impl Mediator {
    /// Start with the default CBC handlers and the device-node platform probe.
    pub fn start(config: MediatorConfig) -> Result<Self> {
        Self::init(
            config,
            &DevicePathProbe::default(),
            CbcRxHandler::new(),
            CbcTxHandler::new(),
        )
    }

    /// Bring the mediator up.
    ///
    /// Order: platform probe, parameter check, request pool, channels,
    /// multiplexer, then the Rx, Tx and core threads. A failure unwinds
    /// whatever was already set up; nothing stays open and no thread keeps
    /// running.
    pub fn init(
        config: MediatorConfig,
        probe: &dyn PlatformProbe,
        rx_handler: impl ProtocolHandler,
        tx_handler: impl ProtocolHandler,
    ) -> Result<Self> {
        if !probe.is_supported() {
            warn!("platform probe failed, mediator not started");
            return Err(MediatorError::PlatformUnsupported);
        }
        config.validate()?;
        debug!(pool_size = config.pool_size, "initializing mediator");

        let queues = Arc::new(RequestQueues::new(config.pool_size));

        let mut table = ChannelTable::new(&config.channels, &config.virtual_uart);
        table.open_channels()?;
        let channels = Arc::new(table);

        let drops = Arc::new(DropCounters::default());
        let (multiplexer, waker) =
            Multiplexer::new(channels.clone(), queues.clone(), drops.clone())
                .map_err(MediatorError::Multiplexer)?;

        let config = Arc::new(config);
        let mut mediator = Self {
            state: LifecycleState::Initializing,
            config,
            channels,
            queues,
            drops,
            waker,
            core: None,
            rx: None,
            tx: None,
        };

        // On error `mediator` drops here, which joins what was started.
        mediator.rx = Some(mediator.spawn_worker(Direction::Rx, rx_handler)?);
        mediator.tx = Some(mediator.spawn_worker(Direction::Tx, tx_handler)?);
        mediator.core = Some(
            thread::Builder::new()
                .name("iocmed-core".to_string())
                .spawn(move || multiplexer.run())
                .map_err(|source| MediatorError::Spawn {
                    role: "core",
                    source,
                })?,
        );

        mediator.state = LifecycleState::Running;
        info!(
            virtual_uart = %mediator.config.virtual_uart.display(),
            channels = mediator.channels.open_count(),
            pool_size = mediator.queues.capacity(),
            "mediator running"
        );
        Ok(mediator)
    }

    fn spawn_worker(
        &self,
        direction: Direction,
        handler: impl ProtocolHandler,
    ) -> Result<JoinHandle<()>> {
        let worker = Worker::new(
            direction,
            self.queues.clone(),
            self.channels.clone(),
            self.config.clone(),
            handler,
        );
        thread::Builder::new()
            .name(format!("iocmed-{}", direction.name()))
            .spawn(move || worker.run())
            .map_err(|source| MediatorError::Spawn {
                role: direction.name(),
                source,
            })
    }

    /// Stop every thread and close every channel.
    pub fn deinit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.state == LifecycleState::Terminated {
            return;
        }
        self.state = LifecycleState::ShuttingDown;
        debug!("shutting down mediator");

        // The core thread is the only producer, so it stops before the workers.
        self.queues.begin_shutdown();
        if let Some(core) = self.core.take() {
            if let Err(err) = self.waker.wake() {
                error!(error = %err, "failed to wake core thread");
            }
            join("core", core);
        }
        if let Some(rx) = self.rx.take() {
            self.queues.wake(Direction::Rx);
            join("rx", rx);
        }
        if let Some(tx) = self.tx.take() {
            self.queues.wake(Direction::Tx);
            join("tx", tx);
        }

        match Arc::get_mut(&mut self.channels) {
            Some(table) => {
                let closed = table.close_channels();
                debug!(closed, "channels closed");
            }
            None => warn!("channel table still shared, handles close on drop"),
        }
        self.state = LifecycleState::Terminated;
        info!("mediator stopped");
    }

    /// Write raw bytes to a channel.
    pub fn xmit(&self, id: ChannelId, buf: &[u8]) -> Result<usize> {
        Ok(self.channels.xmit(id, buf)?)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    pub fn virtual_uart_path(&self) -> &Path {
        &self.config.virtual_uart
    }

    pub fn queue_counts(&self) -> QueueCounts {
        self.queues.counts()
    }

    /// `false` once the core thread has exited, for example after a fatal
    /// poll error. The workers keep running but no new data arrives.
    pub fn is_core_running(&self) -> bool {
        self.core.as_ref().is_some_and(|core| !core.is_finished())
    }

    pub fn stats(&self) -> MediatorStats {
        MediatorStats {
            frames_dropped: self.drops.frames(),
            bytes_dropped: self.drops.bytes(),
        }
    }
}

impl Drop for Mediator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join(role: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(role, "mediator thread panicked");
    }
}
