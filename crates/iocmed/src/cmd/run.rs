use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use iocmed_mediator::{CbcRxHandler, CbcTxHandler, Mediator};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cmd::{load_config, RunArgs};
use crate::exit::{mediator_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

const LIVENESS_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Serialize)]
struct RunSummary {
    virtual_uart: PathBuf,
    frames_dropped: u64,
    bytes_dropped: u64,
    core_exited_early: bool,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = load_config(args.config.as_deref())?;
    config.virtual_uart = args.path;
    if let Some(boot_reason) = args.boot_reason {
        config.boot_reason = boot_reason;
    }
    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let virtual_uart = config.virtual_uart.clone();
    let started = if args.skip_platform_check {
        warn!("platform check skipped");
        Mediator::init(config, &|| true, CbcRxHandler::new(), CbcTxHandler::new())
    } else {
        Mediator::start(config)
    };
    let mediator = started.map_err(|err| mediator_error("mediator start failed", err))?;

    let mut core_exited_early = false;
    while running.load(Ordering::SeqCst) {
        if !mediator.is_core_running() {
            error!("core thread exited, stopping");
            core_exited_early = true;
            break;
        }
        thread::sleep(LIVENESS_INTERVAL);
    }
    if !core_exited_early {
        info!("interrupted, shutting down");
    }

    let stats = mediator.stats();
    mediator.deinit();
    print_summary(
        &RunSummary {
            virtual_uart,
            frames_dropped: stats.frames_dropped,
            bytes_dropped: stats.bytes_dropped,
            core_exited_early,
        },
        format,
    );

    if core_exited_early {
        return Err(CliError::new(FAILURE, "core thread exited unexpectedly"));
    }
    Ok(SUCCESS)
}

fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => print_table(
            &["VIRTUAL UART", "FRAMES DROPPED", "BYTES DROPPED"],
            vec![vec![
                summary.virtual_uart.display().to_string(),
                summary.frames_dropped.to_string(),
                summary.bytes_dropped.to_string(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "stopped {}: frames_dropped={} bytes_dropped={}",
            summary.virtual_uart.display(),
            summary.frames_dropped,
            summary.bytes_dropped
        ),
        OutputFormat::Raw => {}
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
