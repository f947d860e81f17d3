use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::{parse_number, OutputFormat};

pub mod channels;
pub mod doctor;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the mediator until interrupted.
    Run(RunArgs),
    /// Print the configured channel table.
    Channels(ChannelsArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Write one CBC frame to a virtual UART, as a guest would.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Channels(args) => channels::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn parse_u8(input: &str) -> Result<u8, String> {
    parse_number(input)
}

fn parse_u32(input: &str) -> Result<u32, String> {
    parse_number(input)
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path at which to expose the virtual UART.
    pub path: PathBuf,
    /// Boot (wakeup) reason reported to the guest. Decimal or 0x hex.
    #[arg(long, value_parser = parse_u32)]
    pub boot_reason: Option<u32>,
    /// JSON configuration file (channels, routing, pool size).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Number of requests in the pool.
    #[arg(long)]
    pub pool_size: Option<usize>,
    /// Start even when the CBC platform probe fails.
    #[arg(long)]
    pub skip_platform_check: bool,
}

#[derive(Args, Debug)]
pub struct ChannelsArgs {
    /// JSON configuration file. Default: built-in channel table.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// JSON configuration file whose channel paths should be checked.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Virtual UART path to write to.
    pub path: PathBuf,
    /// Channel mux byte. Decimal or 0x hex.
    #[arg(long, value_parser = parse_u8)]
    pub mux: u8,
    /// Service command byte. Decimal or 0x hex.
    #[arg(long, value_parser = parse_u8)]
    pub command: u8,
    /// Payload as hex digits (e.g. "01ff").
    #[arg(long)]
    pub data: Option<String>,
    /// Wait for one frame back and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load a JSON config, or fall back to the built-in channel table.
///
/// Without a file the virtual UART path and boot reason are left for the
/// caller to fill in.
pub(crate) fn load_config(
    file: Option<&std::path::Path>,
) -> CliResult<iocmed_mediator::MediatorConfig> {
    match file {
        Some(path) => iocmed_mediator::MediatorConfig::from_json_file(path)
            .map_err(|err| crate::exit::mediator_error("config load failed", err)),
        None => Ok(iocmed_mediator::MediatorConfig::new("", 0)),
    }
}
