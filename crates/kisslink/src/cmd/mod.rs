use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod monitor;
pub mod relay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a virtual channel: relay data frames between all TCP clients.
    Relay(RelayArgs),
    /// Connect to a KISS TCP endpoint and print received frames.
    Monitor(MonitorArgs),
    /// Decode one AX.25 frame from a base64 KISS data payload.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Relay(args) => relay::run(args),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Address to listen on.
    #[arg(long, env = "KISSLINK_LISTEN", default_value = "0.0.0.0:8105")]
    pub listen: String,
    /// How often idle codec loops check for shutdown (e.g. 50ms).
    #[arg(long, default_value = "50ms")]
    pub poll_interval: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// KISS TCP endpoint to connect to (host:port).
    #[arg(env = "KISSLINK_CONNECT")]
    pub addr: String,
    /// Send every received frame back unchanged.
    #[arg(long)]
    pub retransmit: bool,
    /// Also decode data frames as AX.25.
    #[arg(long)]
    pub ax25: bool,
    /// Maximum digipeaters accepted when decoding AX.25.
    #[arg(long, default_value_t = kisslink_ax25::DEFAULT_MAX_DIGIPEATERS)]
    pub max_digipeaters: usize,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Base64-encoded AX.25 frame (a KISS data frame's payload).
    pub frame: String,
    /// Maximum digipeaters accepted.
    #[arg(long, default_value_t = kisslink_ax25::DEFAULT_MAX_DIGIPEATERS)]
    pub max_digipeaters: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
