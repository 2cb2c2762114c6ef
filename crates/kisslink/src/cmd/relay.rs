use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use kisslink_kiss::KissConfig;
use kisslink_relay::{ChannelConfig, VirtualChannel};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, RelayArgs};
use crate::exit::{relay_error, CliResult, SUCCESS};

pub fn run(args: RelayArgs) -> CliResult<i32> {
    let config = ChannelConfig {
        codec: KissConfig {
            poll_interval: parse_duration(&args.poll_interval)?,
            ..KissConfig::default()
        },
        ..ChannelConfig::default()
    };

    let mut channel = VirtualChannel::bind(args.listen.as_str(), config)
        .map_err(|err| relay_error("bind failed", &err))?;
    info!(addr = %channel.local_addr(), "virtual channel ready");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    channel
        .run_until(&running)
        .map_err(|fault| relay_error("relay failed", &fault))?;

    info!("virtual channel shut down");
    Ok(SUCCESS)
}
