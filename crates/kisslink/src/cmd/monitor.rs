use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kisslink_ax25::{decode_frame, DecodeConfig};
use kisslink_kiss::{KissConfig, KissDecoder, KissEncoder, KissFrame};
use kisslink_transport::TcpKissListener;
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, MonitorArgs};
use crate::exit::{kiss_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const IDLE_WAIT: Duration = Duration::from_millis(10);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = KissConfig::default();
    let stream = TcpKissListener::connect(args.addr.as_str())
        .map_err(|err| transport_error("connect failed", &err))?;
    stream
        .set_read_timeout(Some(config.poll_interval))
        .map_err(|err| transport_error("connect failed", &err))?;
    info!(peer = %stream.peer_label(), "monitoring kiss endpoint");

    let reader = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", &err))?;
    let mut decoder = KissDecoder::with_config(reader, config.clone());
    decoder
        .start()
        .map_err(|err| kiss_error("decoder start failed", &err))?;

    let mut encoder = if args.retransmit {
        let mut encoder = KissEncoder::with_config(
            stream
                .try_clone()
                .map_err(|err| transport_error("connect failed", &err))?,
            config,
        );
        encoder
            .start()
            .map_err(|err| kiss_error("encoder start failed", &err))?;
        Some(encoder)
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let decode_config = DecodeConfig {
        max_digipeaters: args.max_digipeaters,
        ..DecodeConfig::default()
    };
    let mut printed = 0usize;
    let mut outcome = Ok(SUCCESS);

    'outer: while running.load(Ordering::SeqCst) {
        let frames = decoder.take_outstanding_frames();
        if frames.is_empty() {
            if !decoder.is_running() {
                outcome = Err(match decoder.last_fault() {
                    Some(fault) => kiss_error("receive failed", &fault),
                    None => CliError::new(FAILURE, "connection closed by peer"),
                });
                break;
            }
            std::thread::sleep(IDLE_WAIT);
            continue;
        }

        for frame in frames {
            let summary = args.ax25.then(|| summarize(&frame, &decode_config));
            print_frame(&frame, summary.as_deref(), format);

            if let Some(encoder) = &encoder {
                encoder.queue_frame(&frame);
                debug!(size = frame.data().len(), "retransmitting frame");
            }

            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break 'outer;
            }
        }
    }

    decoder.stop();
    if let Some(encoder) = encoder.as_mut() {
        // Let pending retransmissions drain before closing.
        for _ in 0..50 {
            if encoder.pending() == 0 {
                break;
            }
            std::thread::sleep(IDLE_WAIT);
        }
        if let Some(fault) = encoder.stop() {
            return Err(kiss_error("retransmit failed", &fault));
        }
    }
    let _ = stream.shutdown();
    outcome
}

fn summarize(frame: &KissFrame, config: &DecodeConfig) -> String {
    if !frame.is_data() {
        return "(not a data frame)".to_string();
    }
    match decode_frame(frame.data(), config) {
        Ok(ax25) => ax25.to_string(),
        Err(err) => format!("(undecodable: {err})"),
    }
}
