use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kisslink_ax25::{decode_frame, DecodeConfig};

use crate::cmd::DecodeArgs;
use crate::exit::{ax25_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_ax25, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = STANDARD
        .decode(args.frame.trim())
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid base64: {err}")))?;

    let config = DecodeConfig {
        max_digipeaters: args.max_digipeaters,
        ..DecodeConfig::default()
    };
    let frame = decode_frame(&bytes, &config).map_err(|err| ax25_error("decode failed", &err))?;

    print_ax25(&frame, format);
    Ok(SUCCESS)
}
