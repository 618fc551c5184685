use std::io::{self, Read};

use slipline_frame::{DecodeEvent, Decoder, DecodeState};
use slipline_link::LinkConfig;
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, print_overflow, print_stats, OutputFormat};

const SOURCE: &str = "stdin";

pub fn run(args: DecodeArgs, format: OutputFormat, mut config: LinkConfig) -> CliResult<i32> {
    args.decode.apply(&mut config);
    config
        .validate()
        .map_err(|err| link_error("invalid configuration", err))?;

    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .map_err(|err| io_error("failed reading stdin", err))?;
    if args.hex {
        input = parse_hex(&input)?;
    }

    let mut decoder = Decoder::with_config(config.frame_config().decoder_config());
    decoder.feed(&input, |event| match event {
        DecodeEvent::Frame(frame) => print_frame(frame, SOURCE, format),
        DecodeEvent::Overflow { capacity } => print_overflow(capacity, SOURCE, format),
    });

    if decoder.buffered() > 0 || decoder.state() == DecodeState::Escaped {
        debug!(
            buffered = decoder.buffered(),
            "input ended inside a frame; partial frame dropped"
        );
    }
    if args.stats {
        print_stats(&decoder.stats(), format);
    }
    Ok(SUCCESS)
}

/// Hex text to bytes, ignoring all whitespace.
fn parse_hex(text: &[u8]) -> CliResult<Vec<u8>> {
    let compact: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    hex::decode(compact)
        .map_err(|err| CliError::new(DATA_INVALID, format!("input is not valid hex: {err}")))
}
