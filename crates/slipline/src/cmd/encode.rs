use std::io::{self, Read, Write};

use bytes::BytesMut;
use slipline_frame::encode_frame;

use crate::cmd::EncodeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .map_err(|err| io_error("failed reading stdin", err))?;

    let wire = encode_input(&input, args.lines);

    let mut stdout = io::stdout().lock();
    let written = if args.hex {
        writeln!(stdout, "{}", hex::encode(&wire))
    } else {
        stdout.write_all(&wire)
    };
    written
        .and_then(|()| stdout.flush())
        .map_err(|err| io_error("failed writing stdout", err))?;
    Ok(SUCCESS)
}

/// Frame `input` whole, or one frame per line (line terminators stripped).
fn encode_input(input: &[u8], lines: bool) -> BytesMut {
    let mut wire = BytesMut::new();
    if lines {
        for line in input.split(|b| *b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if !line.is_empty() {
                encode_frame(line, &mut wire);
            }
        }
    } else {
        encode_frame(input, &mut wire);
    }
    wire
}
