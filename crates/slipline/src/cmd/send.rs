use std::fs;
use std::time::Instant;

use slipline_link::{Link, LinkConfig, LinkHandler};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat, base: LinkConfig) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = args.link.link_config(base)?;
    let source = args.link.endpoint.as_str();

    let mut reply = Reply::default();
    let mut link = Link::new(config);
    link.open(&mut reply)
        .map_err(|err| link_error("open failed", err))?;

    link.send_frame(&payload)
        .map_err(|err| link_error("send failed", err))?;
    info!(size = payload.len(), endpoint = source, "frame sent");

    if args.wait {
        let deadline = Instant::now() + wait_timeout;
        let frame = wait_for_reply(&mut reply, deadline, |reply| link.pump(reply))?;
        print_frame(&frame, source, format);
    }

    link.close(&mut reply);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return hex::decode(text.trim())
            .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Err(CliError::new(USAGE, "one of --data, --hex, --file is required"))
}

/// Collects the first inbound frame.
#[derive(Default)]
struct Reply {
    frame: Option<Vec<u8>>,
}

impl LinkHandler for Reply {
    fn on_frame(&mut self, frame: &[u8]) {
        if self.frame.is_none() {
            self.frame = Some(frame.to_vec());
        }
    }

    fn on_overflow(&mut self, capacity: usize) {
        warn!(capacity, "response exceeded receive buffer");
    }
}

fn wait_for_reply<P>(reply: &mut Reply, deadline: Instant, mut pump: P) -> CliResult<Vec<u8>>
where
    P: FnMut(&mut Reply) -> slipline_link::Result<bool>,
{
    loop {
        if let Some(frame) = reply.frame.take() {
            return Ok(frame);
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(TIMEOUT, "timed out waiting for a response frame"));
        }
        let open = pump(reply).map_err(|err| link_error("receive failed", err))?;
        if !open && reply.frame.is_none() {
            return Err(CliError::new(
                FAILURE,
                "link closed before a response frame arrived",
            ));
        }
    }
}
