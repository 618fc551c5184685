use slipline_link::{CloseHandle, Link, LinkConfig, LinkHandler};
use tracing::debug;

use crate::cmd::{accept_link, bind_endpoint, install_ctrlc_handler, ListenArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_overflow, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat, base: LinkConfig) -> CliResult<i32> {
    let config = args.link.link_config(base)?;
    let stop = CloseHandle::new();
    install_ctrlc_handler(stop.clone())?;

    let mut printer = Printer {
        source: &args.link.endpoint,
        format,
        printed: 0,
        limit: args.count,
        stop: stop.clone(),
    };

    if args.bind {
        let listener = bind_endpoint(&config)?;
        while !stop.is_closed() {
            let mut link = accept_link(&listener, &config, &stop)?;
            debug!("peer connected");
            link.run(&mut printer)
                .map_err(|err| link_error("receive failed", err))?;
        }
        return Ok(SUCCESS);
    }

    let mut link = Link::new(config).with_close_handle(stop);
    link.open(&mut printer)
        .map_err(|err| link_error("open failed", err))?;
    link.run(&mut printer)
        .map_err(|err| link_error("receive failed", err))?;
    Ok(SUCCESS)
}

/// Prints every event and stops the link once `limit` frames were shown.
struct Printer<'a> {
    source: &'a str,
    format: OutputFormat,
    printed: usize,
    limit: Option<usize>,
    stop: CloseHandle,
}

impl LinkHandler for Printer<'_> {
    fn on_frame(&mut self, frame: &[u8]) {
        print_frame(frame, self.source, self.format);
        self.printed = self.printed.saturating_add(1);
        if self.limit.is_some_and(|limit| self.printed >= limit) {
            self.stop.close();
        }
    }

    fn on_overflow(&mut self, capacity: usize) {
        print_overflow(capacity, self.source, self.format);
    }

    fn on_closed(&mut self) {
        debug!(printed = self.printed, "link closed");
    }
}
