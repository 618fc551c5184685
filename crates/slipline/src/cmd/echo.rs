use slipline_link::{CloseHandle, Link, LinkConfig, LinkError, LinkHandler};
use tracing::{debug, info, warn};

use crate::cmd::{accept_link, bind_endpoint, install_ctrlc_handler, EchoArgs};
use crate::exit::{link_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs, base: LinkConfig) -> CliResult<i32> {
    let config = args.link.link_config(base)?;
    let stop = CloseHandle::new();
    install_ctrlc_handler(stop.clone())?;

    let mut inbox = Inbox::default();

    if args.bind {
        let listener = bind_endpoint(&config)?;
        info!(path = %listener.path().display(), "echo server listening");
        while !stop.is_closed() {
            let mut link = accept_link(&listener, &config, &stop)?;
            debug!("peer connected");
            serve(&mut link, &mut inbox)?;
        }
        return Ok(SUCCESS);
    }

    let mut link = Link::new(config).with_close_handle(stop);
    link.open(&mut inbox)
        .map_err(|err| link_error("open failed", err))?;
    serve(&mut link, &mut inbox)?;
    Ok(SUCCESS)
}

/// Pump `link`, sending each received frame straight back, until it closes.
fn serve<R, W>(link: &mut Link<R, W>, inbox: &mut Inbox) -> CliResult<()>
where
    R: std::io::Read,
    W: slipline_transport::WriteTransport,
{
    loop {
        let open = link
            .pump(inbox)
            .map_err(|err| link_error("receive failed", err))?;
        if !open {
            inbox.frames.clear();
            return Ok(());
        }

        for frame in inbox.frames.drain(..) {
            info!(size = frame.len(), "echoing frame");
            match link.send_frame(&frame) {
                Ok(()) => {}
                Err(LinkError::Closed) => return Ok(()),
                Err(err) => return Err(link_error("echo send failed", err)),
            }
        }
    }
}

#[derive(Default)]
struct Inbox {
    frames: Vec<Vec<u8>>,
}

impl LinkHandler for Inbox {
    fn on_frame(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }

    fn on_overflow(&mut self, capacity: usize) {
        warn!(capacity, "inbound frame too large to echo; discarded");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use slipline_frame::FrameReader;

    use super::*;

    #[test]
    fn serve_echoes_until_peer_closes() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        local
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let writer = local.try_clone().unwrap();
        let mut link = Link::attach(local, writer, LinkConfig::default()).unwrap();

        remote.write_all(b"\xC0one\xC0\xC0two\xC0").unwrap();
        let mut reader = FrameReader::new(remote.try_clone().unwrap());

        let server = std::thread::spawn(move || {
            let mut inbox = Inbox::default();
            serve(&mut link, &mut inbox).unwrap();
        });

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");

        remote.shutdown(std::net::Shutdown::Write).unwrap();
        server.join().unwrap();
    }
}
