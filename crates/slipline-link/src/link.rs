use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::Bytes;
use slipline_frame::{
    DecodeEvent, DecoderStats, FrameError, FrameReader, FrameWriter, WriteProgress, WriterStats,
};
use slipline_transport::{SlipStream, WriteTransport};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::handler::{CloseHandle, LinkHandler};

/// Lifecycle of a [`Link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Created, transport not yet acquired.
    Unopened,
    /// Frames may be sent and are being delivered.
    Open,
    /// Closed locally or by the peer. Terminal.
    Closed,
    /// The transport failed. Terminal.
    Errored,
}

/// A duplex SLIP link over one byte channel.
///
/// Outbound frames go through a [`FrameWriter`], one at a time. Inbound bytes
/// go through a [`FrameReader`] and come out as [`LinkHandler`] callbacks,
/// either pulled from the transport ([`pump`](Self::pump),
/// [`run`](Self::run)) or pushed by the caller ([`feed`](Self::feed)).
pub struct Link<R = SlipStream, W = SlipStream> {
    config: LinkConfig,
    state: LinkState,
    reader: Option<FrameReader<R>>,
    writer: Option<FrameWriter<W>>,
    close: CloseHandle,
    /// Send-path failure not yet reported to a handler.
    failure: Option<LinkError>,
}

impl Link<SlipStream, SlipStream> {
    /// Create an unopened link; the transport is acquired by [`open`](Self::open).
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: LinkState::Unopened,
            reader: None,
            writer: None,
            close: CloseHandle::new(),
            failure: None,
        }
    }

    /// Acquire the configured endpoint and start the link.
    ///
    /// On failure the handler sees `on_error` with the cause, the error is
    /// returned, and the link stays unopened.
    pub fn open<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: LinkHandler + ?Sized,
    {
        match self.state {
            LinkState::Unopened => {}
            LinkState::Open => return Err(LinkError::AlreadyOpen),
            LinkState::Closed | LinkState::Errored => return Err(LinkError::Closed),
        }

        match self.acquire() {
            Ok((reader, writer)) => {
                info!(
                    transport = reader.get_ref().transport_name(),
                    rx_capacity = self.config.rx_capacity,
                    "link open"
                );
                self.reader = Some(reader);
                self.writer = Some(writer);
                self.state = LinkState::Open;
                handler.on_opened();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to open link");
                handler.on_error(&err);
                Err(err)
            }
        }
    }

    fn acquire(&self) -> Result<(FrameReader<SlipStream>, FrameWriter<SlipStream>)> {
        self.config.validate()?;
        let endpoint = self.config.endpoint()?;
        debug!(%endpoint, "acquiring transport");

        let stream = SlipStream::open(&endpoint)?;
        let reader_stream = stream.try_clone()?;

        let frame_config = self.config.frame_config();
        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;
        Ok((reader, writer))
    }
}

impl<R: Read, W: WriteTransport> Link<R, W> {
    /// Wrap an already established channel; the link starts out open.
    ///
    /// Timeouts are not applied to the halves. Give the read half a read
    /// timeout if [`run`](Self::run) must notice a close request while the
    /// line is idle.
    pub fn attach(reader: R, writer: W, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let frame_config = config.frame_config();
        Ok(Self {
            reader: Some(FrameReader::with_config(reader, frame_config.clone())),
            writer: Some(FrameWriter::with_config(writer, frame_config)),
            state: LinkState::Open,
            config,
            close: CloseHandle::new(),
            failure: None,
        })
    }

    /// Send one frame, blocking through transport backpressure until the
    /// trailing delimiter has been written and drained.
    ///
    /// Fails with [`LinkError::Closed`] once the link is closed, including
    /// when a close is requested while the frame is waiting on the transport.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if self.close.is_closed() {
            return Err(LinkError::Closed);
        }

        let tick = self.config.read_timeout();
        let deadline = self.config.write_timeout().map(|t| Instant::now() + t);
        let writer = self.writer.as_mut().ok_or(LinkError::NotOpen)?;

        writer.start_frame(Bytes::copy_from_slice(payload))?;
        let result = drive_send(writer, &self.close, tick, deadline);
        if let Err(LinkError::Frame(err)) = &result {
            if is_fatal(err) {
                warn!(error = %err, "transport failed while sending");
                self.failure = Some(LinkError::Frame(replicate(err)));
                self.state = LinkState::Errored;
                self.release();
            }
        }
        result
    }

    /// Queue a frame without blocking. Drive it with [`poll_send`](Self::poll_send).
    ///
    /// Fails with [`FrameError::Busy`] while another frame is in flight.
    pub fn start_frame(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        self.writer_mut()?.start_frame(payload)?;
        Ok(())
    }

    /// Push the in-flight frame as far as the transport allows.
    pub fn poll_send(&mut self) -> Result<WriteProgress> {
        self.ensure_open()?;
        Ok(self.writer_mut()?.poll_write()?)
    }

    /// Tell the link the transport can take more bytes.
    pub fn notify_writable(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.notify_writable();
        }
    }

    /// Block until the transport is writable or `timeout` elapses.
    pub fn wait_writable(&mut self, timeout: Option<Duration>) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.writer_mut()?.wait_writable(timeout)?)
    }

    /// Decode bytes the caller read from the transport itself.
    ///
    /// Returns the number of events delivered.
    pub fn feed<H>(&mut self, chunk: &[u8], handler: &mut H) -> Result<usize>
    where
        H: LinkHandler + ?Sized,
    {
        self.ensure_open()?;
        let close = &self.close;
        let reader = self.reader.as_mut().ok_or(LinkError::NotOpen)?;
        Ok(reader.feed(chunk, |event| dispatch(event, close, handler)))
    }

    /// Read one chunk from the transport and deliver what it completes.
    ///
    /// Returns `Ok(false)` once the link is no longer open. An expired read
    /// timeout is an idle tick and returns `Ok(true)`. A transport failure
    /// hit by `send_frame` is reported to the handler here, once, and
    /// returned as the error.
    pub fn pump<H>(&mut self, handler: &mut H) -> Result<bool>
    where
        H: LinkHandler + ?Sized,
    {
        match self.state {
            LinkState::Open => {}
            LinkState::Unopened => return Err(LinkError::NotOpen),
            LinkState::Errored => {
                if let Some(err) = self.failure.take() {
                    handler.on_error(&err);
                    return Err(err);
                }
                return Ok(false);
            }
            LinkState::Closed => return Ok(false),
        }
        if self.close.is_closed() {
            self.close(handler);
            return Ok(false);
        }

        let close = &self.close;
        let reader = self.reader.as_mut().ok_or(LinkError::NotOpen)?;
        match reader.read_chunk(|event| dispatch(event, close, handler)) {
            Ok(_) => {}
            Err(err) if err.is_timeout() => {}
            Err(FrameError::ConnectionClosed) => {
                debug!("peer closed the channel");
                self.close(handler);
                return Ok(false);
            }
            Err(err) => {
                let err = LinkError::from(err);
                self.fail(handler, &err);
                return Err(err);
            }
        }

        if self.close.is_closed() {
            self.close(handler);
            return Ok(false);
        }
        Ok(true)
    }

    /// Pump until the peer closes, the transport fails, or the close handle fires.
    pub fn run<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: LinkHandler + ?Sized,
    {
        while self.pump(handler)? {}
        Ok(())
    }

    /// Close the link: abort any in-flight frame, release the transport, and
    /// notify `on_closed`. Closing twice is a no-op.
    pub fn close<H>(&mut self, handler: &mut H)
    where
        H: LinkHandler + ?Sized,
    {
        let was_open = self.state == LinkState::Open;
        if self.state == LinkState::Closed {
            return;
        }

        self.close.close();
        if let Some(writer) = self.writer.as_mut() {
            if writer.abort() {
                debug!("aborted in-flight frame");
            }
        }
        self.release();
        self.state = LinkState::Closed;

        if was_open {
            info!("link closed");
            handler.on_closed();
        }
    }

    /// A handle that closes this link from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Share an existing close handle, e.g. one already wired to a signal handler.
    pub fn with_close_handle(mut self, handle: CloseHandle) -> Self {
        self.close = handle;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Receive-side counters, while the transport is held.
    pub fn decoder_stats(&self) -> Option<DecoderStats> {
        self.reader.as_ref().map(FrameReader::stats)
    }

    /// Send-side counters, while the transport is held.
    pub fn writer_stats(&self) -> Option<WriterStats> {
        self.writer.as_ref().map(FrameWriter::stats)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            LinkState::Open => Ok(()),
            LinkState::Unopened => Err(LinkError::NotOpen),
            LinkState::Closed | LinkState::Errored => Err(LinkError::Closed),
        }
    }

    fn writer_mut(&mut self) -> Result<&mut FrameWriter<W>> {
        self.writer.as_mut().ok_or(LinkError::NotOpen)
    }

    fn fail<H>(&mut self, handler: &mut H, err: &LinkError)
    where
        H: LinkHandler + ?Sized,
    {
        warn!(error = %err, "link failed");
        if let Some(writer) = self.writer.as_mut() {
            writer.abort();
        }
        self.release();
        self.state = LinkState::Errored;
        handler.on_error(err);
    }

    fn release(&mut self) {
        self.reader = None;
        self.writer = None;
    }
}

fn dispatch<H>(event: DecodeEvent<'_>, close: &CloseHandle, handler: &mut H)
where
    H: LinkHandler + ?Sized,
{
    if close.is_closed() {
        return;
    }
    match event {
        DecodeEvent::Frame(frame) => handler.on_frame(frame),
        DecodeEvent::Overflow { capacity } => {
            warn!(capacity, "inbound frame exceeded receive buffer; discarded");
            handler.on_overflow(capacity);
        }
    }
}

fn drive_send<W: WriteTransport>(
    writer: &mut FrameWriter<W>,
    close: &CloseHandle,
    tick: Duration,
    deadline: Option<Instant>,
) -> Result<()> {
    loop {
        if writer.poll_write()? == WriteProgress::Complete {
            return Ok(());
        }
        if close.is_closed() {
            writer.abort();
            debug!("close requested while awaiting drain");
            return Err(LinkError::Closed);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            writer.abort();
            return Err(FrameError::Io(std::io::Error::from(ErrorKind::TimedOut)).into());
        }
        writer.wait_writable(Some(tick))?;
    }
}

/// Copy of a send error for the handler; `io::Error` is not `Clone`.
fn replicate(err: &FrameError) -> FrameError {
    match err {
        FrameError::Io(source) => {
            FrameError::Io(std::io::Error::new(source.kind(), source.to_string()))
        }
        FrameError::ConnectionClosed => FrameError::ConnectionClosed,
        FrameError::Busy => FrameError::Busy,
        FrameError::PayloadTooLarge { size, max } => FrameError::PayloadTooLarge {
            size: *size,
            max: *max,
        },
        FrameError::InvalidCapacity(capacity) => FrameError::InvalidCapacity(*capacity),
    }
}

fn is_fatal(err: &FrameError) -> bool {
    match err {
        FrameError::Io(_) => !err.is_timeout(),
        FrameError::ConnectionClosed => true,
        FrameError::Busy | FrameError::PayloadTooLarge { .. } | FrameError::InvalidCapacity(_) => {
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    use std::path::PathBuf;

    use slipline_frame::FrameReader;
    use slipline_transport::{Endpoint, UnixDomainSocket};

    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/slipline-link-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[derive(Default)]
    struct Recorder {
        opened: usize,
        frames: Vec<Vec<u8>>,
        overflows: Vec<usize>,
        errors: Vec<String>,
        closed: usize,
    }

    impl LinkHandler for Recorder {
        fn on_opened(&mut self) {
            self.opened += 1;
        }

        fn on_frame(&mut self, frame: &[u8]) {
            self.frames.push(frame.to_vec());
        }

        fn on_overflow(&mut self, capacity: usize) {
            self.overflows.push(capacity);
        }

        fn on_error(&mut self, err: &LinkError) {
            self.errors.push(err.to_string());
        }

        fn on_closed(&mut self) {
            self.closed += 1;
        }
    }

    fn attached(config: LinkConfig) -> (Link<UnixStream, UnixStream>, UnixStream) {
        let (local, remote) = UnixStream::pair().unwrap();
        local
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let writer = local.try_clone().unwrap();
        (Link::attach(local, writer, config).unwrap(), remote)
    }

    #[test]
    fn send_frame_reaches_peer() {
        let (mut link, remote) = attached(LinkConfig::default());
        link.send_frame(&[0xC0, 0xDB, 0x41]).unwrap();
        link.send_frame(b"second").unwrap();

        let mut reader = FrameReader::new(remote);
        assert_eq!(reader.read_frame().unwrap().as_ref(), &[0xC0u8, 0xDB, 0x41][..]);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"second");
        assert_eq!(link.writer_stats().unwrap().frames, 2);
    }

    #[test]
    fn pump_delivers_frames_and_overflows() {
        let config = LinkConfig {
            rx_capacity: 4,
            ..LinkConfig::default()
        };
        let (mut link, mut remote) = attached(config);
        remote.write_all(b"noise\xC0abc\xC0\xC0toolong\xC0\xC0ok\xC0").unwrap();

        let mut recorder = Recorder::default();
        assert!(link.pump(&mut recorder).unwrap());
        assert_eq!(recorder.frames, vec![b"abc".to_vec(), b"ok".to_vec()]);
        assert_eq!(recorder.overflows, vec![4]);
        // "noise" before the first frame, "ng" after the overflow
        assert_eq!(link.decoder_stats().unwrap().noise_bytes, 7);
    }

    #[test]
    fn idle_pump_is_a_tick() {
        let (mut link, _remote) = attached(LinkConfig::default());
        let mut recorder = Recorder::default();
        assert!(link.pump(&mut recorder).unwrap());
        assert!(recorder.frames.is_empty());
        assert_eq!(link.state(), LinkState::Open);
    }

    #[test]
    fn peer_close_closes_link() {
        let (mut link, remote) = attached(LinkConfig::default());
        drop(remote);

        let mut recorder = Recorder::default();
        link.run(&mut recorder).unwrap();
        assert_eq!(link.state(), LinkState::Closed);
        assert_eq!(recorder.closed, 1);
        assert!(recorder.errors.is_empty());
    }

    #[test]
    fn send_after_close_fails_without_touching_transport() {
        let (mut link, _remote) = attached(LinkConfig::default());
        let mut recorder = Recorder::default();
        link.close(&mut recorder);

        assert!(matches!(link.send_frame(b"late"), Err(LinkError::Closed)));
        assert!(link.writer_stats().is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let (mut link, _remote) = attached(LinkConfig::default());
        let mut recorder = Recorder::default();
        link.close(&mut recorder);
        link.close(&mut recorder);
        assert_eq!(recorder.closed, 1);
        assert!(!link.pump(&mut recorder).unwrap());
    }

    #[test]
    fn feed_requires_open_link() {
        let mut link = Link::new(LinkConfig::default());
        let mut recorder = Recorder::default();
        assert!(matches!(
            link.feed(b"\xC0a\xC0", &mut recorder),
            Err(LinkError::NotOpen)
        ));
        assert!(matches!(link.send_frame(b"a"), Err(LinkError::NotOpen)));
    }

    #[test]
    fn feed_delivers_pushed_chunks() {
        let (mut link, _remote) = attached(LinkConfig::default());
        let mut recorder = Recorder::default();
        assert_eq!(link.feed(b"\xC0he", &mut recorder).unwrap(), 0);
        assert_eq!(link.feed(b"llo\xC0", &mut recorder).unwrap(), 1);
        assert_eq!(recorder.frames, vec![b"hello".to_vec()]);
    }

    #[test]
    fn no_frames_after_close_requested() {
        let (mut link, mut remote) = attached(LinkConfig::default());
        remote.write_all(b"\xC0one\xC0\xC0two\xC0").unwrap();

        let handle = link.close_handle();
        let mut frames = Vec::new();
        let mut handler = |frame: &[u8]| {
            frames.push(frame.to_vec());
            handle.close();
        };
        link.run(&mut handler).unwrap();

        assert_eq!(frames, vec![b"one".to_vec()]);
        assert_eq!(link.state(), LinkState::Closed);
    }

    #[test]
    fn open_without_endpoint_reports_error() {
        let mut link = Link::new(LinkConfig::default());
        let mut recorder = Recorder::default();
        let err = link.open(&mut recorder).unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(link.state(), LinkState::Unopened);
    }

    #[test]
    fn open_missing_socket_reports_transport_error() {
        let config = LinkConfig {
            endpoint: Some(slipline_transport::Endpoint::unix(
                "/nonexistent/slipline-test.sock",
            )),
            ..LinkConfig::default()
        };
        let mut link = Link::new(config);
        let mut recorder = Recorder::default();
        let err = link.open(&mut recorder).unwrap_err();
        assert!(matches!(err, LinkError::Transport(_)));
        assert_eq!(recorder.opened, 0);
        assert_eq!(recorder.errors.len(), 1);
    }

    #[test]
    fn open_unix_endpoint_and_exchange() {
        let dir = unique_temp_dir("open");
        let listener = UnixDomainSocket::bind(dir.join("link.sock")).unwrap();
        let config = LinkConfig {
            endpoint: Some(Endpoint::unix(listener.path())),
            ..LinkConfig::default()
        };

        let mut link = Link::new(config);
        let mut recorder = Recorder::default();
        link.open(&mut recorder).unwrap();
        assert_eq!(recorder.opened, 1);
        assert!(matches!(
            link.open(&mut recorder),
            Err(LinkError::AlreadyOpen)
        ));

        let mut peer = listener.accept().unwrap();
        link.send_frame(b"ping").unwrap();
        let mut peer_reader = FrameReader::new(peer.try_clone().unwrap());
        assert_eq!(peer_reader.read_frame().unwrap().as_ref(), b"ping");

        peer.write_all(b"\xC0pong\xC0").unwrap();
        while recorder.frames.is_empty() {
            assert!(link.pump(&mut recorder).unwrap());
        }
        assert_eq!(recorder.frames, vec![b"pong".to_vec()]);

        link.close(&mut recorder);
        assert_eq!(recorder.closed, 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn open_after_close_is_rejected() {
        let mut link = Link::new(LinkConfig::default());
        let mut recorder = Recorder::default();
        link.close(&mut recorder);
        assert!(matches!(link.open(&mut recorder), Err(LinkError::Closed)));
        assert_eq!(recorder.closed, 0);
    }

    #[test]
    fn read_failure_moves_to_errored() {
        let mut link = Link::attach(BrokenReader, Vec::new(), LinkConfig::default()).unwrap();
        let mut recorder = Recorder::default();
        let err = link.pump(&mut recorder).unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::Io(_))));
        assert_eq!(link.state(), LinkState::Errored);
        assert_eq!(recorder.errors.len(), 1);
        assert!(matches!(link.send_frame(b"x"), Err(LinkError::Closed)));
    }

    #[test]
    fn close_while_awaiting_drain_aborts_send() {
        let handle = CloseHandle::new();
        let stalled = StalledWriter {
            on_wait: Some(handle.clone()),
        };
        let mut link = Link::attach(std::io::empty(), stalled, LinkConfig::default())
            .unwrap()
            .with_close_handle(handle);

        assert!(matches!(link.send_frame(b"payload"), Err(LinkError::Closed)));
        assert_eq!(link.state(), LinkState::Open);

        let mut recorder = Recorder::default();
        link.close(&mut recorder);
        assert_eq!(recorder.closed, 1);
    }

    #[test]
    fn write_timeout_bounds_blocked_send() {
        let config = LinkConfig {
            write_timeout_ms: Some(10),
            read_timeout_ms: 1,
            ..LinkConfig::default()
        };
        let mut link =
            Link::attach(std::io::empty(), StalledWriter { on_wait: None }, config).unwrap();

        let err = link.send_frame(b"payload").unwrap_err();
        assert!(matches!(&err, LinkError::Frame(e) if e.is_timeout()));
        assert_eq!(link.state(), LinkState::Open);
    }

    #[test]
    fn non_blocking_send_path() {
        let mut link = Link::attach(std::io::empty(), Vec::new(), LinkConfig::default()).unwrap();
        link.start_frame(Bytes::from_static(b"abc")).unwrap();
        assert!(matches!(
            link.start_frame(Bytes::from_static(b"def")),
            Err(LinkError::Frame(FrameError::Busy))
        ));
        assert_eq!(link.poll_send().unwrap(), WriteProgress::Complete);
        link.start_frame(Bytes::from_static(b"def")).unwrap();
    }

    #[test]
    fn send_failure_reaches_handler_on_next_run() {
        let mut link = Link::attach(std::io::empty(), BrokenWriter, LinkConfig::default()).unwrap();

        let err = link.send_frame(b"x").unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::Io(_))));
        assert_eq!(link.state(), LinkState::Errored);

        let mut recorder = Recorder::default();
        let err = link.run(&mut recorder).unwrap_err();
        assert!(matches!(
            &err,
            LinkError::Frame(FrameError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.closed, 0);

        assert!(!link.pump(&mut recorder).unwrap());
        assert_eq!(recorder.errors.len(), 1);
    }

    struct BrokenReader;

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl WriteTransport for BrokenWriter {
        fn wait_writable(&mut self, _timeout: Option<Duration>) -> std::io::Result<bool> {
            Ok(true)
        }
    }

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }

    /// Never accepts a byte. Optionally requests a close while waiting.
    struct StalledWriter {
        on_wait: Option<CloseHandle>,
    }

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl WriteTransport for StalledWriter {
        fn wait_writable(&mut self, _timeout: Option<Duration>) -> std::io::Result<bool> {
            if let Some(handle) = &self.on_wait {
                handle.close();
            }
            Ok(false)
        }
    }
}
