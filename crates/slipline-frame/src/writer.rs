use std::io::{ErrorKind, Write};
use std::time::Duration;

use bytes::Bytes;
use slipline_transport::{SlipStream, WriteTransport};
use tracing::trace;

use crate::codec::{FrameConfig, Span, SpanCursor};
use crate::error::{FrameError, Result};

/// Where the writer is in delivering the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// No frame has been started.
    Idle,
    /// Segments are being handed to the transport.
    WritingSegment,
    /// The transport reported a full buffer; waiting for it to accept more.
    AwaitingDrain,
    /// The last frame was written and drained.
    Done,
}

/// Result of one [`FrameWriter::poll_write`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Blocked on transport backpressure.
    Pending,
    /// Trailing delimiter written and drained.
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub frames: u64,
    /// Successful `write` calls on the transport.
    pub write_calls: u64,
    /// Times a write was parked on a full transport buffer.
    pub backpressure_waits: u64,
}

/// Writes SLIP frames to a [`WriteTransport`], one frame at a time.
///
/// Each maximal run of plain payload bytes goes to the transport in a single
/// write call. A write that reports `WouldBlock` parks the frame in
/// [`WriteState::AwaitingDrain`]; nothing more is written until
/// [`notify_writable`](Self::notify_writable) (or a successful
/// [`wait_writable`](Self::wait_writable)) releases it.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
    state: WriteState,
    frame: Bytes,
    cursor: SpanCursor,
    span: Option<Span>,
    offset: usize,
    stats: WriterStats,
}

impl<T: WriteTransport> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            state: WriteState::Idle,
            frame: Bytes::new(),
            cursor: SpanCursor::default(),
            span: None,
            offset: 0,
            stats: WriterStats::default(),
        }
    }

    /// Encode and send one frame, blocking through backpressure until the
    /// trailing delimiter has been drained.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.start_frame(Bytes::copy_from_slice(payload))?;
        loop {
            match self.poll_write()? {
                WriteProgress::Complete => return Ok(()),
                WriteProgress::Pending => while !self.wait_writable(None)? {},
            }
        }
    }

    /// Begin writing a frame without blocking on the transport.
    ///
    /// Fails with [`FrameError::Busy`] while another frame is in flight.
    pub fn start_frame(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        if self.in_flight() {
            return Err(FrameError::Busy);
        }

        let payload = payload.into();
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.frame = payload;
        self.cursor = SpanCursor::default();
        self.span = self.cursor.next_span(&self.frame);
        self.offset = 0;
        self.state = WriteState::WritingSegment;
        Ok(())
    }

    /// Push the in-flight frame as far as the transport allows.
    ///
    /// Returns [`WriteProgress::Pending`] without touching the transport while
    /// parked in [`WriteState::AwaitingDrain`]. On a transport error the frame
    /// is abandoned and the error returned.
    pub fn poll_write(&mut self) -> Result<WriteProgress> {
        loop {
            match self.state {
                WriteState::Idle | WriteState::Done => return Ok(WriteProgress::Complete),
                WriteState::AwaitingDrain => return Ok(WriteProgress::Pending),
                WriteState::WritingSegment => {}
            }

            let Some(span) = self.span else {
                return self.finish_frame();
            };

            let pending = &span.resolve(&self.frame)[self.offset..];
            match self.inner.write(pending) {
                Ok(0) => {
                    self.abort();
                    return Err(FrameError::ConnectionClosed);
                }
                Ok(n) => {
                    self.stats.write_calls += 1;
                    self.offset += n;
                    if self.offset == span.resolve(&self.frame).len() {
                        self.span = self.cursor.next_span(&self.frame);
                        self.offset = 0;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    trace!("transport buffer full; awaiting drain");
                    self.stats.backpressure_waits += 1;
                    self.state = WriteState::AwaitingDrain;
                    return Ok(WriteProgress::Pending);
                }
                Err(err) => {
                    self.abort();
                    return Err(FrameError::Io(err));
                }
            }
        }
    }

    /// The transport signalled it can take more bytes.
    pub fn notify_writable(&mut self) {
        if self.state == WriteState::AwaitingDrain {
            self.state = WriteState::WritingSegment;
        }
    }

    /// Wait on the transport's "continue" signal and release a parked frame.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first.
    pub fn wait_writable(&mut self, timeout: Option<Duration>) -> Result<bool> {
        if self.state != WriteState::AwaitingDrain {
            return Ok(true);
        }
        let ready = match self.inner.wait_writable(timeout) {
            Ok(ready) => ready,
            Err(err) => {
                self.abort();
                return Err(FrameError::Io(err));
            }
        };
        if ready {
            self.notify_writable();
        }
        Ok(ready)
    }

    /// Abandon the in-flight frame, if any. Returns whether one was dropped.
    pub fn abort(&mut self) -> bool {
        let was_in_flight = self.in_flight();
        self.frame = Bytes::new();
        self.span = None;
        self.offset = 0;
        self.state = WriteState::Idle;
        was_in_flight
    }

    fn finish_frame(&mut self) -> Result<WriteProgress> {
        loop {
            match self.inner.drain() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.abort();
                    return Err(FrameError::Io(err));
                }
            }
        }
        trace!(len = self.frame.len(), "frame drained");
        self.frame = Bytes::new();
        self.state = WriteState::Done;
        self.stats.frames += 1;
        Ok(WriteProgress::Complete)
    }

    /// True while a frame has been started but not yet drained.
    pub fn in_flight(&self) -> bool {
        matches!(
            self.state,
            WriteState::WritingSegment | WriteState::AwaitingDrain
        )
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<SlipStream> {
    /// Create a frame writer for a `SlipStream` and apply the write timeout from config.
    pub fn with_config_stream(mut inner: SlipStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: slipline_transport::TransportError) -> FrameError {
    match err {
        slipline_transport::TransportError::Io(io)
        | slipline_transport::TransportError::Accept(io) => FrameError::Io(io),
        slipline_transport::TransportError::Bind { source, .. }
        | slipline_transport::TransportError::Connect { source, .. }
        | slipline_transport::TransportError::Configure { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
