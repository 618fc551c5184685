use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::Bytes;
use slipline_transport::SlipStream;

use crate::codec::FrameConfig;
use crate::decoder::{DecodeEvent, Decoder, DecoderStats, FrameEvent};
use crate::error::{FrameError, Result};
use crate::writer::transport_to_frame_error;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads SLIP frames from any `Read` stream.
///
/// Handles partial reads internally; callers get whole frames and overflow
/// notices, however the transport splits the bytes.
pub struct FrameReader<T> {
    inner: T,
    decoder: Decoder,
    pending: VecDeque<FrameEvent>,
    chunk: Box<[u8]>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: Decoder::with_config(config.decoder_config()),
            pending: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
            config,
        }
    }

    /// Read the next frame (blocking), skipping overflow notices.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let FrameEvent::Frame(frame) = self.read_event()? {
                return Ok(frame);
            }
        }
    }

    /// Read the next frame or overflow notice (blocking).
    pub fn read_event(&mut self) -> Result<FrameEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            let pending = &mut self.pending;
            fill(&mut self.inner, &mut self.chunk, &mut self.decoder, |event| {
                pending.push_back(event.into_owned())
            })?;
        }
    }

    /// Perform one read on the transport and run the bytes through the decoder.
    ///
    /// Events are reported while they borrow the receive buffer. Returns the
    /// number of bytes read; end of stream is `Err(FrameError::ConnectionClosed)`.
    pub fn read_chunk<F>(&mut self, on_event: F) -> Result<usize>
    where
        F: FnMut(DecodeEvent<'_>),
    {
        fill(&mut self.inner, &mut self.chunk, &mut self.decoder, on_event)
    }

    /// Run bytes obtained elsewhere through this reader's decoder.
    ///
    /// Returns the number of events reported.
    pub fn feed<F>(&mut self, chunk: &[u8], on_event: F) -> usize
    where
        F: FnMut(DecodeEvent<'_>),
    {
        self.decoder.feed(chunk, on_event)
    }

    /// Decoder counters (frames, overflows, protocol violations, noise).
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Drop any partial frame and queued events.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.pending.clear();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SlipStream> {
    /// Create a frame reader for a `SlipStream` and apply the read timeout from config.
    pub fn with_config_stream(mut inner: SlipStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn fill<T, F>(inner: &mut T, chunk: &mut [u8], decoder: &mut Decoder, on_event: F) -> Result<usize>
where
    T: Read,
    F: FnMut(DecodeEvent<'_>),
{
    let read = loop {
        match inner.read(chunk) {
            Ok(n) => break n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    };

    if read == 0 {
        return Err(FrameError::ConnectionClosed);
    }

    decoder.feed(&chunk[..read], on_event);
    Ok(read)
}
