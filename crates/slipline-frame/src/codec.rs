use bytes::{BufMut, BytesMut};

use crate::decoder::{DecoderConfig, EscapePolicy};

/// Frame boundary marker.
pub const FRAME_DELIM: u8 = 0xC0;

/// Introduces a two-byte escape sequence.
pub const ESCAPE: u8 = 0xDB;

/// Follows [`ESCAPE`] to stand for a literal [`FRAME_DELIM`].
pub const ESC_DELIM: u8 = 0xDC;

/// Follows [`ESCAPE`] to stand for a literal [`ESCAPE`].
pub const ESC_ESCAPE: u8 = 0xDD;

/// Default receive buffer capacity in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 512;

/// Default maximum outbound payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

const DELIM_BYTES: &[u8] = &[FRAME_DELIM];
const ESCAPED_DELIM: &[u8] = &[ESCAPE, ESC_DELIM];
const ESCAPED_ESCAPE: &[u8] = &[ESCAPE, ESC_ESCAPE];

/// True for bytes that cannot appear literally inside a frame.
#[inline]
pub fn is_reserved(byte: u8) -> bool {
    byte == FRAME_DELIM || byte == ESCAPE
}

/// Number of wire bytes `payload` occupies once framed.
pub fn encoded_len(payload: &[u8]) -> usize {
    let reserved = payload.iter().filter(|b| is_reserved(**b)).count();
    payload.len() + reserved + 2
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// frame       := DELIM byte* DELIM
/// byte        := plain_byte | ESCAPE escape_code
/// plain_byte  := any byte except 0xC0, 0xDB
/// escape_code := 0xDC (literal 0xC0) | 0xDD (literal 0xDB)
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(payload));
    for segment in Segments::new(payload) {
        dst.put_slice(segment);
    }
}

/// The wire pieces of one frame, in order.
///
/// Yields the leading delimiter, then each maximal run of plain payload bytes
/// (borrowed, never copied) or a two-byte escape sequence, then the trailing
/// delimiter. A payload with `k` reserved bytes yields at most `2k + 3` pieces.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    payload: &'a [u8],
    cursor: SpanCursor,
}

impl<'a> Segments<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            cursor: SpanCursor::default(),
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        self.cursor
            .next_span(self.payload)
            .map(|span| span.resolve(self.payload))
    }
}

/// One wire piece, stored without borrowing the payload so a writer can keep
/// it across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Span {
    Fixed(&'static [u8]),
    Payload { start: usize, end: usize },
}

impl Span {
    pub(crate) fn resolve(self, payload: &[u8]) -> &[u8] {
        match self {
            Span::Fixed(bytes) => bytes,
            Span::Payload { start, end } => &payload[start..end],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Stage {
    #[default]
    Start,
    Body,
    Finished,
}

/// Position of the encoder within a payload.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SpanCursor {
    pos: usize,
    stage: Stage,
}

impl SpanCursor {
    pub(crate) fn next_span(&mut self, payload: &[u8]) -> Option<Span> {
        match self.stage {
            Stage::Start => {
                self.stage = Stage::Body;
                Some(Span::Fixed(DELIM_BYTES))
            }
            Stage::Body if self.pos >= payload.len() => {
                self.stage = Stage::Finished;
                Some(Span::Fixed(DELIM_BYTES))
            }
            Stage::Body => {
                let start = self.pos;
                match payload[start] {
                    FRAME_DELIM => {
                        self.pos += 1;
                        Some(Span::Fixed(ESCAPED_DELIM))
                    }
                    ESCAPE => {
                        self.pos += 1;
                        Some(Span::Fixed(ESCAPED_ESCAPE))
                    }
                    _ => {
                        let end = payload[start..]
                            .iter()
                            .position(|b| is_reserved(*b))
                            .map_or(payload.len(), |offset| start + offset);
                        self.pos = end;
                        Some(Span::Payload { start, end })
                    }
                }
            }
            Stage::Finished => None,
        }
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum outbound payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Receive buffer capacity; bounds the largest frame that can be received.
    pub rx_capacity: usize,
    /// How to treat an escape byte followed by an invalid code.
    pub escape_policy: EscapePolicy,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// Decoder settings derived from this configuration.
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            capacity: self.rx_capacity,
            escape_policy: self.escape_policy,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            rx_capacity: DEFAULT_RX_CAPACITY,
            escape_policy: EscapePolicy::default(),
            read_timeout: None,
            write_timeout: None,
        }
    }
}
