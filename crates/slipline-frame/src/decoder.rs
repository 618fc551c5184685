//! Receive-side state machine.
//!
//! The decoder owns a fixed-capacity buffer that is reused for every frame.
//! Bytes are processed one at a time, so the transport may split or coalesce
//! frames arbitrarily.
//!
//! | State         | Input          | Action                               | Next          |
//! |---------------|----------------|--------------------------------------|---------------|
//! | AwaitingStart | `FRAME_DELIM`  | none                                 | InFrame       |
//! | AwaitingStart | other          | discard (noise)                      | AwaitingStart |
//! | InFrame       | `FRAME_DELIM`  | deliver if buffer non-empty          | AwaitingStart |
//! | InFrame       | `FRAME_DELIM`  | buffer empty: absorb                 | InFrame       |
//! | InFrame       | `ESCAPE`       | none                                 | Escaped       |
//! | InFrame       | other          | append                               | InFrame       |
//! | Escaped       | `ESC_DELIM`    | append `FRAME_DELIM`                 | InFrame       |
//! | Escaped       | `ESC_ESCAPE`   | append `ESCAPE`                      | InFrame       |
//! | Escaped       | other          | apply [`EscapePolicy`]               | InFrame       |
//!
//! An append that would exceed capacity discards the frame, returns to
//! `AwaitingStart`, and yields [`DecodeEvent::Overflow`].

use bytes::Bytes;
use tracing::{debug, trace};

use crate::codec::{DEFAULT_RX_CAPACITY, ESCAPE, ESC_DELIM, ESC_ESCAPE, FRAME_DELIM};

/// What to do when an escape byte is followed by neither escape code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum EscapePolicy {
    /// Store nothing for the offending byte and keep assembling the frame.
    #[default]
    Skip,
    /// Store the offending byte as if it had not been escaped.
    PassThrough,
    /// Drop the whole frame and wait for the next delimiter.
    DiscardFrame,
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Largest frame, in decoded bytes, that can be delivered.
    pub capacity: usize,
    pub escape_policy: EscapePolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RX_CAPACITY,
            escape_policy: EscapePolicy::default(),
        }
    }
}

/// Persisted decoder states. Frame completion is a transition, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    AwaitingStart,
    InFrame,
    Escaped,
}

/// Something the decoder has to tell its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent<'a> {
    /// A complete frame. Borrows the receive buffer until the next byte is pushed.
    Frame(&'a [u8]),
    /// A frame grew past `capacity` bytes and was discarded.
    Overflow { capacity: usize },
}

impl DecodeEvent<'_> {
    /// Copy the event out of the receive buffer.
    pub fn into_owned(self) -> FrameEvent {
        match self {
            DecodeEvent::Frame(frame) => FrameEvent::Frame(Bytes::copy_from_slice(frame)),
            DecodeEvent::Overflow { capacity } => FrameEvent::Overflow { capacity },
        }
    }
}

/// Owned form of [`DecodeEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Frame(Bytes),
    Overflow { capacity: usize },
}

impl FrameEvent {
    /// The frame payload, if this event carries one.
    pub fn frame(&self) -> Option<&Bytes> {
        match self {
            FrameEvent::Frame(frame) => Some(frame),
            FrameEvent::Overflow { .. } => None,
        }
    }
}

/// Running counters, never reset by [`Decoder::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub overflows: u64,
    pub protocol_violations: u64,
    pub noise_bytes: u64,
}

/// Incremental SLIP decoder over a fixed receive buffer.
pub struct Decoder {
    buf: Box<[u8]>,
    len: usize,
    state: DecodeState,
    escape_policy: EscapePolicy,
    stats: DecoderStats,
}

impl Decoder {
    /// Decoder with a `capacity`-byte receive buffer and the default escape policy.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(DecoderConfig {
            capacity,
            ..DecoderConfig::default()
        })
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            buf: vec![0u8; config.capacity].into_boxed_slice(),
            len: 0,
            state: DecodeState::AwaitingStart,
            escape_policy: config.escape_policy,
            stats: DecoderStats::default(),
        }
    }

    /// Run one byte through the state machine.
    pub fn push(&mut self, byte: u8) -> Option<DecodeEvent<'_>> {
        match self.state {
            DecodeState::AwaitingStart => {
                if byte == FRAME_DELIM {
                    self.state = DecodeState::InFrame;
                } else {
                    self.stats.noise_bytes += 1;
                }
                None
            }
            DecodeState::InFrame => match byte {
                // Redundant delimiter between frames.
                FRAME_DELIM if self.len == 0 => None,
                FRAME_DELIM => {
                    let len = std::mem::take(&mut self.len);
                    self.state = DecodeState::AwaitingStart;
                    self.stats.frames += 1;
                    trace!(len, "frame complete");
                    Some(DecodeEvent::Frame(&self.buf[..len]))
                }
                ESCAPE => {
                    self.state = DecodeState::Escaped;
                    None
                }
                _ => self.append(byte),
            },
            DecodeState::Escaped => {
                self.state = DecodeState::InFrame;
                match byte {
                    ESC_DELIM => self.append(FRAME_DELIM),
                    ESC_ESCAPE => self.append(ESCAPE),
                    other => self.invalid_escape(other),
                }
            }
        }
    }

    /// Run a whole chunk through the state machine, reporting every event.
    ///
    /// Returns the number of events reported.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_event: F) -> usize
    where
        F: FnMut(DecodeEvent<'_>),
    {
        let mut events = 0;
        for &byte in chunk {
            if let Some(event) = self.push(byte) {
                events += 1;
                on_event(event);
            }
        }
        events
    }

    /// Decode a chunk into owned events.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        let mut out = Vec::new();
        self.feed(chunk, |event| out.push(event.into_owned()));
        out
    }

    /// Drop any partially assembled frame and wait for the next delimiter.
    pub fn reset(&mut self) {
        self.len = 0;
        self.state = DecodeState::AwaitingStart;
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Bytes of the in-progress frame.
    pub fn buffered(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn escape_policy(&self) -> EscapePolicy {
        self.escape_policy
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn append(&mut self, byte: u8) -> Option<DecodeEvent<'static>> {
        if self.len == self.buf.len() {
            let capacity = self.buf.len();
            self.reset();
            self.stats.overflows += 1;
            debug!(capacity, "receive buffer overflow; frame discarded");
            return Some(DecodeEvent::Overflow { capacity });
        }
        self.buf[self.len] = byte;
        self.len += 1;
        None
    }

    fn invalid_escape(&mut self, byte: u8) -> Option<DecodeEvent<'static>> {
        self.stats.protocol_violations += 1;
        debug!(byte, policy = ?self.escape_policy, "invalid escape sequence");
        match self.escape_policy {
            EscapePolicy::Skip => None,
            EscapePolicy::PassThrough => self.append(byte),
            EscapePolicy::DiscardFrame => {
                self.reset();
                None
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::with_config(DecoderConfig::default())
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("capacity", &self.buf.len())
            .field("buffered", &self.len)
            .field("state", &self.state)
            .field("escape_policy", &self.escape_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf);
        }
        buf.to_vec()
    }

    fn frames_of(events: &[FrameEvent]) -> Vec<Vec<u8>> {
        events
            .iter()
            .filter_map(|e| e.frame().map(|f| f.to_vec()))
            .collect()
    }

    #[test]
    fn roundtrip_including_reserved_bytes() {
        let payloads: Vec<Vec<u8>> = vec![
            b"hello".to_vec(),
            vec![0xC0],
            vec![0xDB],
            vec![0xDB, 0xDC, 0xC0, 0xDD, 0xDB],
            (0u8..=255).collect(),
        ];
        for payload in payloads {
            let mut decoder = Decoder::new(1024);
            let events = decoder.decode(&wire(&[&payload]));
            assert_eq!(events, vec![FrameEvent::Frame(Bytes::from(payload))]);
        }
    }

    #[test]
    fn empty_frame_is_never_delivered() {
        let mut decoder = Decoder::new(16);
        assert!(decoder.decode(&wire(&[b""])).is_empty());
        assert!(decoder.decode(&[0xC0, 0xC0, 0xC0, 0xC0]).is_empty());
        assert_eq!(decoder.stats().frames, 0);
    }

    #[test]
    fn back_to_back_frames_yield_exactly_two() {
        let mut decoder = Decoder::new(64);
        let events = decoder.decode(&wire(&[b"first", b"second"]));
        assert_eq!(
            frames_of(&events),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn redundant_delimiters_are_absorbed() {
        let mut decoder = Decoder::new(64);
        let events = decoder.decode(b"\xC0\xC0\xC0abc\xC0\xC0\xC0\xC0def\xC0");
        assert_eq!(frames_of(&events), vec![b"abc".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let stream = wire(&[b"one", &[0xC0, 0xDB, 0x01], b"three"]);
        let mut whole = Decoder::new(64);
        let expected = whole.decode(&stream);
        assert_eq!(expected.len(), 3);

        for split in 0..=stream.len() {
            let mut decoder = Decoder::new(64);
            let mut events = decoder.decode(&stream[..split]);
            events.extend(decoder.decode(&stream[split..]));
            assert_eq!(events, expected, "split at {split}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole_stream() {
        let stream = wire(&[&[0xDB; 5], &[0xC0; 5]]);
        let mut decoder = Decoder::new(64);
        let mut events = Vec::new();
        for byte in &stream {
            events.extend(decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(frames_of(&events), vec![vec![0xDB; 5], vec![0xC0; 5]]);
    }

    #[test]
    fn exactly_capacity_fits() {
        let mut decoder = Decoder::new(4);
        let events = decoder.decode(&wire(&[b"abcd"]));
        assert_eq!(frames_of(&events), vec![b"abcd".to_vec()]);
    }

    #[test]
    fn overflow_discards_frame_then_recovers() {
        let mut decoder = Decoder::new(4);
        let events = decoder.decode(&wire(&[b"abcde", b"ok"]));
        assert_eq!(
            events,
            vec![
                FrameEvent::Overflow { capacity: 4 },
                FrameEvent::Frame(Bytes::from_static(b"ok")),
            ]
        );
        let stats = decoder.stats();
        assert_eq!((stats.frames, stats.overflows), (1, 1));
    }

    #[test]
    fn overflow_on_escaped_byte() {
        let mut decoder = Decoder::new(2);
        let events = decoder.decode(&wire(&[&[0x01, 0x02, 0xC0], b"z"]));
        assert_eq!(
            events,
            vec![
                FrameEvent::Overflow { capacity: 2 },
                FrameEvent::Frame(Bytes::from_static(b"z")),
            ]
        );
    }

    #[test]
    fn overflow_mid_chunk_keeps_processing_rest_of_chunk() {
        let mut decoder = Decoder::new(3);
        let mut stream = wire(&[b"aa"]);
        stream.extend(wire(&[b"toolong"]));
        stream.extend(wire(&[b"bb"]));

        let events = decoder.decode(&stream);
        assert_eq!(
            events,
            vec![
                FrameEvent::Frame(Bytes::from_static(b"aa")),
                FrameEvent::Overflow { capacity: 3 },
                FrameEvent::Frame(Bytes::from_static(b"bb")),
            ]
        );
    }

    #[test]
    fn leading_noise_is_discarded() {
        let mut decoder = Decoder::new(32);
        let mut stream = b"line noise \x00\xFF".to_vec();
        stream.extend(wire(&[b"data"]));

        let events = decoder.decode(&stream);
        assert_eq!(frames_of(&events), vec![b"data".to_vec()]);
        assert_eq!(decoder.stats().noise_bytes, 13);
    }

    #[test]
    fn escape_byte_is_never_stored() {
        let mut decoder = Decoder::new(8);
        decoder.decode(&[0xC0, 0x01, 0xDB]);
        assert_eq!(decoder.buffered(), 1);
        assert_eq!(decoder.state(), DecodeState::Escaped);
    }

    #[test]
    fn invalid_escape_skip_policy_drops_byte() {
        let mut decoder = Decoder::new(8);
        let events = decoder.decode(&[0xC0, 0x01, 0xDB, 0x41, 0x02, 0xC0]);
        assert_eq!(frames_of(&events), vec![vec![0x01, 0x02]]);
        assert_eq!(decoder.stats().protocol_violations, 1);
    }

    #[test]
    fn invalid_escape_pass_through_policy_keeps_byte() {
        let mut decoder = Decoder::with_config(DecoderConfig {
            capacity: 8,
            escape_policy: EscapePolicy::PassThrough,
        });
        let events = decoder.decode(&[0xC0, 0x01, 0xDB, 0x41, 0x02, 0xC0]);
        assert_eq!(frames_of(&events), vec![vec![0x01, 0x41, 0x02]]);
    }

    #[test]
    fn invalid_escape_discard_policy_drops_frame() {
        let mut decoder = Decoder::with_config(DecoderConfig {
            capacity: 8,
            escape_policy: EscapePolicy::DiscardFrame,
        });
        let mut stream = vec![0xC0, 0x01, 0xDB, 0x41, 0x02, 0xC0];
        stream.extend(wire(&[b"next"]));

        let events = decoder.decode(&stream);
        assert_eq!(frames_of(&events), vec![b"next".to_vec()]);
        assert_eq!(decoder.stats().protocol_violations, 1);
    }

    #[test]
    fn buffer_is_reused_across_frames() {
        let mut decoder = Decoder::new(8);
        let first = decoder.buf.as_ptr();
        decoder.decode(&wire(&[b"abc", b"defgh", b"i"]));
        assert_eq!(decoder.buf.as_ptr(), first);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.state(), DecodeState::AwaitingStart);
    }

    #[test]
    fn feed_reports_borrowed_frames() {
        let mut decoder = Decoder::new(16);
        let mut seen = Vec::new();
        let count = decoder.feed(&wire(&[b"x", b"yz"]), |event| {
            if let DecodeEvent::Frame(frame) = event {
                seen.push(frame.to_vec());
            }
        });
        assert_eq!(count, 2);
        assert_eq!(seen, vec![b"x".to_vec(), b"yz".to_vec()]);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut decoder = Decoder::new(16);
        decoder.decode(&[0xC0, b'p', b'a', b'r']);
        decoder.reset();
        assert_eq!(decoder.buffered(), 0);

        let events = decoder.decode(b"tial\xC0\xC0ok\xC0");
        assert_eq!(frames_of(&events), vec![b"ok".to_vec()]);
    }
}
