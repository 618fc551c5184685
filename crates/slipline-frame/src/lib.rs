//! SLIP-style framing over an ordered byte channel.
//!
//! Frames are delimited, not length-prefixed:
//! - `0xC0` marks the start and end of every frame
//! - `0xDB` escapes a reserved byte inside the payload
//!   (`0xDB 0xDC` for a literal `0xC0`, `0xDB 0xDD` for a literal `0xDB`)
//!
//! The write path ([`FrameWriter`]) hands each maximal run of plain bytes to
//! the transport in one write and respects transport backpressure. The read
//! path ([`Decoder`], [`FrameReader`]) is a byte-at-a-time state machine over
//! a fixed-capacity buffer, so frames come out the same no matter how the
//! transport chunks its input.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    encode_frame, encoded_len, is_reserved, FrameConfig, Segments, DEFAULT_MAX_PAYLOAD,
    DEFAULT_RX_CAPACITY, ESCAPE, ESC_DELIM, ESC_ESCAPE, FRAME_DELIM,
};
pub use decoder::{
    DecodeEvent, DecodeState, Decoder, DecoderConfig, DecoderStats, EscapePolicy, FrameEvent,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::{FrameWriter, WriteProgress, WriteState, WriterStats};

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
