//! `tokio_util::codec` adapter for use with `Framed`, `FramedRead`, and `FramedWrite`.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::{encode_frame, FrameConfig};
use crate::decoder::{Decoder, DecoderStats, FrameEvent};
use crate::error::FrameError;

/// SLIP codec for async streams.
///
/// Decoding runs the same state machine as [`Decoder`], so partial frames
/// stay in the codec between reads and the `BytesMut` read buffer is always
/// fully consumed.
#[derive(Debug)]
pub struct SlipCodec {
    decoder: Decoder,
    max_payload_size: usize,
}

impl SlipCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            decoder: Decoder::with_config(config.decoder_config()),
            max_payload_size: config.max_payload_size,
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }
}

impl Default for SlipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl tokio_util::codec::Decoder for SlipCodec {
    type Item = FrameEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>, FrameError> {
        for idx in 0..src.len() {
            if let Some(event) = self.decoder.push(src[idx]) {
                let event = event.into_owned();
                src.advance(idx + 1);
                return Ok(Some(event));
            }
        }
        src.clear();
        Ok(None)
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        <Self as Encoder<&[u8]>>::encode(self, item.as_ref(), dst)
    }
}

impl Encoder<&[u8]> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(item, dst);
        Ok(())
    }
}
