//! `tokio_util::codec` adapter for KISS framing.
//!
//! Wrap any `AsyncRead + AsyncWrite` in `Framed::new(io, KissCodec::new())`
//! to get a `Stream<Item = Result<KissFrame>>` and a `Sink<KissFrame>`.

use std::time::SystemTime;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Unstuffer};
use crate::error::KissError;
use crate::frame::KissFrame;

/// Stateful KISS codec for async transports.
#[derive(Debug, Default)]
pub struct KissCodec {
    unstuffer: Unstuffer,
}

impl KissCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for KissCodec {
    type Item = KissFrame;
    type Error = KissError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(raw) = self.unstuffer.push(byte) {
                return KissFrame::from_raw(SystemTime::now(), raw).map(Some);
            }
        }
        Ok(None)
    }
}

impl Encoder<KissFrame> for KissCodec {
    type Error = KissError;

    fn encode(&mut self, item: KissFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

impl Encoder<&KissFrame> for KissCodec {
    type Error = KissError;

    fn encode(&mut self, item: &KissFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst);
        Ok(())
    }
}
