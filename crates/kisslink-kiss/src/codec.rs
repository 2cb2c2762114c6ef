use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::KissFrame;

/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape introducer.
pub const FESC: u8 = 0xDB;
/// Escaped substitute for FEND.
pub const TFEND: u8 = 0xDC;
/// Escaped substitute for FESC.
pub const TFESC: u8 = 0xDD;

/// Default number of bytes requested per blocking read.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Default interval at which idle loops re-check their stop signal.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Escape `data` into `dst`.
///
/// `FEND` becomes `FESC TFEND`, `FESC` becomes `FESC TFESC`; every other byte
/// passes through.
pub fn escape_into(data: &[u8], dst: &mut BytesMut) {
    dst.reserve(data.len());
    for &byte in data {
        match byte {
            FEND => dst.put_slice(&[FESC, TFEND]),
            FESC => dst.put_slice(&[FESC, TFESC]),
            _ => dst.put_u8(byte),
        }
    }
}

/// Escape `data` into a new buffer.
pub fn escape(data: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(data.len());
    escape_into(data, &mut dst);
    dst.freeze()
}

/// Reverse [`escape`] on a frame body with the delimiters already stripped.
///
/// Applies the same recovery rules as [`Unstuffer`]: an escape followed by
/// anything other than `TFEND`/`TFESC` is kept as a literal `FESC`, and so is a
/// trailing unterminated escape.
pub fn unescape(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len());
    let mut escaped = false;

    for &byte in data {
        match (escaped, byte) {
            (true, TFEND) => {
                out.put_u8(FEND);
                escaped = false;
            }
            (true, TFESC) => {
                out.put_u8(FESC);
                escaped = false;
            }
            (true, FESC) => out.put_u8(FESC),
            (true, other) => {
                out.put_slice(&[FESC, other]);
                escaped = false;
            }
            (false, FESC) => escaped = true,
            (false, other) => out.put_u8(other),
        }
    }

    if escaped {
        out.put_u8(FESC);
    }
    out.freeze()
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────┬──────────────────┬──────┐
/// │ FEND │ escape(type byte)    │ escape(data)     │ FEND │
/// │ 0xC0 │ (1-2B)               │ (variable)       │ 0xC0 │
/// └──────┴──────────────────────┴──────────────────┴──────┘
/// ```
pub fn encode_frame(frame: &KissFrame, dst: &mut BytesMut) {
    dst.reserve(frame.data().len() + 3);
    dst.put_u8(FEND);
    // The type byte is escaped like data; 0xC0 and 0xDB are valid port/command pairs.
    escape_into(&[frame.type_byte()], dst);
    escape_into(frame.data(), dst);
    dst.put_u8(FEND);
}

/// Encode a frame into a new buffer.
pub fn encode_frame_to_bytes(frame: &KissFrame) -> Bytes {
    let mut dst = BytesMut::with_capacity(frame.data().len() + 4);
    encode_frame(frame, &mut dst);
    dst.freeze()
}

/// Streaming KISS decode state machine.
///
/// Fed one byte at a time, it yields the unescaped body (type byte + data) of
/// each completed frame. It never fails: malformed escapes degrade to literal
/// `FESC` bytes and anything outside a frame is discarded.
#[derive(Debug, Default)]
pub struct Unstuffer {
    buffer: Option<BytesMut>,
    escaped: bool,
}

impl Unstuffer {
    /// Create a decoder positioned outside any frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a frame is open.
    pub fn in_frame(&self) -> bool {
        self.buffer.is_some()
    }

    /// Process one byte, returning a completed frame body if this byte closed one.
    pub fn push(&mut self, byte: u8) -> Option<Bytes> {
        match byte {
            FEND => {
                self.heal_escape();

                let Some(buffer) = self.buffer.as_mut() else {
                    self.buffer = Some(BytesMut::new());
                    return None;
                };

                if buffer.is_empty() {
                    // Repeated FENDs collapse; still at the start of a frame.
                    return None;
                }

                self.buffer.take().map(BytesMut::freeze)
            }
            FESC => {
                if self.buffer.is_none() {
                    return None;
                }
                self.heal_escape();
                self.escaped = true;
                None
            }
            TFEND | TFESC => {
                let buffer = self.buffer.as_mut()?;
                if self.escaped {
                    self.escaped = false;
                    buffer.put_u8(if byte == TFEND { FEND } else { FESC });
                } else {
                    buffer.put_u8(byte);
                }
                None
            }
            _ => {
                if self.buffer.is_none() {
                    return None;
                }
                self.heal_escape();
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.put_u8(byte);
                }
                None
            }
        }
    }

    /// Process a slice, returning every frame body it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Bytes> {
        bytes.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    /// A pending escape not followed by TFEND/TFESC is taken as a literal FESC.
    fn heal_escape(&mut self) {
        if !self.escaped {
            return;
        }
        self.escaped = false;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.put_u8(FESC);
        }
    }
}

/// Configuration for the background codec loops.
#[derive(Debug, Clone)]
pub struct KissConfig {
    /// Maximum bytes requested per blocking read. Default: 1024.
    pub read_chunk_size: usize,
    /// How long an idle loop waits before re-checking its stop signal.
    /// Default: 50 ms.
    pub poll_interval: Duration,
}

impl Default for KissConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DATA;

    fn decode_all(bytes: &[u8]) -> Vec<Bytes> {
        Unstuffer::new().feed(bytes)
    }

    #[test]
    fn test_escape_unescape_roundtrip() {
        let plain: Vec<u8> = (0u8..=255).filter(|b| *b != FEND && *b != FESC).collect();
        assert_eq!(escape(&plain).as_ref(), plain.as_slice());
        assert_eq!(unescape(&escape(&plain)).as_ref(), plain.as_slice());

        let special = [FEND, 0x01, FESC, FESC, TFEND, FEND, TFESC, 0xFF];
        assert_eq!(unescape(&escape(&special)).as_ref(), &special);
    }

    #[test]
    fn test_escape_special_bytes() {
        assert_eq!(escape(&[FEND]).as_ref(), &[FESC, TFEND]);
        assert_eq!(escape(&[FESC]).as_ref(), &[FESC, TFESC]);
        assert_eq!(escape(&[TFEND, TFESC]).as_ref(), &[TFEND, TFESC]);
    }

    #[test]
    fn test_unescape_heals_bad_escape() {
        assert_eq!(unescape(&[FESC, 0x41]).as_ref(), &[FESC, 0x41]);
        assert_eq!(unescape(&[0x41, FESC]).as_ref(), &[0x41, FESC]);
        assert_eq!(unescape(&[FESC, FESC, TFEND]).as_ref(), &[FESC, FEND]);
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = KissFrame::new(1, DATA, vec![0x41, FEND, 0x42]);
        let wire = encode_frame_to_bytes(&frame);
        assert_eq!(
            wire.as_ref(),
            &[FEND, 0x10, 0x41, FESC, TFEND, 0x42, FEND]
        );
    }

    #[test]
    fn test_encode_escapes_type_byte() {
        let frame = KissFrame::new(0xC, 0x0, Bytes::new());
        let wire = encode_frame_to_bytes(&frame);
        assert_eq!(wire.as_ref(), &[FEND, FESC, TFEND, FEND]);

        let raw = decode_all(&wire);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].as_ref(), &[0xC0]);

        let frame = KissFrame::new(0xD, 0xB, vec![0x78]);
        let wire = encode_frame_to_bytes(&frame);
        assert_eq!(wire.as_ref(), &[FEND, FESC, TFESC, 0x78, FEND]);
        assert_eq!(decode_all(&wire)[0].as_ref(), &[0xDB, 0x78]);
    }

    #[test]
    fn test_simple_frame() {
        let raw = decode_all(&[FEND, 0x00, 0x41, 0x42, FEND]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].as_ref(), &[0x00, 0x41, 0x42]);
    }

    #[test]
    fn test_escaped_delimiter_recovered() {
        let raw = decode_all(&[FEND, 0x00, FESC, TFEND, FEND]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].as_ref(), &[0x00, FEND]);
    }

    #[test]
    fn test_escaped_escape_recovered() {
        let raw = decode_all(&[FEND, 0x00, FESC, TFESC, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, FESC]);
    }

    #[test]
    fn test_empty_frame_discarded() {
        assert!(decode_all(&[FEND, FEND]).is_empty());
        assert!(decode_all(&[FEND, FEND, FEND, FEND]).is_empty());
    }

    #[test]
    fn test_bytes_before_first_fend_discarded() {
        let raw = decode_all(&[0x41, FESC, TFEND, 0x42, FEND, 0x00, 0x43, FEND]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].as_ref(), &[0x00, 0x43]);
    }

    #[test]
    fn test_repeated_fends_collapse() {
        let raw = decode_all(&[FEND, FEND, FEND, 0x00, 0x01, FEND]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].as_ref(), &[0x00, 0x01]);
    }

    #[test]
    fn test_back_to_back_encoded_frames() {
        let mut wire = BytesMut::new();
        encode_frame(&KissFrame::new(0, DATA, &b"one"[..]), &mut wire);
        encode_frame(&KissFrame::new(0, DATA, &b"two"[..]), &mut wire);

        let raw = decode_all(&wire);
        assert_eq!(raw.len(), 2);
        assert_eq!(&raw[0][1..], b"one");
        assert_eq!(&raw[1][1..], b"two");
    }

    #[test]
    fn test_unterminated_escape_before_fend_is_literal() {
        let raw = decode_all(&[FEND, 0x00, 0x41, FESC, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, 0x41, FESC]);
    }

    #[test]
    fn test_double_escape_keeps_first_as_literal() {
        let raw = decode_all(&[FEND, 0x00, FESC, FESC, TFEND, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, FESC, FEND]);
    }

    #[test]
    fn test_escape_then_plain_byte_is_literal() {
        let raw = decode_all(&[FEND, 0x00, FESC, 0x41, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, FESC, 0x41]);
    }

    #[test]
    fn test_unescaped_transpose_bytes_pass_through() {
        let raw = decode_all(&[FEND, 0x00, TFEND, TFESC, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, TFEND, TFESC]);
    }

    #[test]
    fn test_partial_frame_across_feeds() {
        let mut unstuffer = Unstuffer::new();
        assert!(unstuffer.feed(&[FEND, 0x00, 0x41, FESC]).is_empty());
        assert!(unstuffer.in_frame());

        let raw = unstuffer.feed(&[TFESC, FEND]);
        assert_eq!(raw[0].as_ref(), &[0x00, 0x41, FESC]);
        assert!(!unstuffer.in_frame());
    }

    #[test]
    fn test_default_config() {
        let config = KissConfig::default();
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
