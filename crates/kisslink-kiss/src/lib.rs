//! KISS byte-stream framing for TNC links.
//!
//! A KISS frame on the wire is:
//! - `FEND` (0xC0) opening delimiter
//! - one type byte: port address in the high nibble, command in the low nibble
//! - escaped payload (`FEND` -> `FESC TFEND`, `FESC` -> `FESC TFESC`)
//! - `FEND` closing delimiter
//!
//! [`KissDecoder`] and [`KissEncoder`] run the framing on background threads
//! over any blocking `Read`/`Write`. With the `async` feature, [`KissCodec`]
//! plugs the same framing into `tokio_util::codec`.

pub mod codec;
pub mod command;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod queue;
pub mod worker;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::KissCodec;
pub use codec::{
    encode_frame, encode_frame_to_bytes, escape, escape_into, unescape, KissConfig, Unstuffer,
    DEFAULT_POLL_INTERVAL, DEFAULT_READ_CHUNK, FEND, FESC, TFEND, TFESC,
};
pub use command::{
    command_name, is_data, DATA, FULL_DUPLEX, PERSISTENCE, RETURN, SET_HARDWARE, SLOT_TIME, TX_DELAY,
    TX_TAIL,
};
pub use decoder::{FrameObserver, KissDecoder, ObserverResult};
pub use encoder::KissEncoder;
pub use error::{KissError, Result};
pub use frame::KissFrame;
pub use queue::FrameQueue;
pub use worker::{LoopError, StopSignal, Worker};
