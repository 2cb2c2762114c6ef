//! Duplex byte-stream transports for KISS links.
//!
//! The codec layers above only need a readable/writable byte stream that can
//! be cloned into independent read and write halves and that reports the
//! peer-initiated close as end-of-stream. This crate provides that as
//! [`KissStream`], plus [`TcpKissListener`] for KISS-over-TCP endpoints.
//!
//! Serial port acquisition is left to the caller: any `Read`/`Write` pair can
//! be handed directly to the codec loops.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{KissStream, StreamConfig};
pub use tcp::TcpKissListener;
