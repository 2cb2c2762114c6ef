/// Errors that can occur while encoding, decoding or running codec loops.
///
/// Malformed escape sequences on the wire are never an error: the decoder
/// recovers from them and keeps streaming.
#[derive(Debug, thiserror::Error)]
pub enum KissError {
    /// An I/O error occurred while reading or writing the byte stream.
    #[error("kiss I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream accepted no more bytes while a frame was being written.
    #[error("connection closed (incomplete frame written)")]
    ConnectionClosed,

    /// A frame with no type byte was supplied.
    #[error("frame is empty")]
    EmptyFrame,

    /// A background codec loop panicked.
    #[error("codec loop panicked: {0}")]
    Panicked(String),
}

impl crate::worker::LoopError for KissError {
    fn from_panic(message: String) -> Self {
        KissError::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, KissError>;
