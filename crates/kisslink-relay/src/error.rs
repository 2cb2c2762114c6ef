use kisslink_kiss::LoopError;

/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kisslink_transport::TransportError),

    /// KISS codec error.
    #[error("kiss error: {0}")]
    Kiss(#[from] kisslink_kiss::KissError),

    /// A relay loop panicked.
    #[error("relay loop panicked: {0}")]
    Panicked(String),

    /// A relay loop ended without being stopped.
    #[error("{0} loop exited unexpectedly")]
    LoopExited(&'static str),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.into())
    }
}

impl LoopError for RelayError {
    fn from_panic(message: String) -> Self {
        Self::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
