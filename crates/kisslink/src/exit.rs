use std::fmt;
use std::io;

use kisslink_ax25::Ax25Error;
use kisslink_kiss::KissError;
use kisslink_relay::RelayError;
use kisslink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn kiss_error(context: &str, err: &KissError) -> CliError {
    match err {
        KissError::Io(source) => io_error(context, source),
        KissError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        KissError::EmptyFrame => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn ax25_error(context: &str, err: &Ax25Error) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn relay_error(context: &str, err: &RelayError) -> CliError {
    match err {
        RelayError::Transport(err) => transport_error(context, err),
        RelayError::Kiss(err) => kiss_error(context, err),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_in_use_is_transport_error() {
        let err = TransportError::Bind {
            addr: "127.0.0.1:8105".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert_eq!(transport_error("bind failed", &err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn every_transport_error_maps_by_io_kind() {
        let refused = TransportError::Connect {
            addr: "127.0.0.1:8001".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(transport_error("connect failed", &refused).code, FAILURE);

        let denied = TransportError::Accept(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(transport_error("accept failed", &denied).code, PERMISSION_DENIED);

        let timed_out = TransportError::Io(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(transport_error("read failed", &timed_out).code, TIMEOUT);
    }

    #[test]
    fn coordinator_fault_is_failure() {
        let err = RelayError::LoopExited("coordinator");
        let cli = relay_error("relay failed", &err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.contains("coordinator"));
    }

    #[test]
    fn ax25_errors_are_data_invalid() {
        let err = Ax25Error::NotImplemented("extended");
        assert_eq!(ax25_error("decode failed", &err).code, DATA_INVALID);
    }
}
