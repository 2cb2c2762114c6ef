use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected duplex byte stream carrying KISS traffic.
///
/// This is the fundamental I/O type handed to the KISS codec loops. A TCP
/// connection to a KISS server (or from a relay client) is the usual case;
/// on Unix a socket pair is also available for in-process links.
pub struct KissStream {
    inner: KissStreamInner,
}

enum KissStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

/// Timeouts applied to a stream before it is handed to codec loops.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Read timeout for blocking reads. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking writes. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
}

impl Read for KissStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            KissStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for KissStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            KissStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            KissStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for KissStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: KissStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for KissStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: KissStreamInner::Unix(stream),
        }
    }
}

impl KissStream {
    /// Create a connected pair of in-process streams.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((left.into(), right.into()))
    }

    /// Apply read and write timeouts from `config`.
    pub fn apply(&self, config: &StreamConfig) -> Result<()> {
        self.set_read_timeout(config.read_timeout)?;
        self.set_write_timeout(config.write_timeout)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            KissStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            KissStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Switch the stream between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            KissStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => {
                stream.set_nonblocking(nonblocking).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The decoder and encoder halves of a link each own one handle.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            KissStreamInner::Tcp(stream) => Ok(stream.try_clone()?.into()),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => Ok(stream.try_clone()?.into()),
        }
    }

    /// Shut down both directions of the stream.
    ///
    /// Blocked reads on any clone of this stream return end-of-stream.
    /// Shutting down an already disconnected stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            KissStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            KissStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Human-readable remote endpoint, e.g. `127.0.0.1:50412`.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            KissStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            #[cfg(unix)]
            KissStreamInner::Unix(_) => "unix-pair".to_string(),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            KissStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            KissStreamInner::Unix(_) => "unix",
        }
    }
}

impl std::fmt::Debug for KissStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KissStream")
            .field("type", &self.transport_name())
            .field("peer", &self.peer_label())
            .finish()
    }
}
