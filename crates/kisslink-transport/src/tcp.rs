use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::KissStream;

/// TCP transport for KISS-over-TCP links.
///
/// Provides bind/accept/connect in the style of a KISS TCP server such as
/// a software TNC. No authentication or encryption is applied.
pub struct TcpKissListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpKissListener {
    /// Bind and listen on `addr`.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: label.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: label,
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking unless non-blocking mode is set).
    pub fn accept(&self) -> Result<KissStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok(stream.into())
    }

    /// Accept a pending connection without blocking.
    ///
    /// Returns `Ok(None)` when no client is waiting. The listener must be in
    /// non-blocking mode; the returned stream is always in blocking mode.
    pub fn try_accept(&self) -> Result<Option<KissStream>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                debug!(%addr, "accepted connection");
                Ok(Some(stream.into()))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Switch the listener between blocking and non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// Connect to a listening KISS TCP endpoint (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<KissStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        // Frames are small; send them immediately.
        stream.set_nodelay(true)?;
        debug!(?addr, "connected to tcp endpoint");
        Ok(stream.into())
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpKissListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let handle = std::thread::spawn(move || {
            let mut client = TcpKissListener::connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(server.peer_label().starts_with("127.0.0.1:"));

        handle.join().unwrap();
    }

    #[test]
    fn test_try_accept_without_client_returns_none() {
        let listener = TcpKissListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        assert!(listener.try_accept().unwrap().is_none());
    }

    #[test]
    fn test_try_accept_returns_blocking_stream() {
        let listener = TcpKissListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr();

        let mut client = TcpKissListener::connect(addr).unwrap();
        client.write_all(b"x").unwrap();

        let mut accepted = None;
        for _ in 0..200 {
            if let Some(stream) = listener.try_accept().unwrap() {
                accepted = Some(stream);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let mut server = accepted.expect("client should be accepted");
        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpKissListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        drop(listener);

        let result = TcpKissListener::connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_in_use() {
        let listener = TcpKissListener::bind("127.0.0.1:0").unwrap();
        let result = TcpKissListener::bind(listener.local_addr());
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
