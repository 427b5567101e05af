//! Blocking TCP transport built on `std::net::TcpStream`.
//!
//! Reads use the socket read timeout, so a read that times out reports
//! `Ok(0)` and an orderly shutdown by the peer reports
//! [`Error::ConnectionClosed`].

use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::error::Error;
use super::{Close, Connect, Connection, Read, Write};

/// Opens [`TcpConnection`]s, resolving host names with the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl TcpConnector {
    /// Create a new connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connect for TcpConnector {
    type Connection = TcpConnection;
    type Error = Error;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error> {
        let timeout = Duration::from_millis(timeout_ms.max(1) as u64);
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress)?;

        let mut last = Error::InvalidAddress;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(|_| Error::NotOpen)?;
                    return Ok(TcpConnection { stream });
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => last = Error::Timeout,
                Err(_) => last = Error::ConnectionRefused,
            }
        }
        Err(last)
    }
}

/// A connected TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        // A zero duration is rejected by set_read_timeout.
        let timeout = Duration::from_millis(timeout_ms.max(1) as u64);
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|_| Error::ReadError)?;
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(_) => Err(Error::ReadError),
        }
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream
            .write_all(buf)
            .map(|_| buf.len())
            .map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already torn down by the peer.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(_) => Err(Error::NotOpen),
        }
    }
}

impl Connection for TcpConnection {}
