//! A transport abstraction layer for embedded systems
//!
//! This module provides the small set of traits the MQTT engine needs from a
//! byte-stream transport: open a connection to a host, read with a bounded
//! timeout, write, and close. Any socket-like stack (BSD sockets, lwIP,
//! smoltcp, a modem AT driver, or an in-memory fake) can be plugged in by
//! implementing them.
//!
//! Transports are chosen per client instance: the connector is passed into
//! [`Client::new`](crate::network::application::mqtt::Client::new), so one
//! process can run several clients over different transports.
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application-layer protocols built on the transport traits
pub mod application;

/// Transport security layered over any connector
pub mod tls;

/// A blocking TCP transport over `std::net`
#[cfg(feature = "std")]
pub mod tcp;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read available data from the connection, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` when the timeout elapsed without data. A peer that
    /// closed the stream is an error, not `Ok(0)`.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `host:port`, giving up after `timeout_ms`
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error>;
}
