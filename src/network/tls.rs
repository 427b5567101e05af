//! Transport security layered over any [`Connect`] implementation.
//!
//! The TLS stack itself (mbedTLS, rustls, embedded-tls, a secure element...)
//! is supplied by the application through the [`Handshake`] trait. The
//! [`TlsConnector`] adapter opens a plain connection with the wrapped
//! connector, runs the handshake with the configured host as SNI name, and
//! hands the resulting encrypted session to the MQTT client as an ordinary
//! [`Connection`].
//!
//! ```rust,no_run
//! use libmqtt::network::tls::{Handshake, TlsConfig, TlsConnector, VerifyMode};
//! # use libmqtt::network::{Connection, Read, Write, Close, Connect};
//! # struct Plain;
//! # impl Read for Plain { type Error = (); fn read(&mut self, _: &mut [u8], _: u32) -> Result<usize, ()> { Ok(0) } }
//! # impl Write for Plain { type Error = (); fn write(&mut self, b: &[u8]) -> Result<usize, ()> { Ok(b.len()) } fn flush(&mut self) -> Result<(), ()> { Ok(()) } }
//! # impl Close for Plain { type Error = (); fn close(self) -> Result<(), ()> { Ok(()) } }
//! # impl Connection for Plain {}
//! # struct Net;
//! # impl Connect for Net { type Connection = Plain; type Error = (); fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<Plain, ()> { Ok(Plain) } }
//! # struct Stack;
//! # impl Handshake<Plain> for Stack {
//! #     type Session = Plain; type Error = ();
//! #     fn handshake(&mut self, _: &TlsConfig<'_>, _: &str, t: Plain) -> Result<Plain, ()> { Ok(t) }
//! # }
//! static CA: &[u8] = b"-----BEGIN CERTIFICATE-----...";
//!
//! let config = TlsConfig {
//!     ca_cert: Some(CA),
//!     verify_mode: VerifyMode::Required,
//!     ..TlsConfig::default()
//! };
//! let connector = TlsConnector::new(Net, Stack, config);
//! ```

use super::error::Error;
use super::{Connect, Connection};

/// Peer certificate verification policy.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum VerifyMode {
    /// Do not verify the broker certificate.
    None,
    /// Verify when a certificate is presented, but continue on failure.
    Optional,
    /// Abort the handshake unless the broker certificate verifies.
    #[default]
    Required,
}

/// Credentials and policy handed to the [`Handshake`] implementation.
///
/// Certificates and keys are PEM or DER blobs, typically `include_bytes!`
/// statics on embedded targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TlsConfig<'a> {
    /// CA certificate chain used to verify the broker.
    pub ca_cert: Option<&'a [u8]>,
    /// Client certificate for mutual TLS.
    pub client_cert: Option<&'a [u8]>,
    /// Private key matching `client_cert`.
    pub client_key: Option<&'a [u8]>,
    /// Certificate verification policy.
    pub verify_mode: VerifyMode,
    /// Overrides the SNI name; the connect host is used when `None`.
    pub server_name: Option<&'a str>,
}

/// A TLS stack capable of securing an established transport.
pub trait Handshake<T: Connection> {
    /// The encrypted session; closing it closes the underlying transport.
    type Session: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Run the client handshake over `transport`.
    ///
    /// On failure the implementation owns `transport` and must close it.
    fn handshake(
        &mut self,
        config: &TlsConfig<'_>,
        hostname: &str,
        transport: T,
    ) -> Result<Self::Session, Self::Error>;
}

/// A connector that wraps every connection of `N` in a TLS session.
#[derive(Debug)]
pub struct TlsConnector<'a, N, H> {
    inner: N,
    handshake: H,
    config: TlsConfig<'a>,
}

impl<'a, N, H> TlsConnector<'a, N, H>
where
    N: Connect,
    H: Handshake<N::Connection>,
{
    /// Layer `handshake` over the plain connector `inner`.
    pub fn new(inner: N, handshake: H, config: TlsConfig<'a>) -> Self {
        Self {
            inner,
            handshake,
            config,
        }
    }

    /// The TLS configuration in use.
    pub fn config(&self) -> &TlsConfig<'a> {
        &self.config
    }
}

impl<'a, N, H> Connect for TlsConnector<'a, N, H>
where
    N: Connect,
    H: Handshake<N::Connection>,
{
    type Connection = H::Session;
    type Error = Error;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error> {
        let transport = self.inner.connect(host, port, timeout_ms).map_err(|e| {
            log::warn!("tls: transport connect to {}:{} failed: {:?}", host, port, e);
            Error::ConnectionRefused
        })?;

        let sni = self.config.server_name.unwrap_or(host);
        self.handshake
            .handshake(&self.config, sni, transport)
            .map_err(|e| {
                log::warn!("tls: handshake with {} failed: {:?}", sni, e);
                Error::HandshakeFailed
            })
    }
}
