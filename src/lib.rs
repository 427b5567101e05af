//! # libmqtt - MQTT 3.1.1 client for constrained devices
//!
//! A client-side implementation of MQTT 3.1.1 that keeps one long-lived
//! session with a broker: it performs the connection handshake, frames and
//! parses binary packets, tracks subscriptions, issues keep-alive pings and
//! transparently recovers from transport failures. Memory use is fixed:
//! packet buffers and the subscription registry are sized at compile time and
//! there is no dynamic packet queue.
//!
//! ## Features
//!
//! - Allocation-free packet codec usable in `no_std`
//! - QoS 0 and QoS 1 publish, single-filter subscribe
//! - Keep-alive with PINGREQ at half the interval and dead-link detection
//! - Automatic reconnection with replay of every subscription, in order
//! - Pluggable transport, TLS layer and execution environment, chosen per
//!   client instance
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libmqtt = "0.1.0"
//! ```
//!
//! ### Publishing and subscribing
//!
//! ```rust,no_run
//! use libmqtt::{Client, Options, QoS};
//! use libmqtt::network::tcp::TcpConnector;
//! use libmqtt::os::StdPlatform;
//!
//! let options = Options::new("broker.emqx.io", 1883, "sensor_device_01").unwrap();
//! let client = Client::new(
//!     TcpConnector::new(),
//!     StdPlatform::new(),
//!     options,
//!     |topic: &str, payload: &[u8]| println!("{} -> {:?}", topic, payload),
//! )
//! .unwrap();
//!
//! client.connect().unwrap();
//! client.subscribe("commands/+", QoS::AtLeastOnce).unwrap();
//! client.publish("sensors/temperature", b"23.5", QoS::AtMostOnce).unwrap();
//! ```
//!
//! ### Bring your own transport
//!
//! Anything that implements [`network::Connect`] can carry the session: an
//! lwIP socket, a modem AT driver, or a
//! [`TlsConnector`](network::tls::TlsConnector) wrapping another connector.
//! The background task and the clock come from an [`os::Platform`].
//!
//! ## Platform Support
//!
//! The codec, subscription registry, keep-alive timers and the
//! [`Session`](network::application::mqtt::Session) are `no_std`. The
//! threaded [`Client`], the TCP transport and [`os::StdPlatform`] need `std`.
//!
//! ## Optional Features
//!
//! - `std`: threaded client, TCP transport and thread-backed platform
//!   (default: enabled)
//! - `defmt`: `defmt::Format` implementations for the error and state types

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/libmqtt/")]

/// Transport abstraction and the MQTT protocol implementation.
///
/// Holds the connection traits every transport implements, a TCP transport,
/// the TLS adapter, and the application-layer MQTT client.
pub mod network;

/// Execution environment abstraction: task spawning, clock and sleep.
pub mod os;

#[cfg(feature = "std")]
pub use network::application::mqtt::{Client, MessageHandler};
pub use network::application::mqtt::{
    ConnectReturnCode, Error, Options, QoS, ReconnectPolicy, State,
};
