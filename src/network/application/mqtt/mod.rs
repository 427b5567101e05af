//! MQTT 3.1.1 client for constrained devices.
//!
//! The client keeps a single long-lived session with a broker: it performs
//! the CONNECT/CONNACK handshake, frames and parses packets, tracks
//! subscriptions, sends keep-alive pings and reconnects transparently after
//! transport failures, restoring its subscriptions.
//!
//! # Layers
//!
//! - [`codec`]: allocation-free packet encoding and decoding.
//! - [`subscriptions`]: the fixed-capacity registry replayed on reconnect.
//! - [`keep_alive`]: the ping timer state machine.
//! - [`connection`]: the [`Session`], which owns the transport and performs
//!   handshake, teardown and reconnection. `no_std`.
//! - [`Client`] (feature `std`): the thread-safe facade plus a background
//!   engine that services keep-alive, receives frames and reconnects.
//!
//! # Scope
//!
//! QoS 0 and QoS 1 publishing, single-filter subscriptions, inbound QoS 0
//! and QoS 1 delivery (QoS 1 is acknowledged with PUBACK). QoS 2, MQTT 5,
//! persistent session storage and outbound message queuing are not
//! implemented.
//!
//! # Limits
//!
//! | Resource | Limit |
//! |----------|-------|
//! | Outbound frame | [`MAX_PACKET_SIZE`] bytes |
//! | Inbound frame | `RECV_BUF_SIZE` (1024) bytes |
//! | Tracked subscriptions | [`MAX_SUBSCRIPTIONS`] |
//! | Topic filter | [`MAX_TOPIC_LEN`] bytes |

pub mod codec;
pub mod connection;
pub mod error;
pub mod keep_alive;
pub mod options;
pub mod subscriptions;

#[cfg(feature = "std")]
mod client;
#[cfg(feature = "std")]
mod engine;

#[cfg(feature = "std")]
pub use client::{Client, MessageHandler};
pub use codec::QoS;
pub use connection::{MAX_PACKET_SIZE, Session, State};
#[cfg(feature = "std")]
pub use engine::RECV_BUF_SIZE;
pub use error::{ConnectReturnCode, Error};
pub use options::{Options, ReconnectPolicy};
pub use subscriptions::{MAX_SUBSCRIPTIONS, MAX_TOPIC_LEN};
