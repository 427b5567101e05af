//! # Application Layer Network Protocols
//!
//! Protocols built on the transport traits in [`network`](crate::network).
//! They work with any type implementing
//! [`Connection`](crate::network::Connection), use fixed-size buffers, and
//! report failures through their own error enums.

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// with automatic keep-alive and reconnection.
pub mod mqtt;
