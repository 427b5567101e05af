//! Connection lifecycle of one MQTT session.
//!
//! A [`Session`] owns everything the protocol needs between two frames: the
//! connector and the open transport, the packet identifier counter, the send
//! buffer, the subscription registry and the keep-alive timers. It performs
//! the CONNECT/CONNACK handshake, teardown, and reconnection with replay of
//! the registry.
//!
//! The session is `no_std` and single-threaded. The threaded
//! [`Client`](super::Client) wraps one in a mutex and drives it from a
//! background task; bare-metal users can drive it from their own loop.
//!
//! The connection state is not stored separately: the session is
//! [`State::Connected`] exactly when it holds a transport connection.

use core::fmt;

use super::codec::{self, Packet, PacketType, Publish, QoS};
use super::error::{ConnectReturnCode, Error};
use super::keep_alive::{KeepAlive, KeepAliveAction};
use super::options::Options;
use super::subscriptions::{MAX_TOPIC_LEN, Recorded, Subscriptions};
use crate::network::{Close, Connect, Read, Write};
use crate::os::{Platform, elapsed_ms};

/// Size of the outbound frame buffer.
pub const MAX_PACKET_SIZE: usize = 1024;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No transport is open.
    Disconnected,
    /// The handshake succeeded and the transport is open.
    Connected,
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        match self {
            State::Disconnected => defmt::write!(f, "Disconnected"),
            State::Connected => defmt::write!(f, "Connected"),
        }
    }
}

/// Protocol state of one broker session.
pub struct Session<N: Connect> {
    connector: N,
    options: Options,
    connection: Option<N::Connection>,
    link: u32,
    packet_id: u16,
    send_buf: [u8; MAX_PACKET_SIZE],
    subscriptions: Subscriptions,
    keep_alive: KeepAlive,
}

impl<N: Connect> fmt::Debug for Session<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.options.host)
            .field("state", &self.state())
            .field("link", &self.link)
            .field("packet_id", &self.packet_id)
            .field("subscriptions", &self.subscriptions.len())
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

impl<N: Connect> Session<N> {
    /// A disconnected session that will open transports through `connector`.
    pub fn new(connector: N, options: Options) -> Self {
        let keep_alive = KeepAlive::new(options.keep_alive_seconds);
        Self {
            connector,
            options,
            connection: None,
            link: 0,
            packet_id: 1,
            send_buf: [0; MAX_PACKET_SIZE],
            subscriptions: Subscriptions::new(),
            keep_alive,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        if self.connection.is_some() {
            State::Connected
        } else {
            State::Disconnected
        }
    }

    /// `true` while a transport is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Counts successful handshakes, so bytes read from one transport can be
    /// told apart from bytes read from the next.
    pub fn link_generation(&self) -> u32 {
        self.link
    }

    /// The options this session connects with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Subscriptions that will be replayed on reconnect.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Keep-alive timers of the current link.
    pub fn keep_alive(&self) -> &KeepAlive {
        &self.keep_alive
    }

    /// Allocate the next packet identifier; never returns 0.
    pub fn next_packet_id(&mut self) -> u16 {
        next_packet_id(&mut self.packet_id)
    }

    /// Open a transport and perform the CONNECT/CONNACK exchange.
    ///
    /// Any link already held is closed first. On failure the new transport is
    /// closed again and the session stays disconnected.
    pub fn handshake<P: Platform>(&mut self, platform: &P) -> Result<(), Error> {
        self.drop_link();

        let mut conn = self
            .connector
            .connect(
                &self.options.host,
                self.options.port,
                self.options.connect_timeout_ms,
            )
            .map_err(|e| {
                log::warn!(
                    "mqtt: connect to {}:{} failed: {:?}",
                    self.options.host,
                    self.options.port,
                    e
                );
                Error::ConnectFailed
            })?;

        match self.exchange_connect(&mut conn, platform) {
            Ok(session_present) => {
                self.connection = Some(conn);
                self.link = self.link.wrapping_add(1);
                self.keep_alive.reset(platform.now_ms());
                log::info!(
                    "mqtt: connected to {}:{} as {} (session present: {})",
                    self.options.host,
                    self.options.port,
                    self.options.client_id,
                    session_present
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("mqtt: handshake failed: {:?}", e);
                close_quietly(conn);
                Err(e)
            }
        }
    }

    /// Handshake, then resubscribe every registered filter in order.
    ///
    /// A failed resubscription aborts the attempt and leaves the session
    /// disconnected, so the whole attempt can be retried later.
    pub fn reconnect<P: Platform>(&mut self, platform: &P) -> Result<(), Error> {
        self.handshake(platform)?;
        if let Err(e) = self.replay_subscriptions() {
            log::warn!("mqtt: resubscribe failed: {:?}", e);
            self.drop_link();
            return Err(e);
        }
        self.keep_alive.reset(platform.now_ms());
        if !self.subscriptions.is_empty() {
            log::info!("mqtt: restored {} subscription(s)", self.subscriptions.len());
        }
        Ok(())
    }

    /// Publish `payload` to `topic`.
    ///
    /// The frame is written before this returns; QoS 1 publishes are not
    /// retransmitted. A transport failure drops the link.
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(Error::InvalidTopic);
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let packet_id = match qos {
            QoS::AtMostOnce => None,
            QoS::AtLeastOnce => Some(self.next_packet_id()),
        };
        let publish = Publish {
            topic,
            payload,
            qos,
            packet_id,
            retain: false,
            dup: false,
        };
        let len = codec::pack_publish(&mut self.send_buf, &publish)?;
        self.transmit(len)?;
        log::debug!("mqtt: published {} bytes to {}", payload.len(), topic);
        Ok(())
    }

    /// Send a SUBSCRIBE for `filter` and track it for replay.
    ///
    /// The filter is recorded only once the frame has been written.
    pub fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<Recorded, Error> {
        if filter.is_empty() {
            return Err(Error::InvalidTopic);
        }
        if filter.len() > MAX_TOPIC_LEN {
            return Err(Error::TopicTooLong);
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let packet_id = self.next_packet_id();
        let len = codec::pack_subscribe(&mut self.send_buf, filter, qos, packet_id)?;
        self.transmit(len)?;
        log::debug!("mqtt: subscribed to {} ({:?})", filter, qos);
        self.subscriptions.record(filter, qos)
    }

    /// Acknowledge an inbound QoS 1 publish.
    pub fn puback(&mut self, packet_id: u16) -> Result<(), Error> {
        let len = codec::pack_puback(&mut self.send_buf, packet_id)?;
        self.transmit(len)
    }

    /// Run the keep-alive state machine for time `now`.
    ///
    /// Sends a PINGREQ when one is due. An overdue PINGRESP drops the link
    /// and reports [`Error::Timeout`].
    pub fn service_keep_alive(&mut self, now: u32) -> Result<(), Error> {
        match self.keep_alive.poll(now) {
            None => Ok(()),
            Some(KeepAliveAction::SendPing) => {
                let len = codec::pack_pingreq(&mut self.send_buf)?;
                self.transmit(len)?;
                self.keep_alive.ping_sent(now);
                log::debug!("mqtt: PINGREQ sent");
                Ok(())
            }
            Some(KeepAliveAction::LinkDead) => {
                log::warn!("mqtt: no PINGRESP from broker, dropping link");
                self.drop_link();
                Err(Error::Timeout)
            }
        }
    }

    /// Record broker liveness after a PINGRESP.
    pub fn pong_received(&mut self, now: u32) {
        self.keep_alive.pong_received(now);
    }

    /// Read whatever the transport has, waiting at most `timeout_ms`.
    ///
    /// `Ok(0)` means the wait timed out. Errors leave the link in place; the
    /// caller decides whether to drop it.
    pub fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        let conn = self.connection.as_mut().ok_or(Error::NotConnected)?;
        conn.read(buf, timeout_ms).map_err(|e| {
            log::warn!("mqtt: receive failed: {:?}", e);
            Error::ReadError
        })
    }

    /// Send DISCONNECT if connected, then close the transport.
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Ok(len) = codec::pack_disconnect(&mut self.send_buf) {
            // Best effort; the link is closed either way.
            let _ = self.transmit(len);
        }
        self.drop_link();
        log::info!("mqtt: disconnected from {}", self.options.host);
    }

    /// Close the transport without telling the broker.
    pub fn drop_link(&mut self) {
        if let Some(conn) = self.connection.take() {
            close_quietly(conn);
        }
    }

    fn exchange_connect<P: Platform>(
        &mut self,
        conn: &mut N::Connection,
        platform: &P,
    ) -> Result<bool, Error> {
        let len = codec::pack_connect(&mut self.send_buf, &self.options.connect_packet())?;
        send_frame(conn, &self.send_buf[..len])?;

        let started = platform.now_ms();
        let timeout = self.options.connect_timeout_ms;
        let mut frame = [0u8; 4];
        read_exact(conn, &mut frame[..2], platform, started, timeout)?;
        if PacketType::from_header_byte(frame[0]) != Some(PacketType::ConnAck) || frame[1] != 2 {
            log::warn!(
                "mqtt: expected CONNACK, got header {:#04x} {:#04x}",
                frame[0],
                frame[1]
            );
            return Err(Error::ProtocolError);
        }
        read_exact(conn, &mut frame[2..], platform, started, timeout)?;

        match codec::decode(&frame)? {
            Packet::ConnAck {
                session_present,
                return_code: 0,
            } => Ok(session_present),
            Packet::ConnAck { return_code, .. } => Err(Error::ConnectionRefused(
                ConnectReturnCode::from_code(return_code),
            )),
            _ => Err(Error::ProtocolError),
        }
    }

    fn replay_subscriptions(&mut self) -> Result<(), Error> {
        let Self {
            connection,
            subscriptions,
            send_buf,
            packet_id,
            ..
        } = self;
        let conn = connection.as_mut().ok_or(Error::NotConnected)?;
        subscriptions.replay(|sub| {
            let id = next_packet_id(packet_id);
            let len = codec::pack_subscribe(&mut send_buf[..], &sub.filter, sub.qos, id)?;
            send_frame(conn, &send_buf[..len])
        })
    }

    /// Write `send_buf[..len]`; any failure drops the link.
    fn transmit(&mut self, len: usize) -> Result<(), Error> {
        let conn = self.connection.as_mut().ok_or(Error::NotConnected)?;
        let result = send_frame(conn, &self.send_buf[..len]);
        if result.is_err() {
            self.drop_link();
        }
        result
    }
}

fn next_packet_id(counter: &mut u16) -> u16 {
    let id = *counter;
    *counter = counter.wrapping_add(1).max(1);
    id
}

fn send_frame<C: Write>(conn: &mut C, frame: &[u8]) -> Result<(), Error> {
    let written = conn.write(frame).map_err(|e| {
        log::warn!("mqtt: write failed: {:?}", e);
        Error::WriteError
    })?;
    if written != frame.len() {
        log::warn!("mqtt: short write, {} of {} bytes", written, frame.len());
        return Err(Error::ShortWrite);
    }
    conn.flush().map_err(|e| {
        log::warn!("mqtt: flush failed: {:?}", e);
        Error::WriteError
    })
}

/// Fill `buf` completely before `timeout_ms` has passed since `started`.
fn read_exact<C: Read, P: Platform>(
    conn: &mut C,
    buf: &mut [u8],
    platform: &P,
    started: u32,
    timeout_ms: u32,
) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let waited = elapsed_ms(platform.now_ms(), started);
        if waited >= timeout_ms {
            return Err(Error::Timeout);
        }
        match conn.read(&mut buf[filled..], timeout_ms - waited) {
            Ok(0) => return Err(Error::Timeout),
            Ok(n) => filled += n,
            Err(e) => {
                log::warn!("mqtt: read failed: {:?}", e);
                return Err(Error::ReadError);
            }
        }
    }
    Ok(())
}

fn close_quietly<C: Close>(conn: C) {
    if let Err(e) = conn.close() {
        log::debug!("mqtt: close failed: {:?}", e);
    }
}
