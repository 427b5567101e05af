//! MQTT 3.1.1 packet codec.
//!
//! Pure, allocation-free functions that write frames into caller-supplied
//! buffers and parse frames out of received bytes. Nothing here touches a
//! transport or any shared state, so the same functions serve the foreground
//! client calls and the background engine.
//!
//! # Frame layout
//!
//! ```text
//! ┌──────────────┬──────────────────────┬─────────────────┬─────────┐
//! │ type | flags │ remaining length     │ variable header │ payload │
//! │   1 byte     │ 1-4 bytes, base 128  │                 │         │
//! └──────────────┴──────────────────────┴─────────────────┴─────────┘
//! ```
//!
//! Every packer bounds its writes by the buffer it is given and fails with
//! [`Error::BufferTooSmall`] instead of truncating. Every parser bounds its
//! reads by the remaining length it decoded, so truncated or lying frames
//! are reported as [`Error::MalformedPacket`] instead of reading past the
//! frame.
//!
//! # Examples
//!
//! ```rust
//! use libmqtt::network::application::mqtt::codec::{self, Packet, Publish};
//! use libmqtt::network::application::mqtt::QoS;
//!
//! let mut buf = [0u8; 64];
//! let publish = Publish {
//!     topic: "sensors/temperature",
//!     payload: b"23.5",
//!     qos: QoS::AtLeastOnce,
//!     packet_id: Some(7),
//!     retain: false,
//!     dup: false,
//! };
//! let len = codec::pack_publish(&mut buf, &publish).unwrap();
//!
//! match codec::decode(&buf[..len]).unwrap() {
//!     Packet::Publish(decoded) => assert_eq!(decoded, publish),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use super::error::Error;

/// Largest value the remaining-length field can carry (four bytes).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

// Protocol constants defined by MQTT 3.1.1 specification
const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// Quality of Service levels supported by this client.
///
/// ```rust
/// use libmqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(2).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: at most once, fire and forget.
    AtMostOnce = 0,
    /// **QoS 1**: at least once, acknowledged with PUBACK. Duplicates can occur.
    AtLeastOnce = 1,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            _ => Err(Error::InvalidQoS),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QoS {
    fn format(&self, f: defmt::Formatter) {
        match self {
            QoS::AtMostOnce => defmt::write!(f, "AtMostOnce"),
            QoS::AtLeastOnce => defmt::write!(f, "AtLeastOnce"),
        }
    }
}

/// MQTT control packet types (the high nibble of the first byte).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketType {
    /// Client request to connect.
    Connect = 1,
    /// Connect acknowledgment.
    ConnAck = 2,
    /// Publish message.
    Publish = 3,
    /// QoS 1 publish acknowledgment.
    PubAck = 4,
    /// QoS 2 publish received.
    PubRec = 5,
    /// QoS 2 publish release.
    PubRel = 6,
    /// QoS 2 publish complete.
    PubComp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgment.
    SubAck = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgment.
    UnsubAck = 11,
    /// Ping request.
    PingReq = 12,
    /// Ping response.
    PingResp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Decode the packet type from the first header byte.
    pub fn from_header_byte(byte: u8) -> Option<Self> {
        Some(match byte >> 4 {
            1 => Self::Connect,
            2 => Self::ConnAck,
            3 => Self::Publish,
            4 => Self::PubAck,
            5 => Self::PubRec,
            6 => Self::PubRel,
            7 => Self::PubComp,
            8 => Self::Subscribe,
            9 => Self::SubAck,
            10 => Self::Unsubscribe,
            11 => Self::UnsubAck,
            12 => Self::PingReq,
            13 => Self::PingResp,
            14 => Self::Disconnect,
            _ => return None,
        })
    }
}

/// Fields of a CONNECT packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Optional user name; sets the username flag.
    pub username: Option<&'a str>,
    /// Optional password; sets the password flag.
    pub password: Option<&'a str>,
    /// Keep-alive interval in seconds, 0 disables it.
    pub keep_alive: u16,
    /// Request that the broker discard prior session state.
    pub clean_session: bool,
}

/// A PUBLISH packet, outbound or borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Application payload.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Present if and only if `qos` is above [`QoS::AtMostOnce`].
    pub packet_id: Option<u16>,
    /// Retain flag.
    pub retain: bool,
    /// Duplicate delivery flag.
    pub dup: bool,
}

/// A decoded inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Connect acknowledgment.
    ConnAck {
        /// Broker resumed an existing session.
        session_present: bool,
        /// 0 on success, otherwise a refusal reason.
        return_code: u8,
    },
    /// Application message.
    Publish(Publish<'a>),
    /// QoS 1 publish acknowledgment.
    PubAck {
        /// Identifier of the acknowledged publish.
        packet_id: u16,
    },
    /// Subscribe acknowledgment for a single-filter SUBSCRIBE.
    SubAck {
        /// Identifier of the acknowledged subscribe.
        packet_id: u16,
        /// Granted QoS, or 0x80 for failure.
        return_code: u8,
    },
    /// Ping response.
    PingResp,
    /// Any other well-formed packet; the client ignores these.
    Other(PacketType),
}

/// A parsed fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    /// Packet type from the high nibble.
    pub packet_type: PacketType,
    /// Type-specific flags from the low nibble.
    pub flags: u8,
    /// Length of everything after the fixed header.
    pub remaining_length: usize,
    /// Bytes taken by the fixed header itself (2 to 5).
    pub header_len: usize,
}

impl FixedHeader {
    /// Total length of the frame this header introduces.
    pub fn frame_len(&self) -> usize {
        self.header_len + self.remaining_length
    }
}

/// Number of bytes needed to encode `len` as a remaining length.
pub fn remaining_length_len(len: usize) -> usize {
    match len {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Encode `len` with the base-128 continuation scheme.
///
/// Returns the number of bytes written (1 to 4).
///
/// ```rust
/// use libmqtt::network::application::mqtt::codec::encode_remaining_length;
///
/// let mut buf = [0u8; 4];
/// assert_eq!(encode_remaining_length(321, &mut buf), Ok(2));
/// assert_eq!(&buf[..2], &[0xC1, 0x02]);
/// ```
pub fn encode_remaining_length(mut len: usize, out: &mut [u8]) -> Result<usize, Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::MalformedRemainingLength);
    }
    let mut count = 0;
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        *out.get_mut(count).ok_or(Error::BufferTooSmall)? = byte;
        count += 1;
        if len == 0 {
            return Ok(count);
        }
    }
}

/// Decode a remaining-length field from the start of `buf`.
///
/// Returns `Ok(Some((value, bytes_used)))`, or `Ok(None)` when `buf` ends
/// before the field does. A fourth byte that still has its continuation bit
/// set is rejected with [`Error::MalformedRemainingLength`].
pub fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in buf.iter().take(4).enumerate() {
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        Err(Error::MalformedRemainingLength)
    } else {
        Ok(None)
    }
}

/// Parse the fixed header at the start of `buf`.
///
/// Returns `Ok(None)` if more bytes are needed to finish the header.
pub fn parse_fixed_header(buf: &[u8]) -> Result<Option<FixedHeader>, Error> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let packet_type = PacketType::from_header_byte(first).ok_or(Error::MalformedPacket)?;
    Ok(
        decode_remaining_length(&buf[1..])?.map(|(remaining_length, used)| FixedHeader {
            packet_type,
            flags: first & 0x0F,
            remaining_length,
            header_len: 1 + used,
        }),
    )
}

/// Decode one complete frame.
///
/// `frame` must start at a fixed header; bytes after the frame are ignored.
pub fn decode(frame: &[u8]) -> Result<Packet<'_>, Error> {
    let header = parse_fixed_header(frame)?.ok_or(Error::MalformedPacket)?;
    let body = frame
        .get(header.header_len..header.frame_len())
        .ok_or(Error::MalformedPacket)?;

    match header.packet_type {
        PacketType::ConnAck => match body {
            [ack_flags, return_code] => Ok(Packet::ConnAck {
                session_present: ack_flags & 0x01 != 0,
                return_code: *return_code,
            }),
            _ => Err(Error::MalformedPacket),
        },
        PacketType::Publish => decode_publish(header.flags, body).map(Packet::Publish),
        PacketType::PubAck => match body {
            [hi, lo] => Ok(Packet::PubAck {
                packet_id: u16::from_be_bytes([*hi, *lo]),
            }),
            _ => Err(Error::MalformedPacket),
        },
        PacketType::SubAck => match body {
            [hi, lo, return_code, ..] => Ok(Packet::SubAck {
                packet_id: u16::from_be_bytes([*hi, *lo]),
                return_code: *return_code,
            }),
            _ => Err(Error::MalformedPacket),
        },
        PacketType::PingResp if body.is_empty() => Ok(Packet::PingResp),
        PacketType::PingResp => Err(Error::MalformedPacket),
        other => Ok(Packet::Other(other)),
    }
}

fn decode_publish(flags: u8, body: &[u8]) -> Result<Publish<'_>, Error> {
    let qos = match (flags >> 1) & 0x03 {
        3 => return Err(Error::MalformedPacket),
        level => QoS::try_from(level)?,
    };

    let topic_len = match body {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) as usize,
        _ => return Err(Error::MalformedPacket),
    };
    let topic_bytes = body.get(2..2 + topic_len).ok_or(Error::MalformedPacket)?;
    let topic = core::str::from_utf8(topic_bytes).map_err(|_| Error::MalformedPacket)?;

    let mut offset = 2 + topic_len;
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        QoS::AtLeastOnce => {
            let id = body.get(offset..offset + 2).ok_or(Error::MalformedPacket)?;
            offset += 2;
            Some(u16::from_be_bytes([id[0], id[1]]))
        }
    };

    Ok(Publish {
        topic,
        payload: &body[offset..],
        qos,
        packet_id,
        retain: flags & 0x01 != 0,
        dup: flags & 0x08 != 0,
    })
}

/// Bounded writer over a caller-supplied buffer.
struct Cursor<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> Cursor<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn fixed_header(&mut self, first: u8, remaining: usize) -> Result<(), Error> {
        self.put_u8(first)?;
        let rest = self.buf.get_mut(self.pos..).ok_or(Error::BufferTooSmall)?;
        self.pos += encode_remaining_length(remaining, rest)?;
        Ok(())
    }

    fn put_u8(&mut self, byte: u8) -> Result<(), Error> {
        self.put_slice(&[byte])
    }

    fn put_u16(&mut self, value: u16) -> Result<(), Error> {
        self.put_slice(&value.to_be_bytes())
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.pos + bytes.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(Error::BufferTooSmall)?
            .copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// u16 length prefix followed by the bytes.
    fn put_str(&mut self, s: &str) -> Result<(), Error> {
        let len = u16::try_from(s.len()).map_err(|_| Error::BufferTooSmall)?;
        self.put_u16(len)?;
        self.put_slice(s.as_bytes())
    }

    fn finish(self) -> usize {
        self.pos
    }
}

/// Write a CONNECT frame, returning its length.
pub fn pack_connect(buf: &mut [u8], connect: &Connect<'_>) -> Result<usize, Error> {
    let mut flags = 0;
    if connect.clean_session {
        flags |= FLAG_CLEAN_SESSION;
    }
    // protocol name (2 + 4), level, flags, keep-alive (2)
    let mut remaining = 10 + 2 + connect.client_id.len();
    if let Some(username) = connect.username {
        flags |= FLAG_USERNAME;
        remaining += 2 + username.len();
    }
    if let Some(password) = connect.password {
        flags |= FLAG_PASSWORD;
        remaining += 2 + password.len();
    }

    let mut w = Cursor::new(buf);
    w.fixed_header((PacketType::Connect as u8) << 4, remaining)?;
    w.put_u16(PROTOCOL_NAME.len() as u16)?;
    w.put_slice(PROTOCOL_NAME)?;
    w.put_u8(PROTOCOL_LEVEL)?;
    w.put_u8(flags)?;
    w.put_u16(connect.keep_alive)?;
    w.put_str(connect.client_id)?;
    if let Some(username) = connect.username {
        w.put_str(username)?;
    }
    if let Some(password) = connect.password {
        w.put_str(password)?;
    }
    Ok(w.finish())
}

/// Write a PUBLISH frame, returning its length.
///
/// `packet_id` must be present exactly when `qos` is above
/// [`QoS::AtMostOnce`].
pub fn pack_publish(buf: &mut [u8], publish: &Publish<'_>) -> Result<usize, Error> {
    if publish.topic.len() > u16::MAX as usize {
        return Err(Error::TopicTooLong);
    }
    let id_len = match (publish.qos, publish.packet_id) {
        (QoS::AtMostOnce, None) => 0,
        (QoS::AtLeastOnce, Some(_)) => 2,
        _ => return Err(Error::MalformedPacket),
    };

    let mut first = ((PacketType::Publish as u8) << 4) | ((publish.qos as u8) << 1);
    if publish.dup {
        first |= 0x08;
    }
    if publish.retain {
        first |= 0x01;
    }
    let remaining = 2 + publish.topic.len() + id_len + publish.payload.len();

    let mut w = Cursor::new(buf);
    w.fixed_header(first, remaining)?;
    w.put_str(publish.topic)?;
    if let Some(id) = publish.packet_id {
        w.put_u16(id)?;
    }
    w.put_slice(publish.payload)?;
    Ok(w.finish())
}

/// Write a single-filter SUBSCRIBE frame, returning its length.
pub fn pack_subscribe(
    buf: &mut [u8],
    filter: &str,
    qos: QoS,
    packet_id: u16,
) -> Result<usize, Error> {
    if filter.len() > u16::MAX as usize {
        return Err(Error::TopicTooLong);
    }
    let mut w = Cursor::new(buf);
    w.fixed_header(((PacketType::Subscribe as u8) << 4) | 0x02, 2 + 2 + filter.len() + 1)?;
    w.put_u16(packet_id)?;
    w.put_str(filter)?;
    w.put_u8(qos as u8)?;
    Ok(w.finish())
}

/// Write a PUBACK frame for an inbound QoS 1 publish.
pub fn pack_puback(buf: &mut [u8], packet_id: u16) -> Result<usize, Error> {
    let mut w = Cursor::new(buf);
    w.fixed_header((PacketType::PubAck as u8) << 4, 2)?;
    w.put_u16(packet_id)?;
    Ok(w.finish())
}

/// Write a PINGREQ frame.
pub fn pack_pingreq(buf: &mut [u8]) -> Result<usize, Error> {
    let mut w = Cursor::new(buf);
    w.fixed_header((PacketType::PingReq as u8) << 4, 0)?;
    Ok(w.finish())
}

/// Write a DISCONNECT frame.
pub fn pack_disconnect(buf: &mut [u8]) -> Result<usize, Error> {
    let mut w = Cursor::new(buf);
    w.fixed_header((PacketType::Disconnect as u8) << 4, 0)?;
    Ok(w.finish())
}
