//! Error types for the MQTT engine.

/// Reason code carried by a refusing CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectReturnCode {
    /// 0x01: the broker does not support protocol level 4.
    UnacceptableProtocolVersion,
    /// 0x02: the client identifier is not allowed.
    IdentifierRejected,
    /// 0x03: the MQTT service is unavailable.
    ServerUnavailable,
    /// 0x04: malformed username or password.
    BadUsernameOrPassword,
    /// 0x05: the client is not authorized to connect.
    NotAuthorized,
    /// Any code outside the range defined by MQTT 3.1.1.
    Reserved(u8),
}

impl ConnectReturnCode {
    /// Interpret a non-zero CONNACK return code.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUsernameOrPassword,
            5 => Self::NotAuthorized,
            other => Self::Reserved(other),
        }
    }

    /// The raw wire value.
    pub fn code(self) -> u8 {
        match self {
            Self::UnacceptableProtocolVersion => 1,
            Self::IdentifierRejected => 2,
            Self::ServerUnavailable => 3,
            Self::BadUsernameOrPassword => 4,
            Self::NotAuthorized => 5,
            Self::Reserved(code) => code,
        }
    }
}

/// Errors returned by the MQTT client and codec.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The operation needs a connected session.
    NotConnected,
    /// The transport could not be opened.
    ConnectFailed,
    /// The transport rejected a write.
    WriteError,
    /// The transport accepted fewer bytes than the frame length.
    ShortWrite,
    /// The transport reported a read failure.
    ReadError,
    /// No response arrived within the configured timeout.
    Timeout,
    /// The peer closed the connection.
    ConnectionClosed,
    /// The broker refused the connection.
    ConnectionRefused(ConnectReturnCode),
    /// An unexpected packet was received.
    ProtocolError,
    /// A received packet is truncated or internally inconsistent.
    MalformedPacket,
    /// A remaining-length field continues past four bytes.
    MalformedRemainingLength,
    /// The frame does not fit the buffer.
    BufferTooSmall,
    /// The topic or filter exceeds the supported length.
    TopicTooLong,
    /// The topic is empty or contains wildcards where none are allowed.
    InvalidTopic,
    /// The QoS level is not supported.
    InvalidQoS,
    /// The background engine task could not be started.
    TaskSpawn,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectReturnCode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectReturnCode::UnacceptableProtocolVersion => {
                defmt::write!(f, "UnacceptableProtocolVersion")
            }
            ConnectReturnCode::IdentifierRejected => defmt::write!(f, "IdentifierRejected"),
            ConnectReturnCode::ServerUnavailable => defmt::write!(f, "ServerUnavailable"),
            ConnectReturnCode::BadUsernameOrPassword => defmt::write!(f, "BadUsernameOrPassword"),
            ConnectReturnCode::NotAuthorized => defmt::write!(f, "NotAuthorized"),
            ConnectReturnCode::Reserved(code) => defmt::write!(f, "Reserved({=u8})", code),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::ConnectFailed => defmt::write!(f, "ConnectFailed"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ShortWrite => defmt::write!(f, "ShortWrite"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::ConnectionRefused(code) => defmt::write!(f, "ConnectionRefused({})", code),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::MalformedPacket => defmt::write!(f, "MalformedPacket"),
            Error::MalformedRemainingLength => defmt::write!(f, "MalformedRemainingLength"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::TopicTooLong => defmt::write!(f, "TopicTooLong"),
            Error::InvalidTopic => defmt::write!(f, "InvalidTopic"),
            Error::InvalidQoS => defmt::write!(f, "InvalidQoS"),
            Error::TaskSpawn => defmt::write!(f, "TaskSpawn"),
        }
    }
}
