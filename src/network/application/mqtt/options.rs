//! Client configuration.

use heapless::String;

use super::codec::Connect;
use super::error::Error;
use crate::os::TaskConfig;

/// Default MQTT port without TLS.
pub const DEFAULT_PORT: u16 = 1883;
/// Maximum broker host name length.
pub const MAX_HOST_LEN: usize = 128;
/// Maximum client identifier length.
pub const MAX_CLIENT_ID_LEN: usize = 64;
/// Maximum username or password length.
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// Delay schedule between reconnection attempts.
///
/// ```rust
/// use libmqtt::network::application::mqtt::ReconnectPolicy;
///
/// let fixed = ReconnectPolicy::Fixed { delay_ms: 1000 };
/// assert_eq!(fixed.delay_ms(7), 1000);
///
/// let backoff = ReconnectPolicy::Exponential { initial_ms: 500, max_ms: 8000 };
/// assert_eq!(backoff.delay_ms(0), 500);
/// assert_eq!(backoff.delay_ms(3), 4000);
/// assert_eq!(backoff.delay_ms(10), 8000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Wait the same delay after every failed attempt.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u32,
    },
    /// Double the delay after each consecutive failure, up to `max_ms`.
    Exponential {
        /// Delay after the first failure.
        initial_ms: u32,
        /// Upper bound.
        max_ms: u32,
    },
}

impl ReconnectPolicy {
    /// Delay after `failures` consecutive failed attempts (0-based).
    pub fn delay_ms(&self, failures: u32) -> u32 {
        match *self {
            Self::Fixed { delay_ms } => delay_ms,
            Self::Exponential { initial_ms, max_ms } => {
                let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
                initial_ms.saturating_mul(factor).min(max_ms)
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed { delay_ms: 1000 }
    }
}

/// Configuration options for an MQTT client.
///
/// Strings are stored in fixed-capacity buffers; values that do not fit are
/// rejected with [`Error::BufferTooSmall`].
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::{Options, ReconnectPolicy};
///
/// let options = Options::new("broker.emqx.io", 1883, "mqtt_client_001")
///     .unwrap()
///     .with_credentials("user", Some("secret"))
///     .unwrap()
///     .with_keep_alive(30)
///     .with_reconnect(ReconnectPolicy::Exponential { initial_ms: 1000, max_ms: 30_000 });
///
/// assert_eq!(options.keep_alive_seconds, 30);
/// assert!(options.clean_session);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Broker host name or IP address.
    pub host: String<MAX_HOST_LEN>,
    /// Broker port, usually 1883 (8883 for TLS).
    pub port: u16,
    /// The client identifier, unique per broker.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Optional user name.
    pub username: Option<String<MAX_CREDENTIAL_LEN>>,
    /// Optional password.
    pub password: Option<String<MAX_CREDENTIAL_LEN>>,
    /// Keep-alive interval in seconds; 0 disables pings.
    pub keep_alive_seconds: u16,
    /// Ask the broker to discard prior session state on every connect.
    pub clean_session: bool,
    /// Bound on opening the transport and on waiting for CONNACK.
    pub connect_timeout_ms: u32,
    /// Receive timeout of one engine pass.
    ///
    /// The engine holds the session lock while it waits, so this also bounds
    /// how long a foreground publish can be delayed, and how quickly a
    /// shutdown request is noticed.
    pub poll_timeout_ms: u32,
    /// Delay schedule between reconnection attempts.
    pub reconnect: ReconnectPolicy,
    /// Creation parameters of the background engine task.
    pub task: TaskConfig,
}

impl Options {
    /// Options with defaults: 60 s keep-alive, clean session, 5 s connect
    /// timeout, 100 ms poll, 1 s fixed reconnect delay.
    pub fn new(host: &str, port: u16, client_id: &str) -> Result<Self, Error> {
        Ok(Self {
            host: String::try_from(host).map_err(|_| Error::BufferTooSmall)?,
            port,
            client_id: String::try_from(client_id).map_err(|_| Error::BufferTooSmall)?,
            username: None,
            password: None,
            keep_alive_seconds: 60,
            clean_session: true,
            connect_timeout_ms: 5000,
            poll_timeout_ms: 100,
            reconnect: ReconnectPolicy::default(),
            task: TaskConfig::default(),
        })
    }

    /// Authenticate with `username` and an optional `password`.
    pub fn with_credentials(mut self, username: &str, password: Option<&str>) -> Result<Self, Error> {
        self.username = Some(String::try_from(username).map_err(|_| Error::BufferTooSmall)?);
        self.password = password
            .map(|p| String::try_from(p).map_err(|_| Error::BufferTooSmall))
            .transpose()?;
        Ok(self)
    }

    /// Set the keep-alive interval.
    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive_seconds = seconds;
        self
    }

    /// Set the clean-session flag.
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    /// Set the connect and CONNACK timeout.
    pub fn with_connect_timeout(mut self, timeout_ms: u32) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-pass receive timeout; clamped to at least 1 ms.
    pub fn with_poll_timeout(mut self, timeout_ms: u32) -> Self {
        self.poll_timeout_ms = timeout_ms.max(1);
        self
    }

    /// Set the reconnection schedule.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the engine task parameters.
    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.task = task;
        self
    }

    /// The CONNECT fields these options describe.
    pub fn connect_packet(&self) -> Connect<'_> {
        Connect {
            client_id: &self.client_id,
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            keep_alive: self.keep_alive_seconds,
            clean_session: self.clean_session,
        }
    }
}
