//! Fixed-capacity registry of the subscriptions to restore after a reconnect.

use heapless::{String, Vec};

use super::codec::QoS;
use super::error::Error;

/// Maximum number of subscriptions tracked for automatic resubscription.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// Maximum length in bytes of a topic name or topic filter.
pub const MAX_TOPIC_LEN: usize = 128;

/// One tracked topic filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic filter, possibly with `+`/`#` wildcards.
    pub filter: String<MAX_TOPIC_LEN>,
    /// Requested QoS.
    pub qos: QoS,
}

/// Outcome of [`Subscriptions::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// A new entry was appended.
    Inserted,
    /// The filter was already present; its QoS was replaced.
    Updated,
    /// The registry is full; the filter will not be restored on reconnect.
    Dropped,
}

/// Insertion-ordered set of subscriptions, deduplicated by exact filter.
///
/// Entries are never removed; replay order is insertion order.
///
/// ```rust
/// use libmqtt::network::application::mqtt::subscriptions::{Recorded, Subscriptions};
/// use libmqtt::network::application::mqtt::QoS;
///
/// let mut subs = Subscriptions::new();
/// assert_eq!(subs.record("a/b", QoS::AtMostOnce), Ok(Recorded::Inserted));
/// assert_eq!(subs.record("a/b", QoS::AtLeastOnce), Ok(Recorded::Updated));
/// assert_eq!(subs.len(), 1);
/// assert_eq!(subs.iter().next().unwrap().qos, QoS::AtLeastOnce);
/// ```
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: Vec<Subscription, MAX_SUBSCRIPTIONS>,
}

impl Subscriptions {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Track `filter` at `qos`.
    ///
    /// A full registry is not an error: the outcome is
    /// [`Recorded::Dropped`] and existing entries are untouched.
    pub fn record(&mut self, filter: &str, qos: QoS) -> Result<Recorded, Error> {
        if let Some(existing) = self.entries.iter_mut().find(|s| s.filter == filter) {
            existing.qos = qos;
            return Ok(Recorded::Updated);
        }
        if self.entries.is_full() {
            log::warn!("mqtt: subscription registry full, {} will not be restored", filter);
            return Ok(Recorded::Dropped);
        }
        let filter = String::try_from(filter).map_err(|_| Error::TopicTooLong)?;
        if self.entries.push(Subscription { filter, qos }).is_err() {
            return Ok(Recorded::Dropped);
        }
        Ok(Recorded::Inserted)
    }

    /// Send every entry through `send`, in insertion order.
    ///
    /// Stops at the first failure and returns it; the registry itself is
    /// left unchanged either way.
    pub fn replay<F, E>(&self, send: F) -> Result<(), E>
    where
        F: FnMut(&Subscription) -> Result<(), E>,
    {
        self.entries.iter().try_for_each(send)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    /// Number of tracked subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
