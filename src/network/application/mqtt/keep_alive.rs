//! Keep-alive timer state machine.
//!
//! The engine pings once half the keep-alive interval has passed since the
//! last confirmed liveness, and declares the link dead when the PINGRESP is
//! more than another half interval late. Worst-case detection of a silent
//! broker is therefore about one keep-alive interval.
//!
//! Timestamps come from [`Platform::now_ms`](crate::os::Platform::now_ms)
//! and are compared with [`elapsed_ms`], so a clock wrap between two
//! timestamps is harmless.

use crate::os::elapsed_ms;

/// What the engine must do on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveAction {
    /// Send a PINGREQ now.
    SendPing,
    /// The outstanding PINGRESP is overdue; tear the link down.
    LinkDead,
}

/// Liveness timestamps of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    interval_ms: u32,
    last_ping_ms: u32,
    ping_sent_ms: u32,
    waiting_pingresp: bool,
}

impl KeepAlive {
    /// Timers for a keep-alive of `seconds`; 0 disables pinging.
    pub fn new(seconds: u16) -> Self {
        Self {
            interval_ms: seconds as u32 * 1000,
            last_ping_ms: 0,
            ping_sent_ms: 0,
            waiting_pingresp: false,
        }
    }

    /// Start counting from a fresh handshake at `now`.
    pub fn reset(&mut self, now: u32) {
        self.last_ping_ms = now;
        self.ping_sent_ms = now;
        self.waiting_pingresp = false;
    }

    /// Decide whether this pass must ping or give up on the link.
    pub fn poll(&self, now: u32) -> Option<KeepAliveAction> {
        if self.interval_ms == 0 {
            return None;
        }
        let half = self.interval_ms / 2;
        if self.waiting_pingresp {
            (elapsed_ms(now, self.ping_sent_ms) > half).then_some(KeepAliveAction::LinkDead)
        } else {
            (elapsed_ms(now, self.last_ping_ms) >= half).then_some(KeepAliveAction::SendPing)
        }
    }

    /// A PINGREQ went out at `now`.
    pub fn ping_sent(&mut self, now: u32) {
        self.ping_sent_ms = now;
        self.waiting_pingresp = true;
    }

    /// A PINGRESP arrived at `now`.
    pub fn pong_received(&mut self, now: u32) {
        self.last_ping_ms = now;
        self.waiting_pingresp = false;
    }

    /// `true` while a PINGREQ is unanswered.
    pub fn waiting_pingresp(&self) -> bool {
        self.waiting_pingresp
    }

    /// Time of the last confirmed liveness.
    pub fn last_ping_ms(&self) -> u32 {
        self.last_ping_ms
    }

    /// The negotiated interval in milliseconds.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}
