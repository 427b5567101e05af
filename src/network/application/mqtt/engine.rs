//! Background keep-alive and receive engine.
//!
//! One engine task runs per connected [`Client`](super::Client). Each pass it
//! takes the session lock, reconnects if the link is down, services the
//! keep-alive timers and waits up to the poll timeout for inbound bytes. The
//! lock is then released fairly, so a foreground publish queued behind the
//! engine gets it before the next pass, and complete frames are dispatched
//! without the session lock held.
//!
//! The receive buffer only ever holds bytes of one link. A handshake run from
//! the foreground while the engine is dispatching starts a new link
//! generation; leftover bytes of the old one are discarded and never
//! acknowledged or acted on through the new transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, MutexGuard};

use super::client::MessageHandler;
use super::codec::{self, Packet};
use super::connection::Session;
use super::error::Error;
use crate::network::Connect;
use crate::os::Platform;

/// Size of the engine's receive buffer; larger inbound frames drop the link.
pub const RECV_BUF_SIZE: usize = 1024;

/// State shared by the client facade and its engine.
pub(crate) struct Shared<N: Connect> {
    pub(crate) session: Mutex<Session<N>>,
    pub(crate) running: AtomicBool,
}

pub(crate) type SharedHandler = Arc<Mutex<Box<dyn MessageHandler>>>;

pub(crate) struct Engine<N: Connect, P: Platform> {
    shared: Arc<Shared<N>>,
    platform: Arc<P>,
    handler: SharedHandler,
    exit: Sender<()>,
    rx_buf: [u8; RECV_BUF_SIZE],
    rx_len: usize,
    rx_link: u32,
    failures: u32,
}

impl<N: Connect, P: Platform> Engine<N, P> {
    pub(crate) fn new(
        shared: Arc<Shared<N>>,
        platform: Arc<P>,
        handler: SharedHandler,
        exit: Sender<()>,
    ) -> Self {
        Self {
            shared,
            platform,
            handler,
            exit,
            rx_buf: [0; RECV_BUF_SIZE],
            rx_len: 0,
            rx_link: 0,
            failures: 0,
        }
    }

    /// Loop until `running` is cleared, then acknowledge exit once.
    pub(crate) fn run(mut self) {
        log::info!("mqtt: engine started");
        while self.running() {
            self.pass();
        }
        log::info!("mqtt: engine stopped");
        // The receiver may already be gone if the client was leaked.
        let _ = self.exit.send(());
    }

    fn running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    fn pass(&mut self) {
        let mut session = self.shared.session.lock();

        if !session.is_connected() {
            self.rx_len = 0;
            // Shutdown may have raced in while we waited for the lock.
            if !self.running() {
                return;
            }
            if let Err(e) = session.reconnect(&*self.platform) {
                let delay = session.options().reconnect.delay_ms(self.failures);
                let slice = session.options().poll_timeout_ms;
                self.failures = self.failures.saturating_add(1);
                log::warn!("mqtt: reconnect failed: {:?}, retrying in {} ms", e, delay);
                MutexGuard::unlock_fair(session);
                self.pause(delay, slice);
                return;
            }
            self.failures = 0;
        }

        if session.service_keep_alive(self.platform.now_ms()).is_err() {
            MutexGuard::unlock_fair(session);
            return;
        }

        let link = session.link_generation();
        if link != self.rx_link {
            if self.rx_len > 0 {
                log::debug!("mqtt: discarding {} bytes of a replaced link", self.rx_len);
            }
            self.rx_len = 0;
            self.rx_link = link;
        }

        let timeout = session.options().poll_timeout_ms;
        let received = match session.receive(&mut self.rx_buf[self.rx_len..], timeout) {
            Ok(n) => n,
            Err(_) => {
                session.drop_link();
                MutexGuard::unlock_fair(session);
                return;
            }
        };
        MutexGuard::unlock_fair(session);

        if received > 0 {
            self.rx_len += received;
            self.dispatch();
        }
    }

    /// Hand every complete frame in the receive buffer to its consumer, then
    /// move any trailing partial frame to the front.
    fn dispatch(&mut self) {
        let mut start = 0;
        while start < self.rx_len {
            let pending = &self.rx_buf[start..self.rx_len];
            let header = match codec::parse_fixed_header(pending) {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => return self.protocol_failure(e),
            };
            let frame_len = header.frame_len();
            if frame_len > RECV_BUF_SIZE {
                log::warn!("mqtt: inbound frame of {} bytes exceeds buffer", frame_len);
                return self.protocol_failure(Error::BufferTooSmall);
            }
            if pending.len() < frame_len {
                break;
            }
            if let Err(e) = self.handle_frame(start, start + frame_len) {
                return self.protocol_failure(e);
            }
            start += frame_len;
        }
        self.rx_buf.copy_within(start..self.rx_len, 0);
        self.rx_len -= start;
    }

    fn handle_frame(&self, start: usize, end: usize) -> Result<(), Error> {
        match codec::decode(&self.rx_buf[start..end])? {
            Packet::PingResp => {
                log::debug!("mqtt: PINGRESP");
                let mut session = self.shared.session.lock();
                if session.link_generation() == self.rx_link {
                    session.pong_received(self.platform.now_ms());
                }
            }
            Packet::Publish(publish) => {
                if let Some(packet_id) = publish.packet_id {
                    let mut session = self.shared.session.lock();
                    // The id belongs to the old link; the new one must not see it.
                    if session.link_generation() == self.rx_link {
                        session.puback(packet_id)?;
                    }
                }
                log::debug!(
                    "mqtt: message on {} ({} bytes)",
                    publish.topic,
                    publish.payload.len()
                );
                self.handler
                    .lock()
                    .on_message(publish.topic, publish.payload);
            }
            Packet::SubAck {
                packet_id,
                return_code: 0x80,
            } => log::warn!("mqtt: broker rejected subscription {}", packet_id),
            other => log::debug!("mqtt: ignoring {:?}", other),
        }
        Ok(())
    }

    fn protocol_failure(&mut self, error: Error) {
        self.rx_len = 0;
        let mut session = self.shared.session.lock();
        if session.link_generation() != self.rx_link {
            log::debug!("mqtt: protocol failure on a replaced link: {:?}", error);
            return;
        }
        log::warn!("mqtt: protocol failure: {:?}, dropping link", error);
        session.drop_link();
    }

    /// Sleep `delay_ms` in `slice_ms` steps, returning early on shutdown.
    fn pause(&self, delay_ms: u32, slice_ms: u32) {
        let mut remaining = delay_ms;
        while remaining > 0 && self.running() {
            let step = remaining.min(slice_ms.max(1));
            self.platform.sleep_ms(step);
            remaining -= step;
        }
    }
}
