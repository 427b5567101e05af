//! Thread-safe MQTT client facade.
//!
//! A [`Client`] owns one broker session and, while connected, one background
//! engine task that keeps the link alive, receives inbound frames and
//! reconnects after transport failures. Every method takes `&self`, so a
//! client can be shared between threads behind an [`Arc`].
//!
//! # Concurrency
//!
//! All foreground operations serialize on the session mutex and hold it for
//! their full duration, so at most one frame is ever in flight. The engine
//! holds the same mutex around its bounded receive and releases it fairly
//! after every pass.
//!
//! Inbound messages are delivered to the [`MessageHandler`] on the engine
//! task, synchronously and without the session mutex held: a handler may
//! publish or subscribe through a clone of an `Arc<Client>`, but it must not
//! call [`Client::disconnect`], which waits for the engine itself to exit. A
//! slow handler delays keep-alive servicing; forward work to a channel if it
//! can block.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::{Client, Options, QoS};
//! use libmqtt::network::tcp::TcpConnector;
//! use libmqtt::os::StdPlatform;
//!
//! let options = Options::new("broker.emqx.io", 1883, "mqtt_client_001")
//!     .unwrap()
//!     .with_keep_alive(60);
//!
//! let client = Client::new(
//!     TcpConnector::new(),
//!     StdPlatform::new(),
//!     options,
//!     |topic: &str, payload: &[u8]| {
//!         println!("{}: {}", topic, String::from_utf8_lossy(payload));
//!     },
//! )
//! .unwrap();
//!
//! client.connect().unwrap();
//! client.subscribe("test/topic", QoS::AtMostOnce).unwrap();
//! client.publish("test/topic", b"Hello, MQTT!", QoS::AtMostOnce).unwrap();
//! client.disconnect();
//! ```

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use super::codec::QoS;
use super::connection::{Session, State};
use super::engine::{Engine, Shared, SharedHandler};
use super::error::{ConnectReturnCode, Error};
use super::options::Options;
use crate::network::Connect;
use crate::os::{Platform, Task, TaskConfig};

/// Receives application messages from the engine.
///
/// Implemented for every `FnMut(&str, &[u8]) + Send + 'static` closure;
/// state the handler needs travels in the closure's captures.
pub trait MessageHandler: Send + 'static {
    /// Called once per inbound PUBLISH, in arrival order.
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: FnMut(&str, &[u8]) + Send + 'static,
{
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

struct Worker<T> {
    task: T,
    exit: Receiver<()>,
}

/// An MQTT 3.1.1 client with automatic keep-alive and reconnection.
///
/// Dropping the client disconnects it and waits for the engine to exit.
pub struct Client<N, P>
where
    N: Connect + Send + 'static,
    N::Connection: Send,
    P: Platform + Send + Sync + 'static,
{
    shared: Arc<Shared<N>>,
    platform: Arc<P>,
    handler: SharedHandler,
    task_config: TaskConfig,
    worker: Mutex<Option<Worker<P::Task>>>,
}

impl<N, P> Client<N, P>
where
    N: Connect + Send + 'static,
    N::Connection: Send,
    P: Platform + Send + Sync + 'static,
{
    /// Create a disconnected client.
    ///
    /// Nothing touches the network until [`connect`](Self::connect). An empty
    /// client identifier is only valid with a clean session.
    pub fn new<H>(connector: N, platform: P, options: Options, handler: H) -> Result<Self, Error>
    where
        H: MessageHandler,
    {
        if options.client_id.is_empty() && !options.clean_session {
            return Err(Error::ConnectionRefused(
                ConnectReturnCode::IdentifierRejected,
            ));
        }
        let task_config = options.task;
        let handler: Box<dyn MessageHandler> = Box::new(handler);
        Ok(Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session::new(connector, options)),
                running: AtomicBool::new(false),
            }),
            platform: Arc::new(platform),
            handler: Arc::new(Mutex::new(handler)),
            task_config,
            worker: Mutex::new(None),
        })
    }

    /// Connect to the broker and start the background engine.
    ///
    /// Returns once CONNACK has been accepted. Registered subscriptions are
    /// sent again. Calling this while connected is a no-op. On failure no
    /// engine task is left running.
    pub fn connect(&self) -> Result<(), Error> {
        let mut worker = self.worker.lock();
        {
            let mut session = self.shared.session.lock();
            if !session.is_connected() {
                session.reconnect(&*self.platform)?;
            }
        }
        if worker.is_some() {
            return Ok(());
        }

        self.shared.running.store(true, Ordering::Release);
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);
        let engine = Engine::new(
            self.shared.clone(),
            self.platform.clone(),
            self.handler.clone(),
            exit_tx,
        );
        match self.platform.spawn(self.task_config, move || engine.run()) {
            Ok(task) => {
                *worker = Some(Worker {
                    task,
                    exit: exit_rx,
                });
                Ok(())
            }
            Err(e) => {
                log::warn!("mqtt: failed to start engine: {:?}", e);
                self.shared.running.store(false, Ordering::Release);
                self.shared.session.lock().disconnect();
                Err(Error::TaskSpawn)
            }
        }
    }

    /// Send DISCONNECT, close the transport and stop the engine.
    ///
    /// Blocks until the engine has acknowledged exit and its task has been
    /// joined. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let mut worker = self.worker.lock();
        {
            let mut session = self.shared.session.lock();
            self.shared.running.store(false, Ordering::Release);
            session.disconnect();
        }
        if let Some(Worker { task, exit }) = worker.take() {
            // An engine that panicked drops its sender instead.
            let _ = exit.recv();
            task.join();
        }
    }

    /// Subscribe to `filter` and restore it after every reconnect.
    ///
    /// SUBACK is not awaited. When the registry is full the subscription is
    /// still sent but will not be restored.
    pub fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), Error> {
        self.shared
            .session
            .lock()
            .subscribe(filter, qos)
            .map(|_| ())
    }

    /// Publish `payload` to `topic`.
    ///
    /// The frame has been written to the transport when this returns `Ok`.
    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        self.shared.session.lock().publish(topic, payload, qos)
    }

    /// `true` while the session holds an open, acknowledged link.
    pub fn is_connected(&self) -> bool {
        self.shared.session.lock().is_connected()
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.shared.session.lock().state()
    }
}

impl<N, P> fmt::Debug for Client<N, P>
where
    N: Connect + Send + 'static,
    N::Connection: Send,
    P: Platform + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &*self.shared.session.lock())
            .field("running", &self.shared.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<N, P> Drop for Client<N, P>
where
    N: Connect + Send + 'static,
    N::Connection: Send,
    P: Platform + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.disconnect();
    }
}
