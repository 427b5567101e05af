//! In-memory broker, transport and platform for driving a real `Client`.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use libmqtt::network::application::mqtt::codec::{self, Publish};
use libmqtt::network::error::Error;
use libmqtt::network::{Close, Connect, Connection, Read, Write};
use libmqtt::os::{Platform, SpawnError, Task, TaskConfig};
use libmqtt::{Client, Options, QoS, ReconnectPolicy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BrokerState {
    frames: Vec<Vec<u8>>,
    connects: usize,
    refused: usize,
    closes: usize,
    refuse: bool,
    silent: bool,
    connack_code: u8,
    answer_pings: bool,
    link: Option<Sender<Vec<u8>>>,
    generation: u64,
}

/// Scripted broker shared by the connector and every connection it opens.
///
/// Answers CONNECT with CONNACK and PINGREQ with PINGRESP automatically;
/// everything the client writes is recorded frame by frame.
#[derive(Debug, Clone)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                frames: Vec::new(),
                connects: 0,
                refused: 0,
                closes: 0,
                refuse: false,
                silent: false,
                connack_code: 0,
                answer_pings: true,
                link: None,
                generation: 0,
            })),
        }
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            state: self.state.clone(),
        }
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    pub fn count(&self, pred: impl Fn(&[u8]) -> bool) -> usize {
        self.state.lock().frames.iter().filter(|f| pred(f.as_slice())).count()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn refused(&self) -> usize {
        self.state.lock().refused
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Deliver raw bytes to the client over the current link.
    pub fn send(&self, bytes: &[u8]) {
        if let Some(link) = &self.state.lock().link {
            link.send(bytes.to_vec()).unwrap();
        }
    }

    /// Break the current link; reads and writes on it start failing.
    pub fn kill_link(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.link = None;
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    pub fn set_connack_code(&self, code: u8) {
        self.state.lock().connack_code = code;
    }

    pub fn set_answer_pings(&self, answer: bool) {
        self.state.lock().answer_pings = answer;
    }
}

#[derive(Debug)]
pub struct MockConnector {
    state: Arc<Mutex<BrokerState>>,
}

impl Connect for MockConnector {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, _host: &str, _port: u16, _timeout_ms: u32) -> Result<MockConnection, Error> {
        let mut state = self.state.lock();
        if state.refuse {
            state.refused += 1;
            return Err(Error::ConnectionRefused);
        }
        state.connects += 1;
        state.generation += 1;
        let (tx, rx) = crossbeam_channel::unbounded();
        state.link = Some(tx.clone());
        Ok(MockConnection {
            state: self.state.clone(),
            generation: state.generation,
            inbound: rx,
            reply: tx,
            pending: Vec::new(),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<BrokerState>>,
    generation: u64,
    inbound: Receiver<Vec<u8>>,
    reply: Sender<Vec<u8>>,
    pending: Vec<u8>,
}

impl MockConnection {
    fn dead(&self) -> bool {
        self.state.lock().generation != self.generation
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        if self.dead() {
            return Err(Error::ConnectionClosed);
        }
        if self.pending.is_empty() {
            match self
                .inbound
                .recv_timeout(Duration::from_millis(timeout_ms as u64))
            {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) if self.dead() => {
                    return Err(Error::ConnectionClosed);
                }
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::ConnectionClosed),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let mut state = self.state.lock();
        if state.generation != self.generation {
            return Err(Error::WriteError);
        }
        state.frames.push(buf.to_vec());
        match buf.first() {
            Some(0x10) if !state.silent => {
                let _ = self.reply.send(vec![0x20, 0x02, 0x00, state.connack_code]);
            }
            Some(0xC0) if state.answer_pings => {
                let _ = self.reply.send(vec![0xD0, 0x00]);
            }
            _ => {}
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Error> {
        self.state.lock().closes += 1;
        Ok(())
    }
}

impl Connection for MockConnection {}

/// Real threads, manual clock.
#[derive(Debug, Clone)]
pub struct TestPlatform {
    clock: Arc<AtomicU32>,
    spawned: Arc<AtomicUsize>,
    fail_spawn: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct TestTask(JoinHandle<()>);

impl Task for TestTask {
    fn join(self) {
        self.0.join().unwrap();
    }
}

impl TestPlatform {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(AtomicU32::new(1_000)),
            spawned: Arc::new(AtomicUsize::new(0)),
            fail_spawn: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.clock.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }
}

impl Platform for TestPlatform {
    type Task = TestTask;

    fn spawn<F>(&self, config: TaskConfig, entry: F) -> Result<TestTask, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(SpawnError);
        }
        self.spawned.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name(config.name.into())
            .spawn(entry)
            .map(TestTask)
            .map_err(|_| SpawnError)
    }

    fn now_ms(&self) -> u32 {
        self.clock.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

pub type TestClient = Client<MockConnector, TestPlatform>;
pub type Inbox = Receiver<(String, Vec<u8>)>;

/// Keep-alive 2 s on the manual clock, 10 ms polls, 20 ms reconnect delay.
pub fn options() -> Options {
    Options::new("mock.broker", 1883, "test-client")
        .unwrap()
        .with_keep_alive(2)
        .with_poll_timeout(10)
        .with_reconnect(ReconnectPolicy::Fixed { delay_ms: 20 })
}

pub fn client(broker: &MockBroker, platform: &TestPlatform, options: Options) -> (TestClient, Inbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let client = Client::new(
        broker.connector(),
        platform.clone(),
        options,
        move |topic: &str, payload: &[u8]| {
            let _ = tx.send((topic.to_owned(), payload.to_vec()));
        },
    )
    .unwrap();
    (client, rx)
}

/// Poll `cond` for up to three seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Give the engine a few passes.
pub fn settle() {
    thread::sleep(Duration::from_millis(100));
}

pub fn is_connect(frame: &[u8]) -> bool {
    frame.first() == Some(&0x10)
}

pub fn is_pingreq(frame: &[u8]) -> bool {
    frame == [0xC0, 0x00]
}

/// Packet id and filter of a SUBSCRIBE frame.
pub fn subscription(frame: &[u8]) -> Option<(u16, String)> {
    if frame.first() != Some(&0x82) {
        return None;
    }
    let id = u16::from_be_bytes([frame[2], frame[3]]);
    let len = u16::from_be_bytes([frame[4], frame[5]]) as usize;
    let filter = std::str::from_utf8(&frame[6..6 + len]).ok()?.to_owned();
    Some((id, filter))
}

/// SUBSCRIBE frames written after the most recent CONNECT.
pub fn subscriptions_since_last_connect(frames: &[Vec<u8>]) -> Vec<(u16, String)> {
    let start = frames.iter().rposition(|f| is_connect(f)).map_or(0, |i| i + 1);
    frames[start..].iter().filter_map(|f| subscription(f)).collect()
}

pub fn publish_frame(topic: &str, payload: &[u8], qos: QoS, packet_id: Option<u16>) -> Vec<u8> {
    let mut buf = [0u8; 512];
    let len = codec::pack_publish(
        &mut buf,
        &Publish {
            topic,
            payload,
            qos,
            packet_id,
            retain: false,
            dup: false,
        },
    )
    .unwrap();
    buf[..len].to_vec()
}
