use criterion::{Criterion, Throughput};
use libmqtt::network::application::mqtt::Session;
use libmqtt::network::{Close, Connect, Connection, Read, Write};
use libmqtt::os::{Platform, SpawnError, Task, TaskConfig};
use libmqtt::{Options, QoS};
use std::collections::VecDeque;

/// Accepts every write; reads back a queued CONNACK once.
struct SinkConnection {
    inbound: VecDeque<u8>,
}

impl Read for SinkConnection {
    type Error = ();
    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SinkConnection {
    type Error = ();
    fn write(&mut self, buf: &[u8]) -> Result<usize, ()> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

impl Close for SinkConnection {
    type Error = ();
    fn close(self) -> Result<(), ()> {
        Ok(())
    }
}

impl Connection for SinkConnection {}

struct SinkNetwork;

impl Connect for SinkNetwork {
    type Connection = SinkConnection;
    type Error = ();
    fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<SinkConnection, ()> {
        Ok(SinkConnection {
            inbound: VecDeque::from([0x20, 0x02, 0x00, 0x00]),
        })
    }
}

struct Inline;

struct NoTask;

impl Task for NoTask {
    fn join(self) {}
}

impl Platform for Inline {
    type Task = NoTask;
    fn spawn<F>(&self, _: TaskConfig, _: F) -> Result<NoTask, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        Err(SpawnError)
    }
    fn now_ms(&self) -> u32 {
        0
    }
    fn sleep_ms(&self, _: u32) {}
}

fn connected_session() -> Session<SinkNetwork> {
    let options = Options::new("bench.local", 1883, "libmqtt-bench").unwrap();
    let mut session = Session::new(SinkNetwork, options);
    session.handshake(&Inline).expect("Failed to connect");
    session
}

fn bench_publish(c: &mut Criterion, name: &str, qos: QoS) {
    let mut group = c.benchmark_group(name);
    let payload = b"hello world from bench";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    let mut session = connected_session();
    group.bench_function("publish", |b| {
        b.iter(|| {
            session
                .publish("libmqtt/bench-topic", payload, qos)
                .expect("Failed to publish")
        })
    });
    group.finish();
}

pub fn bench_session_publish_qos0(c: &mut Criterion) {
    bench_publish(c, "session_publish_qos0", QoS::AtMostOnce);
}

pub fn bench_session_publish_qos1(c: &mut Criterion) {
    bench_publish(c, "session_publish_qos1", QoS::AtLeastOnce);
}
