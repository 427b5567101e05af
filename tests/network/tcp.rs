use libmqtt::network::error::Error;
use libmqtt::network::tcp::TcpConnector;
use libmqtt::network::{Close, Connect, Read, Write};
use libmqtt::os::StdPlatform;
use libmqtt::{Client, Options, QoS};
use std::io::{Read as StdRead, Write as StdWrite};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Read one frame whose remaining length fits a single byte.
fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).unwrap();
    assert!(header[1] < 0x80, "test frames are short");
    let mut frame = header.to_vec();
    frame.resize(2 + header[1] as usize, 0);
    stream.read_exact(&mut frame[2..]).unwrap();
    frame
}

#[test]
fn test_write_reaches_peer() {
    let (listener, port) = listener();
    let mut conn = TcpConnector::new().connect("127.0.0.1", port, 1000).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    assert_eq!(conn.write(&[0xC0, 0x00]), Ok(2));
    conn.flush().unwrap();
    let mut buf = [0u8; 2];
    peer.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [0xC0, 0x00]);
}

#[test]
fn test_read_timeout_is_not_an_error() {
    let (listener, port) = listener();
    let mut conn = TcpConnector::new().connect("127.0.0.1", port, 1000).unwrap();
    let (_peer, _) = listener.accept().unwrap();

    let started = Instant::now();
    let mut buf = [0u8; 16];
    assert_eq!(conn.read(&mut buf, 50), Ok(0));
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_peer_close_is_reported() {
    let (listener, port) = listener();
    let mut conn = TcpConnector::new().connect("127.0.0.1", port, 1000).unwrap();
    let (peer, _) = listener.accept().unwrap();
    drop(peer);

    let mut buf = [0u8; 16];
    assert_eq!(conn.read(&mut buf, 1000), Err(Error::ConnectionClosed));
    conn.close().unwrap();
}

#[test]
fn test_closed_port_is_refused() {
    let (listener, port) = listener();
    drop(listener);
    assert_eq!(
        TcpConnector::new().connect("127.0.0.1", port, 1000).unwrap_err(),
        Error::ConnectionRefused
    );
}

#[test]
fn test_client_session_over_loopback() {
    let (listener, port) = listener();
    let broker = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let connect = read_frame(&mut stream);
        assert_eq!(connect[0], 0x10);
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).unwrap();

        let subscribe = read_frame(&mut stream);
        assert_eq!(subscribe[0], 0x82);
        stream.write_all(&[0x90, 0x03, subscribe[2], subscribe[3], 0x00]).unwrap();
        // PUBLISH "t/1" = "hi"
        stream
            .write_all(&[0x30, 0x07, 0x00, 0x03, b't', b'/', b'1', b'h', b'i'])
            .unwrap();

        read_frame(&mut stream)
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    let options = Options::new("127.0.0.1", port, "loopback")
        .unwrap()
        .with_keep_alive(30);
    let client = Client::new(
        TcpConnector::new(),
        StdPlatform::new(),
        options,
        move |topic: &str, payload: &[u8]| {
            let _ = tx.send((topic.to_string(), payload.to_vec()));
        },
    )
    .unwrap();

    client.connect().unwrap();
    client.subscribe("t/+", QoS::AtMostOnce).unwrap();
    let (topic, payload) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(topic, "t/1");
    assert_eq!(payload, b"hi");

    client.disconnect();
    assert_eq!(broker.join().unwrap(), [0xE0, 0x00]);
}
