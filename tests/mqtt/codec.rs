use libmqtt::network::application::mqtt::codec::{
    self, FixedHeader, MAX_REMAINING_LENGTH, Packet, PacketType, Publish,
};
use libmqtt::{Error, QoS};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};

fn random_topic(rng: &mut impl Rng) -> String {
    let segments = rng.gen_range(1..=4);
    (0..segments)
        .map(|_| {
            let len = rng.gen_range(1..=12);
            (0..len)
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[test]
fn test_publish_survives_encode_and_decode() {
    let mut rng = thread_rng();
    let mut buf = [0u8; 1024];

    for _ in 0..200 {
        let topic = random_topic(&mut rng);
        let payload: Vec<u8> = (0..rng.gen_range(0..600)).map(|_| rng.r#gen()).collect();
        let qos = if rng.gen_bool(0.5) {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        let publish = Publish {
            topic: &topic,
            payload: &payload,
            qos,
            packet_id: (qos == QoS::AtLeastOnce).then(|| rng.gen_range(1..=u16::MAX)),
            retain: rng.r#gen(),
            dup: rng.r#gen(),
        };

        let len = codec::pack_publish(&mut buf, &publish).unwrap();
        let header = codec::parse_fixed_header(&buf[..len]).unwrap().unwrap();
        assert_eq!(header.frame_len(), len);
        assert_eq!(codec::decode(&buf[..len]), Ok(Packet::Publish(publish)));
    }
}

#[test]
fn test_remaining_length_survives_encode_and_decode() {
    let mut rng = thread_rng();
    for _ in 0..1000 {
        let value = rng.gen_range(0..=MAX_REMAINING_LENGTH);
        let mut out = [0u8; 4];
        let used = codec::encode_remaining_length(value, &mut out).unwrap();
        assert_eq!(
            codec::decode_remaining_length(&out[..used]),
            Ok(Some((value, used)))
        );
        // Any strict prefix is incomplete rather than wrong.
        assert_eq!(codec::decode_remaining_length(&out[..used - 1]), Ok(None));
    }
}

#[test]
fn test_fifth_length_byte_is_rejected() {
    let frame = [0x30, 0x80, 0x80, 0x80, 0x80, 0x01];
    assert_eq!(
        codec::parse_fixed_header(&frame),
        Err(Error::MalformedRemainingLength)
    );
}

#[test]
fn test_fixed_header_of_large_publish() {
    let mut buf = [0u8; 1024];
    let payload = [0xA5u8; 300];
    let publish = Publish {
        topic: "bulk",
        payload: &payload,
        qos: QoS::AtMostOnce,
        packet_id: None,
        retain: false,
        dup: false,
    };
    let len = codec::pack_publish(&mut buf, &publish).unwrap();
    assert_eq!(
        codec::parse_fixed_header(&buf[..len]),
        Ok(Some(FixedHeader {
            packet_type: PacketType::Publish,
            flags: 0,
            remaining_length: 306,
            header_len: 3,
        }))
    );
}

#[test]
fn test_truncated_publish_never_panics() {
    let mut rng = thread_rng();
    let mut buf = [0u8; 256];
    let publish = Publish {
        topic: "devices/42/state",
        payload: b"{\"on\":true}",
        qos: QoS::AtLeastOnce,
        packet_id: Some(9),
        retain: false,
        dup: false,
    };
    let len = codec::pack_publish(&mut buf, &publish).unwrap();

    for cut in 0..len {
        assert!(codec::decode(&buf[..cut]).is_err(), "prefix of {} bytes", cut);
    }
    // Random garbage must be rejected or decoded, never read out of bounds.
    for _ in 0..500 {
        let n = rng.gen_range(0..32);
        let junk: Vec<u8> = (0..n).map(|_| rng.r#gen()).collect();
        let _ = codec::decode(&junk);
    }
}
