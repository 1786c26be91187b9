use crate::broker::message::{Command, ConnectStatus, Delivery, PublishedMessage, QoS, Response};
use crate::transport::codec::{MqttCodec, read_remaining_length, write_remaining_length};
use crate::transport::server::finish_writer;
use crate::utils::error::CodecError;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::sync::oneshot;

fn codec() -> MqttCodec {
    MqttCodec::new(1024)
}

fn connect_frame(level: u8) -> Vec<u8> {
    // CONNECT, protocol "MQTT", level, clean session, keep-alive 60, client id "c1"
    vec![
        0x10, 14, 0x00, 0x04, b'M', b'Q', b'T', b'T', level, 0x02, 0x00, 0x3C, 0x00, 0x02, b'c',
        b'1',
    ]
}

fn encode(response: &Response) -> Vec<u8> {
    let mut out = BytesMut::new();
    MqttCodec::encode(response, &mut out);
    out.to_vec()
}

#[test]
fn test_decode_connect() {
    let mut buf = BytesMut::from(&connect_frame(4)[..]);
    let command = codec().decode(&mut buf).unwrap().unwrap();
    assert_eq!(
        command,
        Command::Connect {
            protocol_version: 4,
            raw_length: 16
        }
    );
    assert!(buf.is_empty());
}

#[test]
fn test_decode_connect_reports_other_levels() {
    let mut buf = BytesMut::from(&connect_frame(5)[..]);
    match codec().decode(&mut buf).unwrap() {
        Some(Command::Connect {
            protocol_version, ..
        }) => assert_eq!(protocol_version, 5),
        other => panic!("Expected CONNECT, got {other:?}"),
    }
}

#[test]
fn test_decode_short_connect() {
    let mut buf = BytesMut::from(&[0x10u8, 2, 0x00, 0x04][..]);
    assert_eq!(
        codec().decode(&mut buf).unwrap(),
        Some(Command::Connect {
            protocol_version: 0,
            raw_length: 4
        })
    );
}

#[test]
fn test_decode_waits_for_full_frame() {
    let frame = connect_frame(4);
    let mut buf = BytesMut::from(&frame[..10]);
    assert_eq!(codec().decode(&mut buf).unwrap(), None);
    assert_eq!(buf.len(), 10);

    buf.extend_from_slice(&frame[10..]);
    assert!(codec().decode(&mut buf).unwrap().is_some());
}

#[test]
fn test_decode_publish_qos0() {
    let mut buf = BytesMut::from(&[0x31u8, 7, 0x00, 0x03, b'f', b'o', b'o', b'h', b'i'][..]);
    assert_eq!(
        codec().decode(&mut buf).unwrap(),
        Some(Command::Publish(PublishedMessage {
            topic: "foo".to_string(),
            payload: Bytes::from_static(b"hi"),
            qos: QoS::AtMostOnce,
            retain: true,
        }))
    );
}

#[test]
fn test_decode_publish_qos1_skips_packet_id() {
    let mut buf = BytesMut::from(&[0x32u8, 6, 0x00, 0x01, b't', 0x00, 0x0A, b'x'][..]);
    match codec().decode(&mut buf).unwrap() {
        Some(Command::Publish(m)) => {
            assert_eq!(m.topic, "t");
            assert_eq!(m.qos, QoS::AtLeastOnce);
            assert_eq!(&m.payload[..], b"x");
        }
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_decode_publish_invalid_qos() {
    let mut buf = BytesMut::from(&[0x36u8, 3, 0x00, 0x01, b't'][..]);
    assert!(matches!(
        codec().decode(&mut buf),
        Err(CodecError::InvalidQos(3))
    ));
}

#[test]
fn test_decode_subscribe() {
    let mut buf = BytesMut::from(
        &[
            0x82u8, 12, 0x00, 0x05, 0x00, 0x03, b'a', b'/', b'+', 0x01, 0x00, 0x01, b'#', 0x00,
        ][..],
    );
    assert_eq!(
        codec().decode(&mut buf).unwrap(),
        Some(Command::Subscribe {
            packet_id: 5,
            topics: vec![
                ("a/+".to_string(), QoS::AtLeastOnce),
                ("#".to_string(), QoS::AtMostOnce)
            ],
        })
    );
}

#[test]
fn test_decode_subscribe_without_filters() {
    let mut buf = BytesMut::from(&[0x82u8, 2, 0x00, 0x05][..]);
    assert!(matches!(
        codec().decode(&mut buf),
        Err(CodecError::EmptySubscription)
    ));
}

#[test]
fn test_decode_subscribe_truncated() {
    let mut buf = BytesMut::from(&[0x82u8, 5, 0x00, 0x05, 0x00, 0x01, b'a'][..]);
    assert!(matches!(
        codec().decode(&mut buf),
        Err(CodecError::Truncated { packet: "SUBSCRIBE" })
    ));
}

#[test]
fn test_decode_unsubscribe() {
    let mut buf = BytesMut::from(&[0xA2u8, 5, 0x00, 0x07, 0x00, 0x01, b'a'][..]);
    assert_eq!(
        codec().decode(&mut buf).unwrap(),
        Some(Command::Unsubscribe {
            packet_id: 7,
            topics: vec!["a".to_string()],
        })
    );
}

#[test]
fn test_decode_control_packets_back_to_back() {
    let mut buf = BytesMut::from(&[0xC0u8, 0, 0x40, 2, 0x00, 0x01, 0xE0, 0][..]);
    let c = codec();
    assert_eq!(c.decode(&mut buf).unwrap(), Some(Command::PingReq));
    assert_eq!(c.decode(&mut buf).unwrap(), Some(Command::Other(4)));
    assert_eq!(c.decode(&mut buf).unwrap(), Some(Command::Disconnect));
    assert_eq!(c.decode(&mut buf).unwrap(), None);
}

#[test]
fn test_decode_rejects_oversized_packet() {
    let mut buf = BytesMut::from(&[0x30u8, 0xFF, 0x7F][..]);
    assert!(matches!(
        codec().decode(&mut buf),
        Err(CodecError::PacketTooLarge { size: 16386, max: 1024 })
    ));
}

#[test]
fn test_remaining_length() {
    assert_eq!(read_remaining_length(&[0x00]).unwrap(), Some((0, 1)));
    assert_eq!(read_remaining_length(&[0x7F]).unwrap(), Some((127, 1)));
    assert_eq!(read_remaining_length(&[0x80, 0x01]).unwrap(), Some((128, 2)));
    assert_eq!(read_remaining_length(&[0x80]).unwrap(), None);
    assert!(read_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]).is_err());

    let mut out = BytesMut::new();
    write_remaining_length(321, &mut out);
    assert_eq!(&out[..], &[0xC1, 0x02]);
}

#[test]
fn test_encode_connack() {
    assert_eq!(
        encode(&Response::ConnAck {
            status: ConnectStatus::Accepted
        }),
        vec![0x20, 2, 0, 0]
    );
    assert_eq!(
        encode(&Response::ConnAck {
            status: ConnectStatus::UnsupportedVersion
        }),
        vec![0x20, 2, 0, 1]
    );
    assert!(
        encode(&Response::ConnAck {
            status: ConnectStatus::Malformed
        })
        .is_empty()
    );
}

#[test]
fn test_encode_suback() {
    assert_eq!(
        encode(&Response::SubAck {
            packet_id: 0x0102,
            granted: vec![QoS::AtMostOnce, QoS::ExactlyOnce],
        }),
        vec![0x90, 4, 0x01, 0x02, 0, 2]
    );
}

#[test]
fn test_encode_unsuback_and_pingresp() {
    assert_eq!(encode(&Response::UnsubAck { packet_id: 3 }), vec![0xB0, 2, 0, 3]);
    assert_eq!(encode(&Response::PingResp), vec![0xD0, 0]);
}

#[test]
fn test_encode_publish_delivery() {
    let bytes = encode(&Response::Publish(Delivery {
        topic: "foo".to_string(),
        payload: Bytes::from_static(b"hi"),
        qos: QoS::AtLeastOnce,
    }));
    assert_eq!(bytes, vec![0x30, 7, 0x00, 0x03, b'f', b'o', b'o', b'h', b'i']);
}

#[test]
fn test_encode_publish_with_oversized_topic_writes_nothing() {
    let bytes = encode(&Response::Publish(Delivery {
        topic: "a".repeat(70_000),
        payload: Bytes::from_static(b"hi"),
        qos: QoS::AtMostOnce,
    }));
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_finish_writer_waits_for_a_draining_writer() {
    let handle = tokio::spawn(async {});
    assert!(finish_writer(handle, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_finish_writer_aborts_a_stuck_writer() {
    // stands in for a write_all that a non-reading peer never lets finish
    let (alive, gone) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _alive = alive;
        std::future::pending::<()>().await;
    });

    assert!(!finish_writer(handle, Duration::from_millis(50)).await);
    // the aborted task drops its sender
    let dropped = tokio::time::timeout(Duration::from_secs(1), gone).await;
    assert!(matches!(dropped, Ok(Err(_))));
}
