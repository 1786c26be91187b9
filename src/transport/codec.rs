//! MQTT 3.1.1 frame codec
//!
//! Only the subset the broker acts on is decoded field by field: CONNECT,
//! PUBLISH, SUBSCRIBE, UNSUBSCRIBE, PINGREQ and DISCONNECT. Every other
//! packet type is consumed whole and surfaced as `Command::Other`.
//!
//! Outbound publishes are always written at QoS 0 with the retain flag
//! cleared. The broker does not track packet identifiers for deliveries.
//! A delivery whose topic or size cannot be expressed on the wire is
//! dropped rather than written truncated.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::broker::message::{Command, ConnectStatus, PublishedMessage, QoS, Response};
use crate::utils::error::CodecError;

pub const CONNECT: u8 = 1;
pub const CONNACK: u8 = 2;
pub const PUBLISH: u8 = 3;
pub const SUBSCRIBE: u8 = 8;
pub const SUBACK: u8 = 9;
pub const UNSUBSCRIBE: u8 = 10;
pub const UNSUBACK: u8 = 11;
pub const PINGREQ: u8 = 12;
pub const PINGRESP: u8 = 13;
pub const DISCONNECT: u8 = 14;

/// Largest value the four-byte remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Largest complete frame: type byte, four length bytes, body.
pub const MAX_PACKET_SIZE: usize = 1 + 4 + MAX_REMAINING_LENGTH;

#[derive(Debug, Clone, Copy)]
pub struct MqttCodec {
    max_packet_size: usize,
}

impl MqttCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Takes one complete frame off the front of `buf`. Returns `Ok(None)`
    /// and leaves `buf` untouched when more bytes are needed.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Command>, CodecError> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let Some((remaining, length_bytes)) = read_remaining_length(&buf[1..])? else {
            return Ok(None);
        };

        let frame_len = 1 + length_bytes + remaining;
        if frame_len > self.max_packet_size {
            return Err(CodecError::PacketTooLarge {
                size: frame_len,
                max: self.max_packet_size,
            });
        }
        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        let mut body = buf.split_to(frame_len).freeze();
        let first = body.get_u8();
        body.advance(length_bytes);

        let packet_type = first >> 4;
        let flags = first & 0x0F;
        let command = match packet_type {
            CONNECT => decode_connect(&body, frame_len),
            PUBLISH => decode_publish(flags, body)?,
            SUBSCRIBE => decode_subscribe(body)?,
            UNSUBSCRIBE => decode_unsubscribe(body)?,
            PINGREQ => Command::PingReq,
            DISCONNECT => Command::Disconnect,
            other => Command::Other(other),
        };
        Ok(Some(command))
    }

    /// Appends the wire form of `response` to `dst`. Writes nothing for a
    /// CONNACK reporting a malformed CONNECT, which 3.1.1 has no code for,
    /// or for a publish that does not fit in a frame.
    pub fn encode(response: &Response, dst: &mut BytesMut) {
        match response {
            Response::ConnAck { status } => {
                let code = match status {
                    ConnectStatus::Accepted => 0x00,
                    ConnectStatus::UnsupportedVersion => 0x01,
                    ConnectStatus::Malformed => return,
                };
                dst.put_slice(&[CONNACK << 4, 2, 0, code]);
            }
            Response::SubAck { packet_id, granted } => {
                dst.put_u8(SUBACK << 4);
                write_remaining_length(2 + granted.len(), dst);
                dst.put_u16(*packet_id);
                dst.extend(granted.iter().map(|q| u8::from(*q)));
            }
            Response::UnsubAck { packet_id } => {
                dst.put_slice(&[UNSUBACK << 4, 2]);
                dst.put_u16(*packet_id);
            }
            Response::PingResp => dst.put_slice(&[PINGRESP << 4, 0]),
            Response::Publish(delivery) => {
                let Ok(topic_len) = u16::try_from(delivery.topic.len()) else {
                    warn!("Dropping delivery: topic of {} bytes", delivery.topic.len());
                    return;
                };
                let remaining = 2 + delivery.topic.len() + delivery.payload.len();
                if remaining > MAX_REMAINING_LENGTH {
                    warn!("Dropping delivery: {} byte frame body", remaining);
                    return;
                }
                dst.put_u8(PUBLISH << 4);
                write_remaining_length(remaining, dst);
                dst.put_u16(topic_len);
                dst.put_slice(delivery.topic.as_bytes());
                dst.put_slice(&delivery.payload);
            }
        }
    }
}

/// Decodes the variable-length remaining length field. `Ok(None)` when the
/// field itself is not complete yet. On success returns the value and how
/// many bytes encoded it.
pub fn read_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut value = 0usize;
    for (i, byte) in bytes.iter().take(4).enumerate() {
        value |= ((byte & 0x7F) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if bytes.len() >= 4 {
        Err(CodecError::MalformedRemainingLength)
    } else {
        Ok(None)
    }
}

pub fn write_remaining_length(mut len: usize, dst: &mut BytesMut) {
    debug_assert!(len <= MAX_REMAINING_LENGTH);
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

/// Reports the protocol level byte that follows the protocol name, or 0 if
/// the frame is too short to hold one. Validation is the session's job.
fn decode_connect(body: &Bytes, frame_len: usize) -> Command {
    let protocol_version = if body.len() >= 2 {
        let name_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        body.get(2 + name_len).copied().unwrap_or(0)
    } else {
        0
    };
    Command::Connect {
        protocol_version,
        raw_length: frame_len,
    }
}

fn decode_publish(flags: u8, mut body: Bytes) -> Result<Command, CodecError> {
    let qos = QoS::try_from((flags >> 1) & 0x03)?;
    let retain = flags & 0x01 == 0x01;
    let topic = read_string(&mut body, "PUBLISH")?;
    if qos != QoS::AtMostOnce {
        // packet identifier, unused without acknowledgements
        read_u16(&mut body, "PUBLISH")?;
    }
    Ok(Command::Publish(PublishedMessage {
        topic,
        payload: body,
        qos,
        retain,
    }))
}

fn decode_subscribe(mut body: Bytes) -> Result<Command, CodecError> {
    let packet_id = read_u16(&mut body, "SUBSCRIBE")?;
    let mut topics = Vec::new();
    while body.has_remaining() {
        let filter = read_string(&mut body, "SUBSCRIBE")?;
        if !body.has_remaining() {
            return Err(CodecError::Truncated { packet: "SUBSCRIBE" });
        }
        let qos = QoS::try_from(body.get_u8())?;
        topics.push((filter, qos));
    }
    if topics.is_empty() {
        return Err(CodecError::EmptySubscription);
    }
    Ok(Command::Subscribe { packet_id, topics })
}

fn decode_unsubscribe(mut body: Bytes) -> Result<Command, CodecError> {
    let packet_id = read_u16(&mut body, "UNSUBSCRIBE")?;
    let mut topics = Vec::new();
    while body.has_remaining() {
        topics.push(read_string(&mut body, "UNSUBSCRIBE")?);
    }
    Ok(Command::Unsubscribe { packet_id, topics })
}

fn read_u16(body: &mut Bytes, packet: &'static str) -> Result<u16, CodecError> {
    if body.remaining() < 2 {
        return Err(CodecError::Truncated { packet });
    }
    Ok(body.get_u16())
}

fn read_string(body: &mut Bytes, packet: &'static str) -> Result<String, CodecError> {
    let len = read_u16(body, packet)? as usize;
    if body.remaining() < len {
        return Err(CodecError::Truncated { packet });
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}
