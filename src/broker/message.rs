//! Message definitions for the broker
//!
//! `Command` is what the codec hands the broker for every decoded frame;
//! `Response` is what the broker hands back for the codec to encode. Neither
//! type knows anything about the bit-level wire format.
//!
//! Notes on fields:
//! - `topic`: concrete topic name used for routing (publish) or a topic
//!   filter that may contain wildcards (subscribe/unsubscribe)
//! - `payload`: opaque bytes, shared between all deliveries of one publish
//! - `qos`: requested delivery level; only threaded through, at-most-once
//!   delivery is all the broker guarantees
//! - `retain`: carried from the publisher, no retained store exists

use bytes::Bytes;

use crate::utils::error::CodecError;

/// Delivery level, 0 to 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(CodecError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

/// A message published by a client. Lives for one routing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect {
        protocol_version: u8,
        raw_length: usize,
    },
    Subscribe {
        packet_id: u16,
        topics: Vec<(String, QoS)>,
    },
    Unsubscribe {
        packet_id: u16,
        topics: Vec<String>,
    },
    Publish(PublishedMessage),
    PingReq,
    Disconnect,
    /// Any packet type the broker does not act on, by its type nibble.
    Other(u8),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Connect { .. } => "CONNECT",
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::Unsubscribe { .. } => "UNSUBSCRIBE",
            Command::Publish(_) => "PUBLISH",
            Command::PingReq => "PINGREQ",
            Command::Disconnect => "DISCONNECT",
            Command::Other(_) => "OTHER",
        }
    }
}

/// Outcome of a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Accepted,
    UnsupportedVersion,
    Malformed,
}

/// A publish frame addressed to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: Bytes,
    /// Subscription's granted level, capped by the publisher's. Informational
    /// only: without acknowledgements the codec always writes QoS 0.
    pub qos: QoS,
}

/// An outbound frame, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ConnAck { status: ConnectStatus },
    SubAck { packet_id: u16, granted: Vec<QoS> },
    UnsubAck { packet_id: u16 },
    PingResp,
    Publish(Delivery),
}
