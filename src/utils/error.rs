//! The `error` module defines the error types used within the `popmqtt` broker.
//!
//! Errors are grouped by the layer that raises them. Any error returned from
//! the broker's `on_command` entry point is fatal to that one connection only:
//! the transport closes it and the rest of the broker carries on.

use thiserror::Error;

use crate::broker::message::ConnectStatus;
use crate::client::ConnectionId;

/// Protocol violations detected by a single session's state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed CONNECT frame ({length} bytes)")]
    MalformedConnect { length: usize },

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("{command} received before CONNECT")]
    NotConnected { command: &'static str },
}

impl SessionError {
    /// The connect-ack status to emit before the connection is dropped,
    /// if the protocol has one for this violation.
    pub fn connack_status(&self) -> Option<ConnectStatus> {
        match self {
            SessionError::MalformedConnect { .. } => Some(ConnectStatus::Malformed),
            SessionError::UnsupportedVersion(_) => Some(ConnectStatus::UnsupportedVersion),
            SessionError::NotConnected { .. } => None,
        }
    }
}

/// Errors surfaced by the broker controller to the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no session registered for {0}")]
    UnknownConnection(ConnectionId),
}

/// A frame could not be queued for a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Disconnected(ConnectionId),

    #[error("outbound queue of {0} is full")]
    QueueFull(ConnectionId),
}

/// Wire-level decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed remaining length")]
    MalformedRemainingLength,

    #[error("packet of {size} bytes exceeds the {max} byte limit")]
    PacketTooLarge { size: usize, max: usize },

    #[error("invalid QoS level {0}")]
    InvalidQos(u8),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("truncated {packet} packet")]
    Truncated { packet: &'static str },

    #[error("SUBSCRIBE without any topic filter")]
    EmptySubscription,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
