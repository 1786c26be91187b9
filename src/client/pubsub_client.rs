use std::fmt;

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::broker::message::Response;
use crate::utils::error::DeliveryError;

/// Opaque, process-unique handle for one network session.
///
/// Created by the transport when a connection is accepted. The broker only
/// stores and compares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0.simple())
    }
}

/// Represents a connected MQTT client.
///
/// Each client is uniquely identified by an `id` and has a bounded channel
/// (`sender`) feeding the transport's writer for that connection.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: ConnectionId,

    /// Channel to hand response frames to the transport.
    pub sender: Sender<Response>,
}

impl Client {
    pub fn new(sender: Sender<Response>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// Queue a frame for this connection. Never blocks: fails when the
    /// queue is full or the transport side of the channel has gone away.
    pub fn send(&self, response: Response) -> Result<(), DeliveryError> {
        self.sender.try_send(response).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull(self.id),
            TrySendError::Closed(_) => DeliveryError::Disconnected(self.id),
        })
    }
}
