//! Per-connection protocol state machine
//!
//! `AwaitingConnect -> Connected -> Closed`, never backwards. A session turns
//! one decoded command into registry mutations and at most one outcome for
//! the broker to act on.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::broker::message::{Command, ConnectStatus, PublishedMessage, QoS, Response};
use crate::broker::registry::SubscriptionRegistry;
use crate::client::{Client, ConnectionId};
use crate::utils::error::SessionError;

/// Shortest CONNECT frame that can carry a protocol level byte.
pub const MIN_CONNECT_FRAME_LEN: usize = 9;

/// Protocol level of MQTT 3.1.1, the only one accepted.
pub const SUPPORTED_PROTOCOL_VERSION: u8 = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    AwaitingConnect,
    Connected,
    Closed,
}

/// What the broker must do after a command was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this frame back on the same connection.
    Reply(Response),
    /// Route the message to matching subscribers.
    Forward(PublishedMessage),
    /// The client asked to disconnect.
    Disconnect,
    Ignored,
}

#[derive(Debug)]
pub struct Session {
    pub client: Client,
    state: SessionState,
    connected_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: SessionState::AwaitingConnect,
            connected_at: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.client.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(
        &mut self,
        command: Command,
        registry: &mut SubscriptionRegistry,
    ) -> Result<Outcome, SessionError> {
        match self.state {
            SessionState::AwaitingConnect => self.handle_connect(command),
            SessionState::Connected => Ok(self.handle_connected(command, registry)),
            SessionState::Closed => Ok(Outcome::Ignored),
        }
    }

    fn handle_connect(&mut self, command: Command) -> Result<Outcome, SessionError> {
        let (protocol_version, raw_length) = match command {
            Command::Connect {
                protocol_version,
                raw_length,
            } => (protocol_version, raw_length),
            other => {
                return Err(SessionError::NotConnected {
                    command: other.name(),
                });
            }
        };

        if raw_length < MIN_CONNECT_FRAME_LEN {
            return Err(SessionError::MalformedConnect { length: raw_length });
        }
        if protocol_version != SUPPORTED_PROTOCOL_VERSION {
            return Err(SessionError::UnsupportedVersion(protocol_version));
        }

        self.state = SessionState::Connected;
        self.connected_at = Some(Utc::now());
        info!("{} connected", self.id());

        Ok(Outcome::Reply(Response::ConnAck {
            status: ConnectStatus::Accepted,
        }))
    }

    fn handle_connected(&mut self, command: Command, registry: &mut SubscriptionRegistry) -> Outcome {
        let id = self.id();
        match command {
            Command::Subscribe { packet_id, topics } => {
                let granted: Vec<QoS> = topics
                    .into_iter()
                    .map(|(pattern, qos)| {
                        info!("{} SUB [{}] qos {}", id, pattern, u8::from(qos));
                        registry.subscribe(id, &pattern, qos);
                        qos
                    })
                    .collect();
                Outcome::Reply(Response::SubAck { packet_id, granted })
            }
            Command::Unsubscribe { packet_id, topics } => {
                for pattern in &topics {
                    if registry.unsubscribe(&id, pattern) {
                        info!("{} UNSUB [{}]", id, pattern);
                    }
                }
                Outcome::Reply(Response::UnsubAck { packet_id })
            }
            Command::Publish(message) => Outcome::Forward(message),
            Command::PingReq => Outcome::Reply(Response::PingResp),
            Command::Disconnect => Outcome::Disconnect,
            other => {
                warn!("{} sent {} while connected, ignoring", id, other.name());
                Outcome::Ignored
            }
        }
    }

    /// Moves the session to `Closed` and drops its subscriptions. Returns
    /// false if it was already closed, in which case nothing is touched.
    pub fn close(&mut self, registry: &mut SubscriptionRegistry) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;

        for sub in registry.unsubscribe_all(&self.id()) {
            info!("{} UNSUB [{}]", self.id(), sub.pattern.as_str());
        }

        match self.connected_at {
            Some(at) => {
                let secs = (Utc::now() - at).num_seconds();
                info!("{} closed after {}s", self.id(), secs);
            }
            None => info!("{} closed before connecting", self.id()),
        }
        true
    }
}
