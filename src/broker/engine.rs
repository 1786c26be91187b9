//! Broker engine
//!
//! This module contains the broker controller responsible for:
//! - owning the subscription registry and one session per connection
//! - feeding decoded commands into the owning session
//! - routing published messages to every matching subscriber
//!
//! Concurrency and usage notes:
//! - The public API here is synchronous and designed to be held behind a
//!   lock (`Arc<Mutex<Broker>>`) by the transport layer, which serializes
//!   every registry operation. Sends only `try_send` onto each connection's
//!   bounded queue, so the lock is never held across network I/O.
//! - Routing is best-effort: a publish racing a subscribe from another
//!   connection may or may not reach the new subscriber, depending on which
//!   one takes the lock first.
//! - A destination whose channel has closed or whose queue is full is
//!   skipped; the publish still reaches every other subscriber.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::broker::message::{Command, Delivery, PublishedMessage, Response};
use crate::broker::registry::SubscriptionRegistry;
use crate::broker::session::{Outcome, Session, SessionState};
use crate::client::{Client, ConnectionId};
use crate::config::BrokerSettings;
use crate::utils::error::BrokerError;

/// What the transport should do with the connection after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Close,
}

#[derive(Debug, Default)]
pub struct Broker {
    registry: SubscriptionRegistry,
    sessions: HashMap<ConnectionId, Session>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: &BrokerSettings) -> Self {
        Self {
            registry: SubscriptionRegistry::with_dedupe(settings.dedupe_subscriptions),
            sessions: HashMap::new(),
        }
    }

    /// Starts tracking a freshly accepted connection. Its session waits for
    /// CONNECT.
    pub fn register_client(&mut self, client: Client) {
        debug!("Registered {}", client.id);
        self.sessions.insert(client.id, Session::new(client));
    }

    /// Entry point for every decoded frame of `connection`.
    ///
    /// An `Err` means the session was closed because of a protocol violation
    /// and the transport must drop the connection.
    pub fn on_command(
        &mut self,
        connection: &ConnectionId,
        command: Command,
    ) -> Result<Control, BrokerError> {
        let Some(session) = self.sessions.get_mut(connection) else {
            return Err(BrokerError::UnknownConnection(*connection));
        };

        match session.handle(command, &mut self.registry) {
            Ok(Outcome::Reply(response)) => {
                if let Err(e) = session.client.send(response) {
                    debug!("Dropping reply: {}", e);
                }
                Ok(Control::Continue)
            }
            Ok(Outcome::Forward(message)) => {
                let delivered = self.route(&message);
                info!(
                    "{} PUB [{}] {} bytes -> {} subscribers",
                    connection,
                    message.topic,
                    message.payload.len(),
                    delivered
                );
                Ok(Control::Continue)
            }
            Ok(Outcome::Disconnect) => {
                self.on_close(connection);
                Ok(Control::Close)
            }
            Ok(Outcome::Ignored) => Ok(Control::Continue),
            Err(err) => {
                warn!("Protocol violation from {}: {}", connection, err);
                if let Some(status) = err.connack_status() {
                    let _ = session.client.send(Response::ConnAck { status });
                }
                self.on_close(connection);
                Err(err.into())
            }
        }
    }

    /// Entry point for connection termination, whatever the cause. Safe to
    /// call more than once; only the first call touches the registry.
    pub fn on_close(&mut self, connection: &ConnectionId) -> bool {
        match self.sessions.remove(connection) {
            Some(mut session) => session.close(&mut self.registry),
            None => false,
        }
    }

    /// Fans `message` out to every matching subscription. Returns the number
    /// of frames handed to the transport.
    pub fn route(&self, message: &PublishedMessage) -> usize {
        let subscribers = self.registry.matching_subscribers(&message.topic);
        if subscribers.is_empty() {
            debug!("No subscribers for [{}]", message.topic);
            return 0;
        }

        let mut delivered = 0;
        for (connection, granted) in subscribers {
            let Some(session) = self.sessions.get(&connection) else {
                warn!("Subscription held by unknown {}, skipping", connection);
                continue;
            };
            let delivery = Delivery {
                topic: message.topic.clone(),
                payload: message.payload.clone(),
                qos: granted.min(message.qos),
            };
            match session.client.send(Response::Publish(delivery)) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Skipping delivery: {}", e),
            }
        }
        delivered
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn session_state(&self, connection: &ConnectionId) -> Option<SessionState> {
        self.sessions.get(connection).map(Session::state)
    }

    /// Number of connections with an open session.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }
}
