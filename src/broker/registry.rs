//! Subscription registry
//!
//! Maps each connection identity to the list of subscriptions it holds.
//! Removing a connection is a single key removal, so a closed connection
//! cannot leave entries behind.
//!
//! Concurrency note: the registry has no interior locking. It is owned by the
//! `Broker`, which the transport holds behind one mutex, so subscribe,
//! unsubscribe and matching are serialized against each other.

use std::collections::HashMap;

use tracing::debug;

use crate::broker::message::QoS;
use crate::broker::topic::TopicPattern;
use crate::client::ConnectionId;

/// One (pattern, qos) entry held by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub pattern: TopicPattern,
    pub qos: QoS,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<ConnectionId, Vec<Subscription>>,
    dedupe: bool,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `dedupe` is set, subscribing a connection to a pattern it already
    /// holds replaces the granted qos instead of adding a second entry.
    pub fn with_dedupe(dedupe: bool) -> Self {
        Self {
            subscriptions: HashMap::new(),
            dedupe,
        }
    }

    pub fn subscribe(&mut self, connection: ConnectionId, pattern: &str, qos: QoS) {
        let entries = self.subscriptions.entry(connection).or_default();

        if self.dedupe {
            if let Some(existing) = entries.iter_mut().find(|s| s.pattern.as_str() == pattern) {
                existing.qos = qos;
                return;
            }
        }

        entries.push(Subscription {
            pattern: TopicPattern::parse(pattern),
            qos,
        });
    }

    /// Removes every entry of `connection` for exactly this pattern.
    /// Returns true if anything was removed.
    pub fn unsubscribe(&mut self, connection: &ConnectionId, pattern: &str) -> bool {
        let Some(entries) = self.subscriptions.get_mut(connection) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|s| s.pattern.as_str() != pattern);
        let removed = entries.len() != before;

        if entries.is_empty() {
            self.subscriptions.remove(connection);
        }
        removed
    }

    /// Drops all subscriptions of `connection`. Returns them so the caller
    /// can log what went away; empty when there were none.
    pub fn unsubscribe_all(&mut self, connection: &ConnectionId) -> Vec<Subscription> {
        let removed = self.subscriptions.remove(connection).unwrap_or_default();
        debug!("Removed {} subscriptions of {}", removed.len(), connection);
        removed
    }

    /// Snapshot of every (connection, granted qos) whose pattern matches
    /// `topic`. A connection appears once per matching entry it holds.
    pub fn matching_subscribers(&self, topic: &str) -> Vec<(ConnectionId, QoS)> {
        self.subscriptions
            .iter()
            .flat_map(move |(connection, entries)| {
                entries
                    .iter()
                    .filter(move |s| s.pattern.matches(topic))
                    .map(move |s| (*connection, s.qos))
            })
            .collect()
    }

    pub fn subscriptions_of(&self, connection: &ConnectionId) -> &[Subscription] {
        self.subscriptions
            .get(connection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of entries across all connections.
    pub fn len(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
