use serde::Deserialize;

use crate::transport::codec::MAX_PACKET_SIZE;

/// Top-level configuration settings for the application.
///
/// Includes settings for the listener, the broker and logging.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the MQTT listener will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Connections accepted beyond this are dropped immediately.
    pub max_connections: usize,
    /// Largest inbound frame, fixed header included. Capped at what the
    /// remaining length field can express.
    pub max_packet_size: usize,
    /// Frames queued per connection before further deliveries are dropped.
    pub outbound_queue_capacity: usize,
    /// Replace instead of duplicate a repeated (connection, pattern) subscription.
    pub dedupe_subscriptions: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub max_packet_size: Option<usize>,
    pub outbound_queue_capacity: Option<usize>,
    pub dedupe_subscriptions: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1883,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            max_packet_size: 256 * 1024,
            outbound_queue_capacity: 1024,
            dedupe_subscriptions: false,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let broker = self.broker;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                max_packet_size: broker
                    .as_ref()
                    .and_then(|b| b.max_packet_size)
                    .unwrap_or(default.broker.max_packet_size)
                    .min(MAX_PACKET_SIZE),
                // a zero-capacity channel cannot be created
                outbound_queue_capacity: broker
                    .as_ref()
                    .and_then(|b| b.outbound_queue_capacity)
                    .unwrap_or(default.broker.outbound_queue_capacity)
                    .max(1),
                dedupe_subscriptions: broker
                    .as_ref()
                    .and_then(|b| b.dedupe_subscriptions)
                    .unwrap_or(default.broker.dedupe_subscriptions),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
