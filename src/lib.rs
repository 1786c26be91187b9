//! # PopMQTT
//!
//! `popmqtt` is a minimal, in-memory MQTT 3.1.1 broker built with Rust.
//! Clients connect over TCP, subscribe to topic filters (with `+` and `#`
//! wildcards), publish, and the broker fans every publish out to each
//! currently matching subscription at QoS 0.
//!
//! ## Core Modules
//!
//! - `broker`: topic matching, the subscription registry, per-connection
//!   sessions and the controller that routes publishes.
//! - `client`: the connection identity and its outbound channel.
//! - `config`: loads server configuration from file and environment.
//! - `transport`: the MQTT frame codec and the TCP server.
//! - `utils`: error types and logging setup.
//!
//! Nothing is persisted: subscriptions live as long as their connection.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
