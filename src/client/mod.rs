//! The `client` module defines the representation of a connection in the broker.
//!
//! It provides the `Client` struct, which pairs the connection identity with
//! the channel the transport drains to write frames back to the socket.

pub mod pubsub_client;
pub use pubsub_client::{Client, ConnectionId};
