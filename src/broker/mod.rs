//! The broker core: topic matching, the subscription registry, the
//! per-connection session state machine and the controller that ties them
//! together and fans publishes out.

pub mod engine;
pub mod message;
pub mod registry;
pub mod session;
pub mod topic;

pub use engine::{Broker, Control};
