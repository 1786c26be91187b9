//! The `transport` module is responsible for network communication with
//! clients over plain TCP.
//!
//! It implements the MQTT 3.1.1 frame codec, which turns bytes into the
//! broker's `Command` events and `Response` frames back into bytes, and the
//! TCP server that runs one reader loop and one writer task per connection.

pub mod codec;
pub mod server;

#[cfg(test)]
mod tests;
