//! # Application Layer Protocols
//!
//! Protocol clients built on top of the [`Connection`](crate::network::Connection)
//! traits. Every client here uses fixed-size buffers and no heap allocation.

/// MQTT communication layer.
///
/// Wraps an MQTT 3.1.1 client with inbound fragment reassembly, a typed
/// sensor reading parser and a timestamp based replay guard.
pub mod mqtt;
