//! MQTT communication layer for sensor nodes.
//!
//! The layer sits between the application and an MQTT 3.1.1 [`Client`]:
//!
//! ```text
//!  Client::poll ──► on_publish_start ──► Reassembler::begin
//!               └─► on_data_fragment ──► Reassembler::push_fragment
//!                                            │ (final fragment)
//!                                            ▼
//!                                   parse_reading ─► ReplayGuard::admit ─► ReadingSink
//! ```
//!
//! Inbound publishes arrive as a header notification followed by payload
//! fragments. The [`Reassembler`] collects them into fixed-size buffers, and
//! on the final fragment the payload is parsed as a [`Reading`] and checked
//! by the [`ReplayGuard`]: only readings whose timestamp is strictly newer
//! than the last accepted one reach the [`ReadingSink`].
//!
//! [`MqttComm`] wraps it all behind setup / publish / subscribe / poll. All
//! notification handlers run to completion on the caller's context; nothing
//! here is shared between threads.

mod client;
mod comm;
mod error;
mod handler;
mod reading;
mod reassembly;
mod receiver;
mod replay;

pub use client::{
    Client, Event, MAX_PENDING_SUBSCRIPTIONS, MAX_WIRE_TOPIC, MQTT_PORT, Options, QoS,
    RX_FRAGMENT_SIZE, SubAck,
};
pub use comm::MqttComm;
pub use error::CommError;
pub use handler::{ConnectionStatus, InboundHandler};
pub use reading::{MAX_READING_LEN, Reading, encode_reading, parse_reading};
pub use reassembly::{MAX_PAYLOAD_SIZE, MAX_TOPIC_SIZE, Reassembler};
pub use receiver::{ReadingSink, Receiver};
pub use replay::{ReplayConfig, ReplayGuard};
