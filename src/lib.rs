//! # mqtt-comm
//!
//! MQTT communication layer for embedded sensor nodes. It binds application
//! code to an MQTT 3.1.1 client, reassembles fragmented inbound payloads into
//! fixed-size buffers, parses them as timestamped readings and drops replays.
//! Designed for `no_std` targets without an allocator.
//!
//! ## Receiving readings
//!
//! ```rust
//! use mqtt_comm::network::application::mqtt::{InboundHandler, Reading, Receiver, ReplayConfig};
//!
//! let mut latest = None;
//! let mut receiver = Receiver::new(
//!     |_topic: &str, reading: Reading| latest = Some(reading.timestamp),
//!     ReplayConfig::default(),
//! );
//!
//! // Notifications as the network stack would deliver them.
//! receiver.on_publish_start("sensors/temp", 23);
//! receiver.on_data_fragment(br#"{"valor":3.50,"#, false);
//! receiver.on_data_fragment(br#""ts":100}"#, true);
//!
//! // A replay of the same timestamp is dropped.
//! receiver.on_publish_start("sensors/temp", 23);
//! receiver.on_data_fragment(br#"{"valor":4.00,"ts":100}"#, true);
//!
//! assert_eq!(receiver.guard().last_accepted(), 100);
//! drop(receiver);
//! assert_eq!(latest, Some(100));
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Log through `defmt` on embedded targets
//! - `tracing`: Log through `tracing` on hosted targets

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer and the MQTT communication layer built on it.
pub mod network;
