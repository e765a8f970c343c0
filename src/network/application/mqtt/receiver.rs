//! Receive path: reassembly, parsing, replay check and downstream hand-off.

use super::error::CommError;
use super::handler::{ConnectionStatus, InboundHandler};
use super::reading::{Reading, parse_reading};
use super::reassembly::{MAX_PAYLOAD_SIZE, MAX_TOPIC_SIZE, Reassembler};
use super::replay::{ReplayConfig, ReplayGuard};

/// Downstream consumer of fresh readings.
pub trait ReadingSink {
    /// Called once per accepted, non-replayed reading.
    fn on_reading(&mut self, topic: &str, reading: Reading);
}

impl<F: FnMut(&str, Reading)> ReadingSink for F {
    fn on_reading(&mut self, topic: &str, reading: Reading) {
        self(topic, reading)
    }
}

/// [`InboundHandler`] that turns fragment notifications into readings.
///
/// Every rejection is logged and swallowed; the only observable effects are
/// the log and the readings that reach the sink.
#[derive(Debug)]
pub struct Receiver<S> {
    reassembler: Reassembler,
    guard: ReplayGuard,
    sink: S,
}

impl<S: ReadingSink> Receiver<S> {
    /// Creates a receiver delivering to `sink`.
    pub fn new(sink: S, config: ReplayConfig) -> Self {
        Self {
            reassembler: Reassembler::new(),
            guard: ReplayGuard::new(config),
            sink,
        }
    }

    /// Reassembly state.
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Replay state.
    pub fn guard(&self) -> &ReplayGuard {
        &self.guard
    }

    /// The downstream sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the downstream sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Runs a complete message through the parser and the replay guard,
    /// forwarding it downstream when fresh.
    pub fn process(&mut self, topic: &str, payload: &[u8]) -> Result<Reading, CommError> {
        process_message(&mut self.guard, &mut self.sink, topic, payload)
    }
}

fn process_message<S: ReadingSink>(
    guard: &mut ReplayGuard,
    sink: &mut S,
    topic: &str,
    payload: &[u8],
) -> Result<Reading, CommError> {
    let reading = parse_reading(payload).inspect_err(|_| {
        error!("malformed payload on '{}' ({} bytes)", topic, payload.len());
    })?;

    let last = guard.last_accepted();
    guard.admit(reading.timestamp).inspect_err(|_| {
        warn!("replay detected (ts: {} <= {})", reading.timestamp, last);
    })?;

    info!("new reading: {} (ts: {})", reading.value, reading.timestamp);
    sink.on_reading(topic, reading);
    Ok(reading)
}

impl<S: ReadingSink> InboundHandler for Receiver<S> {
    fn on_publish_start(&mut self, topic: &str, total_len: u32) {
        debug!("publish start: topic '{}', {} payload bytes", topic, total_len);

        match self.reassembler.begin(topic, total_len) {
            Ok(()) => {}
            Err(CommError::TopicTooLong) => warn!(
                "topic too long ({} bytes, max {})",
                topic.len(),
                MAX_TOPIC_SIZE - 2
            ),
            Err(_) => warn!(
                "payload too large ({} bytes, max {})",
                total_len,
                MAX_PAYLOAD_SIZE - 2
            ),
        }
    }

    fn on_data_fragment(&mut self, data: &[u8], last: bool) {
        let guard = &mut self.guard;
        let sink = &mut self.sink;

        let pushed = self.reassembler.push_fragment(data, last, |message| {
            debug!("message complete ({} bytes)", message.payload().len());
            process_message(guard, sink, message.topic(), message.payload())
        });

        if pushed.is_err() {
            warn!(
                "payload buffer exceeded, dropping {} byte fragment",
                data.len()
            );
        }
    }

    fn on_connection_status(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Accepted => info!("connected to MQTT broker"),
            ConnectionStatus::Refused(code) => {
                error!("broker refused connection, code {}", code)
            }
        }
    }
}
