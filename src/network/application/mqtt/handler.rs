//! Notification interface between the MQTT client and the receive path.

/// Outcome of a connection attempt as reported by the broker's CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionStatus {
    /// Return code 0, the session is open.
    Accepted,
    /// Return codes 1 to 5 (bad protocol level, identifier rejected, server
    /// unavailable, bad credentials, not authorized).
    Refused(u8),
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionStatus::Accepted => defmt::write!(f, "Accepted"),
            ConnectionStatus::Refused(code) => defmt::write!(f, "Refused({})", code),
        }
    }
}

/// Receiver of inbound publish notifications.
///
/// The [`Client`](super::Client) calls these from [`poll`](super::Client::poll)
/// in strict order on a single execution context: one `on_publish_start`, then
/// `on_data_fragment` until a call with `last == true`. No call is ever
/// re-entered.
pub trait InboundHandler {
    /// A new publish arrived with `topic` and a payload of `total_len` bytes.
    fn on_publish_start(&mut self, topic: &str, total_len: u32);

    /// The next chunk of the current payload. `last` marks the final chunk.
    fn on_data_fragment(&mut self, data: &[u8], last: bool);

    /// Result of the connection attempt.
    fn on_connection_status(&mut self, status: ConnectionStatus);
}
