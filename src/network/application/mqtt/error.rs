//! Error taxonomy of the communication layer.

/// Every way an inbound message or a broker operation can be rejected.
///
/// These are reported through the log. The building blocks
/// ([`Reassembler`](super::Reassembler), [`parse_reading`](super::parse_reading),
/// [`ReplayGuard`](super::ReplayGuard)) return them so callers and tests can
/// match on the outcome; the notification and façade layers only log them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommError {
    /// The topic of an incoming publish does not fit the topic buffer.
    TopicTooLong,
    /// The declared payload length does not fit the payload buffer.
    PayloadTooLarge,
    /// A single fragment would overflow the payload buffer and was dropped.
    FragmentOverflow,
    /// The reassembled payload is not a `{"valor":<float>,"ts":<u32>}` reading.
    MalformedPayload,
    /// The reading's timestamp is not newer than the last accepted one.
    ReplayDetected,
    /// The broker could not be reached or refused the session.
    ConnectFailure,
    /// A publish could not be submitted.
    PublishFailure,
    /// A subscribe could not be submitted or was rejected by the broker.
    SubscribeFailure,
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CommError::TopicTooLong => defmt::write!(f, "TopicTooLong"),
            CommError::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            CommError::FragmentOverflow => defmt::write!(f, "FragmentOverflow"),
            CommError::MalformedPayload => defmt::write!(f, "MalformedPayload"),
            CommError::ReplayDetected => defmt::write!(f, "ReplayDetected"),
            CommError::ConnectFailure => defmt::write!(f, "ConnectFailure"),
            CommError::PublishFailure => defmt::write!(f, "PublishFailure"),
            CommError::SubscribeFailure => defmt::write!(f, "SubscribeFailure"),
        }
    }
}
