//! Common error types for network operations

/// Transport and wire level failures seen by the MQTT client.
///
/// Kept small and `Copy` so it can be logged and passed around freely in
/// `no_std` builds.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted without an established broker session.
    NotConnected,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The connection was closed by the peer.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A field did not fit in its fixed-size buffer.
    BufferOverflow,
    /// The peer sent something that is not valid MQTT 3.1.1.
    ProtocolError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
