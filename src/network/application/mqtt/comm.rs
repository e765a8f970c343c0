//! Application facing façade: setup, publish, subscribe and polling.
//!
//! Every operation reports failures through the log only. Nothing is retried
//! and nothing here reconnects; the application observes failures as the
//! absence of readings or through [`MqttComm::is_connected`].

use super::client::{Client, Event, MQTT_PORT, Options, QoS, SubAck};
use super::error::CommError;
use super::handler::ConnectionStatus;
use super::reading::{Reading, encode_reading};
use super::receiver::{Receiver, ReadingSink};
use super::replay::ReplayConfig;
use crate::network::error::Error;
use crate::network::{Connect, Connection};
use core::fmt::Write as _;
use core::net::Ipv4Addr;
use heapless::String;

/// `"255.255.255.255:65535"`
const MAX_REMOTE_LEN: usize = 21;

/// An MQTT session plus the receive path feeding `S`.
///
/// # Examples
///
/// ```rust,no_run
/// use mqtt_comm::network::application::mqtt::{MqttComm, Reading, ReplayConfig};
/// # use mqtt_comm::network::{Connect, Connection};
/// # struct Conn;
/// # impl Connection for Conn {}
/// # impl mqtt_comm::network::Read for Conn {
/// #     type Error = ();
/// #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
/// # }
/// # impl mqtt_comm::network::Write for Conn {
/// #     type Error = ();
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # impl mqtt_comm::network::Close for Conn {
/// #     type Error = ();
/// #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # struct Stack;
/// # impl Connect for Stack {
/// #     type Connection = Conn;
/// #     type Error = ();
/// #     fn connect(&mut self, _remote: &str) -> Result<Conn, ()> { Ok(Conn) }
/// # }
/// let mut stack = Stack;
/// let mut comm = MqttComm::new(
///     |topic: &str, reading: Reading| {
///         let _ = (topic, reading.value, reading.timestamp);
///     },
///     ReplayConfig::default(),
/// );
///
/// comm.setup(&mut stack, "bitdog-01", "192.168.1.10", None, None);
/// while !comm.is_connected() {
///     comm.poll();
/// }
/// comm.subscribe("escola/sala1/temperatura");
/// loop {
///     comm.poll();
/// }
/// ```
#[derive(Debug)]
pub struct MqttComm<C: Connection, S> {
    client: Option<Client<C>>,
    receiver: Receiver<S>,
}

impl<C: Connection, S: ReadingSink> MqttComm<C, S> {
    /// Creates a disconnected façade delivering fresh readings to `sink`.
    pub fn new(sink: S, config: ReplayConfig) -> Self {
        Self {
            client: None,
            receiver: Receiver::new(sink, config),
        }
    }

    /// True once the broker accepted the session and until it is lost.
    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(Client::is_accepted)
    }

    /// The receive path.
    pub fn receiver(&self) -> &Receiver<S> {
        &self.receiver
    }

    /// Mutable access to the receive path.
    pub fn receiver_mut(&mut self) -> &mut Receiver<S> {
        &mut self.receiver
    }

    /// Connects to the broker at `broker_ip` on port 1883.
    ///
    /// `broker_ip` must be a dotted IPv4 address. An invalid address or a
    /// transport that cannot be opened is logged and the call returns without
    /// a session. Otherwise CONNECT is sent and the call returns; the CONNACK
    /// is picked up by [`poll`](Self::poll) and its outcome goes to
    /// [`InboundHandler::on_connection_status`](super::InboundHandler::on_connection_status).
    /// Calling this again ends any existing session first.
    pub fn setup<N>(
        &mut self,
        network: &mut N,
        client_id: &str,
        broker_ip: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) where
        N: Connect<Connection = C>,
    {
        let Ok(address) = broker_ip.parse::<Ipv4Addr>() else {
            error!("invalid broker address '{}': {:?}", broker_ip, Error::InvalidAddress);
            return;
        };

        let mut remote: String<MAX_REMOTE_LEN> = String::new();
        if write!(remote, "{}:{}", address, MQTT_PORT).is_err() {
            error!("broker address does not fit: {:?}", Error::BufferOverflow);
            return;
        }

        self.end_session(true);

        let connection = match network.connect(&remote) {
            Ok(connection) => connection,
            Err(_) => {
                error!("failed to open transport to {}: {:?}", remote.as_str(), CommError::ConnectFailure);
                return;
            }
        };

        let options = Options {
            client_id,
            username,
            password: password.map(str::as_bytes),
            ..Options::new(client_id)
        };

        match Client::connect(connection, &options) {
            Ok(client) => {
                debug!("CONNECT sent to {}", remote.as_str());
                self.client = Some(client);
            }
            Err(e) => error!("MQTT connect failed: {:?} ({:?})", CommError::ConnectFailure, e),
        }
    }

    /// Publishes `data` to `topic` at QoS 0 without retain.
    pub fn publish(&mut self, topic: &str, data: &[u8]) {
        let Some(client) = self.session() else {
            error!("publish to '{}' failed: {:?}", topic, Error::NotConnected);
            return;
        };

        match client.publish(topic, data, QoS::AtMostOnce, false) {
            Ok(()) => debug!("published {} bytes to '{}'", data.len(), topic),
            Err(e) => error!("{:?} on '{}': {:?}", CommError::PublishFailure, topic, e),
        }
    }

    /// Publishes `reading` to `topic` in the `{"valor":..,"ts":..}` format.
    pub fn publish_reading(&mut self, topic: &str, reading: &Reading) {
        match encode_reading(reading) {
            Ok(payload) => self.publish(topic, payload.as_bytes()),
            Err(e) => error!("could not encode reading: {:?}", e),
        }
    }

    /// Requests a QoS 0 subscription to `topic`.
    ///
    /// The broker's answer is logged when [`poll`](Self::poll) reads it.
    pub fn subscribe(&mut self, topic: &str) {
        let Some(client) = self.session() else {
            error!("subscribe to '{}' failed: {:?}", topic, Error::NotConnected);
            return;
        };

        match client.subscribe(topic, QoS::AtMostOnce) {
            Ok(packet_id) => debug!("subscribe to '{}' sent (packet id {})", topic, packet_id),
            Err(e) => error!("{:?} on '{}': {:?}", CommError::SubscribeFailure, topic, e),
        }
    }

    /// Processes at most one inbound packet.
    ///
    /// Returns `true` when a complete packet was handled and more may be
    /// waiting, `false` when no data is available or there is no session. A
    /// refused CONNACK or a failing transport ends the session.
    pub fn poll(&mut self) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };

        match client.poll(&mut self.receiver) {
            Ok(Event::Idle) => false,
            Ok(Event::Publish | Event::Skipped | Event::Connected(ConnectionStatus::Accepted)) => true,
            Ok(Event::Connected(ConnectionStatus::Refused(_))) => {
                self.end_session(false);
                true
            }
            Ok(Event::Subscribed {
                packet_id,
                ack: SubAck::Granted(qos),
            }) => {
                info!("subscription {} granted at QoS {}", packet_id, qos as u8);
                true
            }
            Ok(Event::Subscribed {
                packet_id,
                ack: SubAck::Failure,
            }) => {
                error!("{:?}: broker rejected subscription {}", CommError::SubscribeFailure, packet_id);
                true
            }
            Err(e @ (Error::ProtocolError | Error::BufferOverflow)) => {
                warn!("discarding inbound packet: {:?}", e);
                true
            }
            Err(e) => {
                error!("connection lost: {:?}", e);
                self.end_session(false);
                false
            }
        }
    }

    /// Sends DISCONNECT and drops the session.
    pub fn disconnect(&mut self) {
        self.end_session(true);
    }

    fn session(&mut self) -> Option<&mut Client<C>> {
        self.client.as_mut().filter(|client| client.is_accepted())
    }

    /// Closes the current transport, sending DISCONNECT first when
    /// `notify_broker` is set and the broker had accepted the session.
    fn end_session(&mut self, notify_broker: bool) {
        let Some(client) = self.client.take() else {
            return;
        };
        let closed = if notify_broker && client.is_accepted() {
            client.disconnect()
        } else {
            client.close()
        };
        if let Err(e) = closed {
            warn!("failed to close session: {:?}", e);
        }
    }
}
