//! MQTT 3.1.1 client used as the transport under the communication layer.
//!
//! The client frames CONNECT, PUBLISH, SUBSCRIBE and DISCONNECT packets.
//! Nothing is ever awaited: CONNECT and SUBSCRIBE return once sent, and their
//! acknowledgments are picked up by [`Client::poll`] along with inbound
//! PUBLISH packets. Inbound payloads are never buffered here; they are
//! streamed to an [`InboundHandler`] in chunks of at most [`RX_FRAGMENT_SIZE`]
//! bytes, the way a small embedded TCP/IP stack hands over data as it
//! arrives.
//!
//! A read returning `Ok(0)` only means that nothing is available yet. The
//! decoder keeps its position inside the current packet across calls, so a
//! packet split over any number of reads is decoded the same as a whole one.
use super::handler::{ConnectionStatus, InboundHandler};
use crate::network::error::Error;
use crate::network::{Close, Connection, Read, Write};
use heapless::Vec;

// MQTT Control Packet types
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const DISCONNECT: u8 = 0xE0;

// Protocol constants
const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

// CONNECT flags
const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

const SUBACK_FAILURE: u8 = 0x80;

/// Standard unencrypted MQTT port.
pub const MQTT_PORT: u16 = 1883;

/// Largest payload chunk handed to [`InboundHandler::on_data_fragment`].
pub const RX_FRAGMENT_SIZE: usize = 128;

/// Longest topic the client will decode off the wire.
pub const MAX_WIRE_TOPIC: usize = 256;

/// Subscriptions that may await their SUBACK at the same time.
pub const MAX_PENDING_SUBSCRIPTIONS: usize = 8;

/// Topic length, topic and packet identifier of an inbound PUBLISH.
const FIELDS_LEN: usize = 2 + MAX_WIRE_TOPIC + 2;

/// Quality of Service levels for MQTT messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// At most once delivery, no acknowledgment.
    AtMostOnce = 0,
    /// At least once delivery.
    AtLeastOnce = 1,
    /// Exactly once delivery.
    ExactlyOnce = 2,
}

/// Broker response to a SUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubAck {
    /// Subscription accepted with the given maximum QoS.
    Granted(QoS),
    /// Subscription rejected (return code `0x80`).
    Failure,
}

/// Options for configuring the MQTT client connection.
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    pub client_id: &'a str,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password. MQTT 3.1.1 only allows it together with a user name,
    /// so it is ignored when `username` is `None`.
    pub password: Option<&'a [u8]>,
    /// The keep-alive time in seconds. 0 disables keep-alive.
    pub keep_alive_seconds: u16,
    /// Whether to start a clean session.
    pub clean_session: bool,
}

impl<'a> Options<'a> {
    /// Anonymous clean session with a 60 second keep-alive.
    pub const fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            username: None,
            password: None,
            keep_alive_seconds: 60,
            clean_session: true,
        }
    }
}

/// What a call to [`Client::poll`] completed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    /// No complete packet yet, either no data or a partial packet.
    Idle,
    /// CONNACK received. The status was also passed to
    /// [`InboundHandler::on_connection_status`].
    Connected(ConnectionStatus),
    /// A PUBLISH was delivered to the handler.
    Publish,
    /// SUBACK received for the subscription sent with `packet_id`.
    Subscribed {
        /// Identifier returned by [`Client::subscribe`].
        packet_id: u16,
        /// Broker decision.
        ack: SubAck,
    },
    /// Another packet type was read and discarded.
    Skipped,
}

/// Position of the decoder inside the inbound stream.
#[derive(Debug, Clone, Copy)]
enum Rx {
    Header,
    Length {
        header: u8,
        value: usize,
        multiplier: usize,
    },
    Fields {
        header: u8,
        remaining: usize,
        need: usize,
    },
    Payload {
        left: usize,
    },
    Discard {
        left: usize,
    },
}

/// An MQTT 3.1.1 client.
#[derive(Debug)]
pub struct Client<C: Connection> {
    connection: C,
    packet_id: u16,
    accepted: bool,
    pending: Vec<u16, MAX_PENDING_SUBSCRIPTIONS>,
    rx: Rx,
    fields: [u8; FIELDS_LEN],
    filled: usize,
}

impl<C: Connection> Client<C> {
    /// Sends CONNECT over `connection`.
    ///
    /// The CONNACK is not awaited. It arrives through [`poll`](Self::poll) as
    /// [`Event::Connected`], and until then [`is_accepted`](Self::is_accepted)
    /// is false.
    ///
    /// # Errors
    ///
    /// * [`Error::BufferOverflow`] - client id or credentials too long
    /// * [`Error::WriteError`] - transport failure
    pub fn connect(mut connection: C, options: &Options) -> Result<Self, Error> {
        // --- Variable Header ---
        let mut vh: Vec<u8, 10> = Vec::new();
        push_field(&mut vh, PROTOCOL_NAME)?;
        vh.push(PROTOCOL_LEVEL).map_err(|_| Error::BufferOverflow)?;

        let mut connect_flags = 0;
        if options.clean_session {
            connect_flags |= FLAG_CLEAN_SESSION;
        }
        let password = options.username.and(options.password);
        if options.username.is_some() {
            connect_flags |= FLAG_USERNAME;
        }
        if password.is_some() {
            connect_flags |= FLAG_PASSWORD;
        }
        vh.push(connect_flags).map_err(|_| Error::BufferOverflow)?;
        vh.extend_from_slice(&options.keep_alive_seconds.to_be_bytes())
            .map_err(|_| Error::BufferOverflow)?;

        // --- Payload ---
        let mut payload: Vec<u8, 256> = Vec::new();
        push_field(&mut payload, options.client_id.as_bytes())?;
        if let Some(username) = options.username {
            push_field(&mut payload, username.as_bytes())?;
        }
        if let Some(password) = password {
            push_field(&mut payload, password)?;
        }

        write_packet(&mut connection, CONNECT, &[&vh[..], &payload[..]])?;

        Ok(Self {
            connection,
            packet_id: 0,
            accepted: false,
            pending: Vec::new(),
            rx: Rx::Header,
            fields: [0; FIELDS_LEN],
            filled: 0,
        })
    }

    /// True once the broker accepted the session.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Publishes `payload` to `topic`.
    ///
    /// For QoS 0 this is fire-and-forget. For higher levels a packet
    /// identifier is attached but the acknowledgment is not awaited.
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), Error> {
        let topic_len = field_len(topic.as_bytes())?;

        let mut flags = PUBLISH | ((qos as u8) << 1);
        if retain {
            flags |= 0x01;
        }

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.next_packet_id().to_be_bytes()),
        };
        let id_part: &[u8] = packet_id.as_ref().map_or(&[], |id| &id[..]);

        write_packet(
            &mut self.connection,
            flags,
            &[&topic_len[..], topic.as_bytes(), id_part, payload],
        )
    }

    /// Sends SUBSCRIBE for `topic` and returns its packet identifier.
    ///
    /// The SUBACK arrives through [`poll`](Self::poll) as
    /// [`Event::Subscribed`] carrying the same identifier.
    ///
    /// # Errors
    ///
    /// [`Error::BufferOverflow`] if [`MAX_PENDING_SUBSCRIPTIONS`] are already
    /// awaiting their SUBACK.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Error> {
        if self.pending.is_full() {
            return Err(Error::BufferOverflow);
        }

        let packet_id = self.next_packet_id();
        let topic_len = field_len(topic.as_bytes())?;

        write_packet(
            &mut self.connection,
            SUBSCRIBE,
            &[
                &packet_id.to_be_bytes()[..],
                &topic_len[..],
                topic.as_bytes(),
                &[qos as u8][..],
            ],
        )?;

        self.pending
            .push(packet_id)
            .map_err(|_| Error::BufferOverflow)?;
        Ok(packet_id)
    }

    /// Reads from the connection until one packet completes or no more data
    /// is available.
    ///
    /// A PUBLISH is delivered to `handler` as one
    /// [`on_publish_start`](InboundHandler::on_publish_start) followed by
    /// fragments of at most [`RX_FRAGMENT_SIZE`] bytes, the last one flagged.
    /// An empty payload produces a single empty final fragment. A CONNACK is
    /// reported through
    /// [`on_connection_status`](InboundHandler::on_connection_status). Any
    /// other packet type is read and discarded.
    ///
    /// # Errors
    ///
    /// * [`Error::ReadError`] - transport failure
    /// * [`Error::ProtocolError`] - malformed packet. The rest of it is
    ///   skipped on the following calls so the stream stays in sync.
    /// * [`Error::BufferOverflow`] - inbound topic longer than
    ///   [`MAX_WIRE_TOPIC`], skipped the same way
    pub fn poll<H: InboundHandler>(&mut self, handler: &mut H) -> Result<Event, Error> {
        loop {
            match self.rx {
                Rx::Header => {
                    let Some(header) = self.read_byte()? else {
                        return Ok(Event::Idle);
                    };
                    self.rx = Rx::Length {
                        header,
                        value: 0,
                        multiplier: 1,
                    };
                }
                Rx::Length {
                    header,
                    value,
                    multiplier,
                } => {
                    let Some(byte) = self.read_byte()? else {
                        return Ok(Event::Idle);
                    };
                    let value = value + (byte & 0x7F) as usize * multiplier;
                    if byte & 0x80 == 0 {
                        self.start_packet(header, value)?;
                    } else if multiplier == 128 * 128 * 128 {
                        // Four length bytes at most; nothing left to resync on.
                        self.rx = Rx::Header;
                        return Err(Error::ProtocolError);
                    } else {
                        self.rx = Rx::Length {
                            header,
                            value,
                            multiplier: multiplier * 128,
                        };
                    }
                }
                Rx::Fields {
                    header,
                    remaining,
                    need,
                } => {
                    let filled = self.filled;
                    if filled < need {
                        let n = read_some(&mut self.connection, &mut self.fields[filled..need])?;
                        if n == 0 {
                            return Ok(Event::Idle);
                        }
                        self.filled += n;
                        continue;
                    }
                    if let Some(event) = self.finish_fields(header, remaining, need, handler)? {
                        return Ok(event);
                    }
                }
                Rx::Payload { left } => {
                    let mut chunk = [0u8; RX_FRAGMENT_SIZE];
                    let n = read_some(&mut self.connection, &mut chunk[..left.min(RX_FRAGMENT_SIZE)])?;
                    if n == 0 {
                        return Ok(Event::Idle);
                    }
                    let left = left - n;
                    if left == 0 {
                        self.rx = Rx::Header;
                        handler.on_data_fragment(&chunk[..n], true);
                        return Ok(Event::Publish);
                    }
                    self.rx = Rx::Payload { left };
                    handler.on_data_fragment(&chunk[..n], false);
                }
                Rx::Discard { left: 0 } => {
                    self.rx = Rx::Header;
                    return Ok(Event::Skipped);
                }
                Rx::Discard { left } => {
                    let mut scratch = [0u8; 64];
                    let n = read_some(&mut self.connection, &mut scratch[..left.min(64)])?;
                    if n == 0 {
                        return Ok(Event::Idle);
                    }
                    self.rx = Rx::Discard { left: left - n };
                }
            }
        }
    }

    /// Sends DISCONNECT and closes the transport. The transport is closed
    /// even if DISCONNECT could not be written.
    pub fn disconnect(mut self) -> Result<(), Error> {
        let sent = write_packet(&mut self.connection, DISCONNECT, &[]);
        let closed = self.close();
        sent.and(closed)
    }

    /// Closes the transport without telling the broker.
    pub fn close(self) -> Result<(), Error> {
        self.connection.close().map_err(|_| Error::ConnectionClosed)
    }

    fn next_packet_id(&mut self) -> u16 {
        // Packet identifier 0 is reserved.
        self.packet_id = self.packet_id.wrapping_add(1).max(1);
        self.packet_id
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        match read_some(&mut self.connection, &mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Chooses how to decode a packet once its fixed header is complete.
    fn start_packet(&mut self, header: u8, remaining: usize) -> Result<(), Error> {
        let need = match header & 0xF0 {
            PUBLISH if remaining >= 2 => 2,
            CONNACK if remaining == 2 => 2,
            SUBACK if remaining == 3 => 3,
            PUBLISH | CONNACK | SUBACK => return self.skip(remaining, Error::ProtocolError),
            _ => {
                self.rx = Rx::Discard { left: remaining };
                return Ok(());
            }
        };
        self.filled = 0;
        self.rx = Rx::Fields {
            header,
            remaining,
            need,
        };
        Ok(())
    }

    fn finish_fields<H: InboundHandler>(
        &mut self,
        header: u8,
        remaining: usize,
        need: usize,
        handler: &mut H,
    ) -> Result<Option<Event>, Error> {
        match header & 0xF0 {
            CONNACK => {
                self.rx = Rx::Header;
                let status = match self.fields[1] {
                    0 => ConnectionStatus::Accepted,
                    code @ 1..=5 => ConnectionStatus::Refused(code),
                    _ => return Err(Error::ProtocolError),
                };
                self.accepted = status == ConnectionStatus::Accepted;
                handler.on_connection_status(status);
                Ok(Some(Event::Connected(status)))
            }
            SUBACK => {
                self.rx = Rx::Header;
                let packet_id = u16::from_be_bytes([self.fields[0], self.fields[1]]);
                let Some(index) = self.pending.iter().position(|id| *id == packet_id) else {
                    return Err(Error::ProtocolError);
                };
                self.pending.swap_remove(index);
                let ack = match self.fields[2] {
                    0 => SubAck::Granted(QoS::AtMostOnce),
                    1 => SubAck::Granted(QoS::AtLeastOnce),
                    2 => SubAck::Granted(QoS::ExactlyOnce),
                    SUBACK_FAILURE => SubAck::Failure,
                    _ => return Err(Error::ProtocolError),
                };
                Ok(Some(Event::Subscribed { packet_id, ack }))
            }
            _ => self.finish_publish(header, remaining, need, handler),
        }
    }

    fn finish_publish<H: InboundHandler>(
        &mut self,
        header: u8,
        remaining: usize,
        need: usize,
        handler: &mut H,
    ) -> Result<Option<Event>, Error> {
        let topic_len = u16::from_be_bytes([self.fields[0], self.fields[1]]) as usize;
        // Subscriptions are made at QoS 0, the identifier is skipped.
        let id_len = if (header >> 1) & 0x03 != 0 { 2 } else { 0 };
        let fields = 2 + topic_len + id_len;

        if need < fields {
            if fields > remaining {
                return self.skip(remaining - need, Error::ProtocolError).map(|()| None);
            }
            if topic_len > MAX_WIRE_TOPIC {
                return self.skip(remaining - need, Error::BufferOverflow).map(|()| None);
            }
            self.rx = Rx::Fields {
                header,
                remaining,
                need: fields,
            };
            return Ok(None);
        }

        let payload_len = remaining - fields;
        let Ok(topic) = core::str::from_utf8(&self.fields[2..2 + topic_len]) else {
            return self.skip(payload_len, Error::ProtocolError).map(|()| None);
        };

        handler.on_publish_start(topic, payload_len as u32);

        if payload_len == 0 {
            self.rx = Rx::Header;
            handler.on_data_fragment(&[], true);
            return Ok(Some(Event::Publish));
        }
        self.rx = Rx::Payload { left: payload_len };
        Ok(None)
    }

    /// Skips the next `left` bytes of the current packet, then reports `error`.
    fn skip(&mut self, left: usize, error: Error) -> Result<(), Error> {
        self.rx = Rx::Discard { left };
        Err(error)
    }
}

fn read_some<R: Read>(connection: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
    connection.read(buf).map_err(|_| Error::ReadError)
}

/// Length prefix for a UTF-8 string or binary field.
fn field_len(bytes: &[u8]) -> Result<[u8; 2], Error> {
    u16::try_from(bytes.len())
        .map(u16::to_be_bytes)
        .map_err(|_| Error::BufferOverflow)
}

fn push_field<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(&field_len(bytes)?)
        .map_err(|_| Error::BufferOverflow)?;
    buf.extend_from_slice(bytes)
        .map_err(|_| Error::BufferOverflow)
}

/// Writes a fixed header for `packet_type` followed by `parts`.
fn write_packet<C: Connection>(connection: &mut C, packet_type: u8, parts: &[&[u8]]) -> Result<(), Error> {
    let remaining_len = parts.iter().map(|part| part.len()).sum();

    let mut fixed_header: Vec<u8, 5> = Vec::new();
    fixed_header
        .push(packet_type)
        .map_err(|_| Error::BufferOverflow)?;
    encode_remaining_length(&mut fixed_header, remaining_len)?;

    write_all(connection, &fixed_header)?;
    for part in parts {
        write_all(connection, part)?;
    }
    connection.flush().map_err(|_| Error::WriteError)
}

fn write_all<C: Connection>(connection: &mut C, mut buf: &[u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match connection.write(buf) {
            Ok(0) | Err(_) => return Err(Error::WriteError),
            Ok(n) => buf = &buf[n..],
        }
    }
    Ok(())
}

/// Encodes the remaining length field for an MQTT packet.
///
/// Up to four bytes of seven bits each, the high bit marking continuation.
fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), Error> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::ProtocolError)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}
