#![allow(dead_code)]

use mqtt_comm::network::error::Error;
use mqtt_comm::network::prelude::*;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Both directions of a mock socket, shared between the test and the client.
#[derive(Debug, Default)]
pub struct Wire {
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub closed: bool,
    /// Reads fail once the inbound queue is drained.
    pub broken: bool,
}

pub type SharedWire = Rc<RefCell<Wire>>;

#[derive(Debug)]
pub struct MockConnection {
    wire: SharedWire,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(Error::NotConnected);
        }
        if wire.inbound.is_empty() && wire.broken {
            return Err(Error::ReadError);
        }
        let len = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(Error::NotConnected);
        }
        wire.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().closed = true;
        Ok(())
    }
}

impl Connection for MockConnection {}

/// Network stack handing out connections bound to one shared wire.
#[derive(Debug, Default)]
pub struct MockNetwork {
    pub wire: SharedWire,
    pub remotes: Vec<String>,
    pub refuse: bool,
}

impl MockNetwork {
    pub fn with_inbound(bytes: &[u8]) -> Self {
        let network = Self::default();
        network.push_inbound(bytes);
        network
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        self.wire.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire.borrow_mut().outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.wire.borrow().closed
    }

    pub fn break_reads(&self) {
        self.wire.borrow_mut().broken = true;
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection {
            wire: self.wire.clone(),
        }
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        self.remotes.push(remote.to_string());
        if self.refuse {
            return Err(Error::ConnectionClosed);
        }
        // A closed wire belongs to an earlier session.
        if self.is_closed() {
            self.wire = SharedWire::default();
        }
        Ok(self.connection())
    }
}

pub fn connack(code: u8) -> [u8; 4] {
    [0x20, 0x02, 0x00, code]
}

pub fn suback(packet_id: u16, code: u8) -> [u8; 5] {
    let id = packet_id.to_be_bytes();
    [0x90, 0x03, id[0], id[1], code]
}

pub fn encode_remaining_length(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

/// A QoS 0 PUBLISH as a broker would send it.
pub fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x30];
    encode_remaining_length(&mut packet, 2 + topic.len() + payload.len());
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}
