use dotenvy::dotenv;
use mqtt_comm::network::application::mqtt::{MqttComm, Reading, ReadingSink, ReplayConfig};
use mqtt_comm::network::error::Error;
use mqtt_comm::network::{Close, Connect, Connection, Read, Write};
use std::env;
use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

struct NetConnection {
    stream: TcpStream,
}

impl Read for NetConnection {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.stream.read(buf) {
            Ok(0) => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(0),
            Err(_) => Err(Error::ReadError),
        }
    }
}

impl Write for NetConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for NetConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for NetConnection {}

/// Ignores the requested remote and dials the configured test broker.
struct TestNetwork {
    address: String,
}

impl Connect for TestNetwork {
    type Connection = NetConnection;
    type Error = Error;

    fn connect(&mut self, _remote: &str) -> Result<Self::Connection, Self::Error> {
        let stream = TcpStream::connect(&self.address).map_err(|_| Error::NotConnected)?;
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .map_err(|_| Error::NotConnected)?;
        Ok(NetConnection { stream })
    }
}

#[derive(Default)]
struct Collected(Vec<Reading>);

impl ReadingSink for Collected {
    fn on_reading(&mut self, _topic: &str, reading: Reading) {
        self.0.push(reading);
    }
}

fn broker() -> (TestNetwork, String) {
    dotenv().ok();
    let address = env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let ip = address
        .to_socket_addrs()
        .expect("Failed to resolve broker")
        .find(|addr| addr.is_ipv4())
        .expect("Broker has no IPv4 address")
        .ip()
        .to_string();
    (TestNetwork { address }, ip)
}

#[test]
#[ignore = "requires a reachable MQTT broker"]
fn test_reading_round_trip_through_broker() {
    let (mut network, ip) = broker();
    let topic = format!("mqtt-comm/test/{}", std::process::id());
    let mut comm = MqttComm::new(Collected::default(), ReplayConfig::default());

    comm.setup(&mut network, "mqtt-comm-test-client", &ip, None, None);
    let deadline = Instant::now() + Duration::from_secs(10);
    while !comm.is_connected() && Instant::now() < deadline {
        comm.poll();
    }
    assert!(comm.is_connected());
    comm.subscribe(&topic);

    let reading = Reading {
        value: 23.5,
        timestamp: 1_700_000_000,
    };
    comm.publish_reading(&topic, &reading);
    comm.publish_reading(&topic, &reading);

    let deadline = Instant::now() + Duration::from_secs(10);
    while comm.receiver().sink().0.is_empty() && Instant::now() < deadline {
        comm.poll();
    }
    // give the replay a chance to arrive
    for _ in 0..4 {
        comm.poll();
    }

    assert_eq!(comm.receiver().sink().0, vec![reading]);
    comm.disconnect();
}
