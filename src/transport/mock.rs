//! Mock sensor for testing without hardware
//!
//! Only available with the `mock-sensor` feature. The mock is a pair: the
//! [`MockSensor`] half plugs into the link manager as a transport, while
//! the [`MockSensorController`] half stays with the test to script inbound
//! traffic and observe outbound commands.

use crate::error::Result;
use crate::transport::SensorTransport;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io::{Error, ErrorKind};
use std::time::Duration;

/// How long a mock read blocks before reporting a timeout
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Create a connected mock sensor and its controller
pub fn mock_pair(name: &str) -> (MockSensor, MockSensorController) {
    let (incoming_tx, incoming_rx) = crossbeam_channel::unbounded();
    let (outgoing_tx, outgoing_rx) = crossbeam_channel::unbounded();

    let sensor = MockSensor {
        name: name.to_string(),
        incoming: incoming_rx,
        outgoing: outgoing_tx,
    };
    let controller = MockSensorController {
        incoming: incoming_tx,
        outgoing: outgoing_rx,
    };
    (sensor, controller)
}

/// Transport half of the mock
pub struct MockSensor {
    name: String,
    incoming: Receiver<Vec<u8>>,
    outgoing: Sender<Vec<u8>>,
}

impl SensorTransport for MockSensor {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.incoming.recv_timeout(MOCK_READ_TIMEOUT) {
            Ok(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::from(ErrorKind::TimedOut)),
            // Controller dropped: behaves like the peer closing the stream
            Err(RecvTimeoutError::Disconnected) => Ok(0),
        }
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.outgoing
            .send(bytes.to_vec())
            .map_err(|_| Error::from(ErrorKind::BrokenPipe))
    }

    fn try_clone(&self) -> Result<Box<dyn SensorTransport>> {
        Ok(Box::new(Self {
            name: self.name.clone(),
            incoming: self.incoming.clone(),
            outgoing: self.outgoing.clone(),
        }))
    }
}

/// Test-side half of the mock
pub struct MockSensorController {
    incoming: Sender<Vec<u8>>,
    outgoing: Receiver<Vec<u8>>,
}

impl MockSensorController {
    /// Queue one inbound chunk as if the device had sent it
    pub fn push(&self, bytes: &[u8]) {
        let _ = self.incoming.send(bytes.to_vec());
    }

    /// Queue a well-formed reading frame for the given values
    pub fn push_reading(&self, ppm: &str, mv: &str) {
        self.push(format!("d{},{},0,0,10:00:00,01/01/24,R1,,", ppm, mv).as_bytes());
    }

    /// Wait for the next outbound command
    pub fn recv_sent(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outgoing.recv_timeout(timeout).ok()
    }

    /// Drain all outbound commands received so far
    pub fn drain_sent(&self) -> Vec<Vec<u8>> {
        self.outgoing.try_iter().collect()
    }

    /// Simulate the device dropping the connection
    pub fn disconnect(self) {
        drop(self.incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_roundtrip() {
        let (mut sensor, controller) = mock_pair("mock");
        controller.push(b"d");

        let mut buf = [0u8; 16];
        let n = sensor.read_chunk(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"d");

        sensor.write_chunk(b"D").unwrap();
        assert_eq!(controller.drain_sent(), vec![b"D".to_vec()]);
    }

    #[test]
    fn test_mock_timeout_then_close() {
        let (mut sensor, controller) = mock_pair("mock");
        let mut buf = [0u8; 16];
        let err = sensor.read_chunk(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);

        controller.disconnect();
        assert_eq!(sensor.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mock_clone_shares_channels() {
        let (sensor, controller) = mock_pair("mock");
        let mut clone = sensor.try_clone().unwrap();
        clone.write_chunk(b"G").unwrap();
        assert_eq!(controller.drain_sent(), vec![b"G".to_vec()]);
    }
}
