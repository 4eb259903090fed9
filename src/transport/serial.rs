//! Serial transport over an RFCOMM tty
//!
//! The sensor is bound to a tty device (typically `/dev/rfcomm0` via
//! `rfcomm bind`). The baud rate is ignored by the RFCOMM layer but
//! required by the serial API.

use crate::error::{LeakwatchError, Result};
use crate::transport::SensorTransport;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Default baud rate handed to the serial API
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout; short so the reader thread notices shutdown promptly
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Byte stream over a serial (or RFCOMM-bound) tty device
pub struct RfcommPort {
    name: String,
    port: Box<dyn SerialPort>,
}

impl RfcommPort {
    /// Open the device
    ///
    /// A missing or inaccessible device is rejected here, before any link
    /// state exists, as a permission error.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    LeakwatchError::Permission(format!("device {} is not available", path))
                }
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    LeakwatchError::Permission(format!("access to {} denied", path))
                }
                _ => LeakwatchError::Serial(e),
            })?;

        tracing::debug!(device = %path, baud_rate, "serial port opened");
        Ok(Self {
            name: path.to_string(),
            port,
        })
    }
}

impl SensorTransport for RfcommPort {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn try_clone(&self) -> Result<Box<dyn SensorTransport>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self {
            name: self.name.clone(),
            port,
        }))
    }
}

impl std::fmt::Debug for RfcommPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RfcommPort").field("name", &self.name).finish()
    }
}
