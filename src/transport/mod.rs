//! Sensor transport layer
//!
//! This module provides a common interface over the byte stream to the
//! sensor, enabling both real hardware links (via serialport) and mock
//! sensors for testing.
//!
//! [`LinkManager`] owns the connection lifecycle: it spawns a reader thread
//! that forwards raw chunks over a channel and hands out a write path that
//! never panics. One manager handles one connection; connecting again tears
//! the previous link down first.

pub mod serial;

#[cfg(feature = "mock-sensor")]
pub mod mock;

use crate::error::Result;
use crate::scheduler::CancelToken;
use crossbeam_channel::Sender;
use std::io::ErrorKind;
use std::sync::Mutex;
use std::thread::JoinHandle;

/// Size of the reader thread's chunk buffer
const READ_BUFFER_SIZE: usize = 1024;

/// Events emitted by the link to the session worker
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The link is up and the reader thread is running
    Established { device_name: String },
    /// One raw chunk off the wire, boundaries as delivered by the stream
    DataReceived(Vec<u8>),
    /// The link died. The reader's transport handle is already released
    /// when this is observed.
    Failed(String),
}

/// Byte-stream link to a sensor
///
/// Implementations must be `Send` so the reader thread can own one half
/// while the writer half stays with the session.
pub trait SensorTransport: Send {
    /// Human-readable device identity for status display and logs
    fn device_name(&self) -> String;

    /// Blocking read of the next chunk
    ///
    /// `Ok(0)` means the peer closed the stream. Timeouts surface as
    /// `ErrorKind::TimedOut` and are not terminal.
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write one complete outbound command
    fn write_chunk(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Duplicate the handle so reads and writes can proceed concurrently
    fn try_clone(&self) -> Result<Box<dyn SensorTransport>>;
}

/// Owns one sensor connection: reader thread plus writer handle
pub struct LinkManager {
    device_name: String,
    writer: Mutex<Option<Box<dyn SensorTransport>>>,
    token: CancelToken,
    reader: Option<JoinHandle<()>>,
}

impl LinkManager {
    /// Bring the link up over an already-opened transport
    ///
    /// Emits [`ConnectionEvent::Established`] immediately, then forwards
    /// inbound chunks until the stream ends, fails, or the link is shut
    /// down. Channel send failures mean the session is gone and end the
    /// reader quietly.
    pub fn connect(
        transport: Box<dyn SensorTransport>,
        events: Sender<ConnectionEvent>,
    ) -> Result<Self> {
        let device_name = transport.device_name();
        let writer = transport.try_clone()?;
        let token = CancelToken::new();
        let thread_token = token.clone();
        let thread_device = device_name.clone();

        let reader = std::thread::Builder::new()
            .name(format!("link-reader-{}", device_name))
            .spawn(move || {
                run_reader(transport, events, thread_token, thread_device);
            })?;

        tracing::info!(device = %device_name, "sensor link established");
        Ok(Self {
            device_name,
            writer: Mutex::new(Some(writer)),
            token,
            reader: Some(reader),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Write an outbound command
    ///
    /// Returns whether the write succeeded. Failures are logged and
    /// reported, never panicked on: the reader thread will surface the
    /// link failure through its own event.
    pub fn send(&self, bytes: &[u8]) -> bool {
        let mut guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(writer) => match writer.write_chunk(bytes) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(device = %self.device_name, error = %e, "link write failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Tear the link down and release the transport
    ///
    /// Idempotent: repeated calls after the first are no-ops.
    pub fn shutdown(&mut self) {
        self.token.cancel();
        if let Ok(mut guard) = self.writer.lock() {
            guard.take();
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                tracing::warn!(device = %self.device_name, "link reader thread panicked");
            }
            tracing::info!(device = %self.device_name, "sensor link closed");
        }
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("device_name", &self.device_name)
            .field("closed", &self.token.is_cancelled())
            .finish()
    }
}

fn run_reader(
    mut transport: Box<dyn SensorTransport>,
    events: Sender<ConnectionEvent>,
    token: CancelToken,
    device_name: String,
) {
    if events
        .send(ConnectionEvent::Established {
            device_name: device_name.clone(),
        })
        .is_err()
    {
        return;
    }

    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        if token.is_cancelled() {
            return;
        }
        match transport.read_chunk(&mut buf) {
            Ok(0) => {
                if !token.is_cancelled() {
                    // Release the transport before announcing the failure so
                    // a reconnect never races the old handle.
                    drop(transport);
                    let _ = events.send(ConnectionEvent::Failed("stream closed".to_string()));
                }
                return;
            }
            Ok(n) => {
                if events
                    .send(ConnectionEvent::DataReceived(buf[..n].to_vec()))
                    .is_err()
                {
                    return;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                continue;
            }
            Err(e) => {
                if !token.is_cancelled() {
                    tracing::warn!(device = %device_name, error = %e, "link read failed");
                    drop(transport);
                    let _ = events.send(ConnectionEvent::Failed(e.to_string()));
                }
                return;
            }
        }
    }
}
