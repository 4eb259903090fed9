//! # Leakwatch: Gas Leak Sensor Monitor
//!
//! A streaming monitor for a serial-attached gas leak sensor. The sensor is
//! polled over a byte stream (typically an RFCOMM-bound tty), its readings
//! flow through a smoothing and leak-detection pipeline, and the results are
//! pushed to a pluggable chart surface.
//!
//! ## Architecture
//!
//! - **Transport**: Byte-stream link with a dedicated reader thread,
//!   abstracted behind a trait so a mock sensor can stand in for hardware
//! - **Protocol**: Stateful line codec for the device's ad-hoc ASCII frames
//! - **Pipeline**: Savitzky-Golay smoothing, log-scale chart transform,
//!   sliding-window extrema, trend estimation, leak-rate test
//! - **Session**: Worker thread owning all mutable state, driven by
//!   commands and link events over crossbeam channels
//!
//! ## Example
//!
//! ```ignore
//! use leakwatch_rs::{
//!     chart::HeadlessChart,
//!     config::MonitorConfig,
//!     session::{SessionCommand, SessionWorker},
//!     transport::serial::{RfcommPort, DEFAULT_BAUD_RATE},
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MonitorConfig::default();
//!     let session = SessionWorker::spawn(config, Box::new(HeadlessChart::new()))?;
//!
//!     let port = RfcommPort::open("/dev/rfcomm0", DEFAULT_BAUD_RATE)?;
//!     session.send(SessionCommand::Connect(Box::new(port)))?;
//!     session.send(SessionCommand::StartPolling)?;
//!
//!     // ... observe session.events() and session.snapshot() ...
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{LeakDetectionConfig, MonitorConfig};
pub use error::{LeakwatchError, Result};
pub use session::{SessionCommand, SessionEvent, SessionHandle, SessionState, SessionWorker};
pub use types::{BoundedSeries, ChartPoint, ConnectionStatus, RawReading, SmoothedReading};
