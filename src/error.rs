//! Error handling for the Leakwatch application
//!
//! This module defines custom error types and a Result alias for use
//! throughout the application.

use thiserror::Error;

/// Main error type for Leakwatch operations
#[derive(Error, Debug)]
pub enum LeakwatchError {
    /// Errors on the sensor byte stream. Terminal for the session: the
    /// connection is torn down and the reason surfaces to the user.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed inbound frame. Recoverable: the frame is dropped and the
    /// session continues.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Device cannot be used (unpaired, unauthorized, not present).
    /// Rejected before any connection attempt is made.
    #[error("Permission error: {0}")]
    Permission(String),

    /// Errors related to configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the serial port layer
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LeakwatchError>,
    },
}

impl LeakwatchError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LeakwatchError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for Leakwatch operations
pub type Result<T> = std::result::Result<T, LeakwatchError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
