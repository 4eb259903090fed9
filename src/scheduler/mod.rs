//! Periodic task scheduling
//!
//! Thin wrapper over a named thread that invokes a callback at a fixed
//! interval until cancelled. Used for the reading-request poll and the
//! chart redraw tick.
//!
//! Cancellation is cooperative: the token is checked in small sleep quanta,
//! so a tick that is already executing when the token flips may still
//! complete. Callers must tolerate at most one callback invocation after
//! cancel.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Granularity of the cancellation check
const SLEEP_QUANTUM: Duration = Duration::from_millis(10);

/// Shared cancellation flag
///
/// Cancelling an already-cancelled token is a no-op, so teardown paths can
/// call it unconditionally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A named thread invoking a callback at a fixed interval
pub struct PeriodicTask {
    name: String,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn the task thread
    ///
    /// The first invocation happens one full interval after spawn, matching
    /// a timer scheduled with an initial delay.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let token = CancelToken::new();
        let thread_token = token.clone();
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(task = %thread_name, ?interval, "periodic task started");
                let mut next_tick = Instant::now() + interval;
                loop {
                    while Instant::now() < next_tick {
                        if thread_token.is_cancelled() {
                            tracing::debug!(task = %thread_name, "periodic task stopped");
                            return;
                        }
                        std::thread::sleep(SLEEP_QUANTUM.min(interval));
                    }
                    if thread_token.is_cancelled() {
                        tracing::debug!(task = %thread_name, "periodic task stopped");
                        return;
                    }
                    tick();
                    next_tick += interval;
                    // Skip missed ticks instead of bursting to catch up
                    let now = Instant::now();
                    if next_tick < now {
                        next_tick = now + interval;
                    }
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            token,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel the task and wait for its thread to exit
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(task = %self.name, "periodic task thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
