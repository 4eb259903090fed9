//! Monitor session worker
//!
//! This module provides the session thread that owns the sensor link, the
//! protocol codec, the measurement pipeline and the chart surface. It
//! processes commands from the frontend and events from the link, updating
//! the shared [`SessionState`] snapshot as the single writer.
//!
//! # Architecture
//!
//! ```text
//! Frontend -> SessionCommand -> [SessionWorker thread] -> SessionEvent -> Frontend
//!                                     |        ^
//!                                     v        |
//!                                LinkManager reader
//! ```
//!
//! Periodic work (the reading poll and the chart redraw) runs on timer
//! threads that feed commands back into the same queue, so all state
//! mutation happens on the worker thread.

pub mod replay;
mod state;

pub use state::SessionState;

use crate::chart::{ChartSurface, SeriesUpdate};
use crate::config::{LeakDetectionConfig, MonitorConfig};
use crate::error::{LeakwatchError, Result};
use crate::pipeline::Pipeline;
use crate::protocol::{Frame, FrameCodec, CMD_REQUEST_READING};
use crate::scheduler::PeriodicTask;
use crate::transport::{ConnectionEvent, LinkManager, SensorTransport};
use crate::types::{ConnectionStatus, RawReading};
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Series name used for the concentration chart
pub const PPM_SERIES: &str = "ppm";

/// Default color of the concentration series
const PPM_COLOR: [u8; 4] = [0x1f, 0x77, 0xb4, 0xff];

/// Commands accepted by the session worker
pub enum SessionCommand {
    /// Connect over an already-opened transport, replacing any active link
    Connect(Box<dyn SensorTransport>),
    /// Tear down the active link
    Disconnect,
    /// Begin sending periodic reading requests
    StartPolling,
    /// Stop sending reading requests; the link stays up
    StopPolling,
    /// Capture the latest concentration as the zero baseline
    Zero,
    /// Drop the zero baseline
    ClearZero,
    /// Replace the leak-detection parameters
    SetLeakConfig(LeakDetectionConfig),
    /// Restore the default leak-detection parameters
    ResetLeakConfig,
    /// Clear the latched leak flag
    AcknowledgeLeak,
    /// Discard all measurement state, keeping the connection
    Reset,
    /// Write raw bytes to the device
    Send(Vec<u8>),
    /// Feed a reading directly into the pipeline, bypassing the link
    InjectReading(RawReading),
    /// Redraw the chart surface from the current state
    Draw,
    /// Stop the worker
    Shutdown,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::Connect(_) => write!(f, "Connect"),
            SessionCommand::Disconnect => write!(f, "Disconnect"),
            SessionCommand::StartPolling => write!(f, "StartPolling"),
            SessionCommand::StopPolling => write!(f, "StopPolling"),
            SessionCommand::Zero => write!(f, "Zero"),
            SessionCommand::ClearZero => write!(f, "ClearZero"),
            SessionCommand::SetLeakConfig(_) => write!(f, "SetLeakConfig"),
            SessionCommand::ResetLeakConfig => write!(f, "ResetLeakConfig"),
            SessionCommand::AcknowledgeLeak => write!(f, "AcknowledgeLeak"),
            SessionCommand::Reset => write!(f, "Reset"),
            SessionCommand::Send(bytes) => write!(f, "Send({} bytes)", bytes.len()),
            SessionCommand::InjectReading(_) => write!(f, "InjectReading"),
            SessionCommand::Draw => write!(f, "Draw"),
            SessionCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Events published by the session worker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection state machine moved
    StatusChanged(ConnectionStatus),
    /// A user-visible error occurred
    ErrorReported(String),
    /// The rise detector latched the leak flag
    LeakDetected,
    /// The worker thread is exiting
    Shutdown,
}

/// Frontend handle to a running session
///
/// Call [`SessionHandle::shutdown`] for an orderly exit; the worker keeps
/// its own feedback sender, so merely dropping the handle leaves the
/// thread running.
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
    events: Receiver<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue a command for the worker
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| LeakwatchError::Channel(format!("session worker is gone: {}", e)))
    }

    /// Receiver for worker events
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    /// Clone of the current session state
    pub fn snapshot(&self) -> SessionState {
        lock_state(&self.state).clone()
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("session worker thread panicked");
            }
        }
    }
}

/// The session worker thread
pub struct SessionWorker {
    config: MonitorConfig,
    pipeline: Pipeline,
    state: Arc<Mutex<SessionState>>,
    commands: Receiver<SessionCommand>,
    command_feedback: Sender<SessionCommand>,
    events: Sender<SessionEvent>,
    chart: Box<dyn ChartSurface>,
    codec: FrameCodec,
    link: Option<LinkManager>,
    link_events: Option<Receiver<ConnectionEvent>>,
    poll_task: Option<PeriodicTask>,
    draw_task: Option<PeriodicTask>,
}

impl SessionWorker {
    /// Spawn the worker thread and return the frontend handle
    pub fn spawn(config: MonitorConfig, chart: Box<dyn ChartSurface>) -> Result<SessionHandle> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let state = Arc::new(Mutex::new(SessionState::new(&config)));

        let worker = SessionWorker {
            pipeline: Pipeline::new(&config),
            config,
            state: state.clone(),
            commands: command_rx,
            command_feedback: command_tx.clone(),
            events: event_tx,
            chart,
            codec: FrameCodec::new(),
            link: None,
            link_events: None,
            poll_task: None,
            draw_task: None,
        };

        let thread = std::thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(SessionHandle {
            commands: command_tx,
            events: event_rx,
            state,
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        tracing::info!("session worker started");
        self.chart.configure();

        loop {
            let commands = self.commands.clone();
            let link_events = self
                .link_events
                .clone()
                .unwrap_or_else(crossbeam_channel::never);

            select! {
                recv(commands) -> command => match command {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(link_events) -> event => match event {
                    Ok(event) => self.handle_link_event(event),
                    Err(_) => self.link_events = None,
                },
            }
        }

        self.disconnect();
        let _ = self.events.send(SessionEvent::Shutdown);
        tracing::info!("session worker stopped");
    }

    /// Returns false when the worker should exit
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        tracing::trace!(?command, "handling command");
        match command {
            SessionCommand::Connect(transport) => self.connect(transport),
            SessionCommand::Disconnect => self.disconnect(),
            SessionCommand::StartPolling => self.start_polling(),
            SessionCommand::StopPolling => self.stop_polling(),
            SessionCommand::Zero => {
                lock_state(&self.state).zero();
            }
            SessionCommand::ClearZero => lock_state(&self.state).clear_zero(),
            SessionCommand::SetLeakConfig(config) => {
                lock_state(&self.state).set_leak_config(config)
            }
            SessionCommand::ResetLeakConfig => {
                lock_state(&self.state).set_leak_config(LeakDetectionConfig::default())
            }
            SessionCommand::AcknowledgeLeak => lock_state(&self.state).leak.acknowledge(),
            SessionCommand::Reset => {
                lock_state(&self.state).reset_measurements();
                self.codec.reset();
            }
            SessionCommand::Send(bytes) => self.send_bytes(&bytes),
            SessionCommand::InjectReading(reading) => self.apply_reading(reading),
            SessionCommand::Draw => self.draw(),
            SessionCommand::Shutdown => return false,
        }
        true
    }

    fn handle_link_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Established { device_name } => {
                tracing::info!(device = %device_name, "connected");
                {
                    let mut state = lock_state(&self.state);
                    state.status = ConnectionStatus::Connected;
                    state.device_name = Some(device_name);
                    state.error_message = None;
                }
                let _ = self
                    .events
                    .send(SessionEvent::StatusChanged(ConnectionStatus::Connected));
                self.start_draw_task();
            }
            ConnectionEvent::DataReceived(bytes) => {
                let frame = self.codec.decode(&bytes);
                lock_state(&self.state).last_command = self.codec.last_command();
                match frame {
                    Some(Frame::Reading(reading)) => self.apply_reading(reading),
                    Some(Frame::Ack) => {}
                    Some(Frame::Diagnostic(values)) => {
                        tracing::debug!(?values, "diagnostic frame");
                    }
                    None => {}
                }
            }
            ConnectionEvent::Failed(reason) => {
                tracing::warn!(%reason, "connection failed");
                lock_state(&self.state).status = ConnectionStatus::Error;
                let _ = self
                    .events
                    .send(SessionEvent::StatusChanged(ConnectionStatus::Error));
                let _ = self.events.send(SessionEvent::ErrorReported(reason.clone()));

                // Release everything, then settle in Disconnected with the
                // error message retained for display
                self.disconnect();
                lock_state(&self.state).error_message = Some(reason);
            }
        }
    }

    fn connect(&mut self, transport: Box<dyn SensorTransport>) {
        // One link at a time
        if self.link.is_some() {
            self.disconnect();
        }

        let device_name = transport.device_name();
        {
            let mut state = lock_state(&self.state);
            state.status = ConnectionStatus::Connecting;
            state.device_name = Some(device_name.clone());
            state.error_message = None;
        }
        let _ = self
            .events
            .send(SessionEvent::StatusChanged(ConnectionStatus::Connecting));

        let (link_tx, link_rx) = crossbeam_channel::unbounded();
        match LinkManager::connect(transport, link_tx) {
            Ok(link) => {
                self.codec.reset();
                self.link = Some(link);
                self.link_events = Some(link_rx);
            }
            Err(e) => {
                tracing::error!(device = %device_name, error = %e, "connect failed");
                {
                    let mut state = lock_state(&self.state);
                    state.status = ConnectionStatus::Disconnected;
                    state.error_message = Some(e.to_string());
                }
                let _ = self.events.send(SessionEvent::ErrorReported(e.to_string()));
                let _ = self
                    .events
                    .send(SessionEvent::StatusChanged(ConnectionStatus::Disconnected));
            }
        }
    }

    /// Tear down the link, both timers and all measurement-derived state.
    /// Safe to call in any state.
    fn disconnect(&mut self) {
        self.stop_polling();
        if let Some(task) = self.draw_task.take() {
            task.stop();
        }
        if let Some(mut link) = self.link.take() {
            link.shutdown();
        }
        self.link_events = None;
        self.codec.reset();

        let previous = {
            let mut state = lock_state(&self.state);
            let previous = state.status;
            // Zero, leak latch and baseline must not survive into the next
            // connection
            state.reset_measurements();
            state.status = ConnectionStatus::Disconnected;
            state.polling = false;
            previous
        };
        if previous != ConnectionStatus::Disconnected {
            let _ = self
                .events
                .send(SessionEvent::StatusChanged(ConnectionStatus::Disconnected));
        }
    }

    fn start_polling(&mut self) {
        if self.link.is_none() {
            tracing::warn!("cannot start polling while disconnected");
            return;
        }
        if self.poll_task.is_some() {
            return;
        }

        let feedback = self.command_feedback.clone();
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        match PeriodicTask::spawn("reading-poll", interval, move || {
            let _ = feedback.send(SessionCommand::Send(CMD_REQUEST_READING.to_vec()));
        }) {
            Ok(task) => {
                self.poll_task = Some(task);
                lock_state(&self.state).polling = true;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start poll timer");
                let _ = self.events.send(SessionEvent::ErrorReported(e.to_string()));
            }
        }
    }

    fn stop_polling(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.stop();
            lock_state(&self.state).polling = false;
        }
    }

    fn start_draw_task(&mut self) {
        if self.draw_task.is_some() {
            return;
        }
        let feedback = self.command_feedback.clone();
        let interval = Duration::from_millis(self.config.draw_interval_ms);
        match PeriodicTask::spawn("chart-draw", interval, move || {
            let _ = feedback.send(SessionCommand::Draw);
        }) {
            Ok(task) => self.draw_task = Some(task),
            Err(e) => tracing::error!(error = %e, "failed to start draw timer"),
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) {
        match &self.link {
            Some(link) => {
                link.send(bytes);
            }
            None => tracing::debug!("dropping outbound bytes, no active link"),
        }
    }

    fn apply_reading(&mut self, reading: RawReading) {
        let mut state = lock_state(&self.state);
        let was_leaking = state.leak.leak_detected;
        self.pipeline.apply_reading(&mut state, reading);
        let now_leaking = state.leak.leak_detected;
        drop(state);

        if now_leaking && !was_leaking {
            tracing::warn!("rising concentration, leak flag latched");
            let _ = self.events.send(SessionEvent::LeakDetected);
        }
    }

    fn draw(&mut self) {
        let (points, range) = {
            let state = lock_state(&self.state);
            (state.chart_data.to_vec(), state.render_range)
        };
        if let Some((min, max)) = range {
            self.chart.set_range(min, max);
        }
        self.chart.draw_series(SeriesUpdate {
            name: PPM_SERIES.to_string(),
            points,
            color: PPM_COLOR,
            visible: true,
        });
    }
}

fn lock_state(state: &Arc<Mutex<SessionState>>) -> MutexGuard<'_, SessionState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
