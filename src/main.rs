//! Leakwatch - Headless Monitor Entry Point
//!
//! Connects to the sensor, polls it for readings and logs the pipeline
//! output. Pass a tty path (default `/dev/rfcomm0`) to monitor hardware, or
//! `--replay <file>` to stream a recorded log through the pipeline instead.

use leakwatch_rs::{
    chart::HeadlessChart,
    config::MonitorConfig,
    session::{replay, SessionCommand, SessionEvent, SessionWorker},
    transport::serial::{RfcommPort, DEFAULT_BAUD_RATE},
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where the monitor config is read from when present
const CONFIG_PATH: &str = "leakwatch.toml";

/// How often the session snapshot is logged
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    // Initialize logging: console plus a daily rolling file
    let file_appender = tracing_appender::rolling::daily("logs", "leakwatch.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,leakwatch_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    tracing::info!("Starting Leakwatch monitor");

    let config = match MonitorConfig::load(CONFIG_PATH) {
        Ok(config) => {
            tracing::info!(path = CONFIG_PATH, "loaded monitor config");
            config
        }
        Err(e) => {
            tracing::debug!(path = CONFIG_PATH, error = %e, "using default config");
            MonitorConfig::default()
        }
    };
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    let session = SessionWorker::spawn(config, Box::new(HeadlessChart::new()))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let _replay_task = match args.first().map(String::as_str) {
        Some("--replay") => {
            let path = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("--replay requires a file path"))?;
            let readings = replay::load_readings(path)?;
            Some(replay::replay_into(&session, readings, poll_interval)?)
        }
        device => {
            let path = device.unwrap_or("/dev/rfcomm0");
            let port = RfcommPort::open(path, DEFAULT_BAUD_RATE)?;
            session.send(SessionCommand::Connect(Box::new(port)))?;
            session.send(SessionCommand::StartPolling)?;
            None
        }
    };

    // Log events as they arrive and the snapshot on a fixed cadence
    loop {
        match session.events().recv_timeout(SNAPSHOT_INTERVAL) {
            Ok(SessionEvent::StatusChanged(status)) => tracing::info!(%status, "status changed"),
            Ok(SessionEvent::ErrorReported(message)) => tracing::error!(%message, "session error"),
            Ok(SessionEvent::LeakDetected) => tracing::warn!("LEAK DETECTED"),
            Ok(SessionEvent::Shutdown) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                let state = session.snapshot();
                tracing::info!(
                    status = %state.status,
                    readings = state.raw_history.len(),
                    ppm = ?state.raw_history.latest().map(|r| r.ppm),
                    slope = ?state.slope,
                    leak_rate = ?state.leak.leak_rate,
                    "snapshot"
                );
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::info!("Shutting down...");
    session.shutdown();
    Ok(())
}
