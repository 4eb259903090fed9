//! Reading replay from recorded log files
//!
//! Device logs are delimited text with some preamble before the actual
//! table. The header row is located by its column names, columns are mapped
//! by name rather than position, and rows that fail to parse are skipped so
//! one corrupt line never loses a whole recording.
//!
//! Replayed readings are fed to a running session through
//! [`SessionCommand::InjectReading`] at a fixed interval, exercising the
//! full pipeline without hardware.

use crate::error::{LeakwatchError, Result};
use crate::scheduler::PeriodicTask;
use crate::session::{SessionCommand, SessionHandle};
use crate::types::RawReading;
use crossbeam_channel::Sender;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Column that marks the header row
const MARKER_COLUMN: &str = "ppm";

/// Positions of the known columns within the table
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    ppm: usize,
    mv: Option<usize>,
    time: Option<usize>,
    date: Option<usize>,
    range: Option<usize>,
    alarm: Option<usize>,
}

impl ColumnMap {
    fn from_header(fields: &[&str]) -> Option<Self> {
        let find = |name: &str| {
            fields
                .iter()
                .position(|f| f.trim().eq_ignore_ascii_case(name))
        };
        Some(Self {
            ppm: find(MARKER_COLUMN)?,
            mv: find("mv"),
            time: find("time"),
            date: find("date"),
            range: find("range"),
            alarm: find("alarm"),
        })
    }
}

/// Load all readings from a recorded log file
pub fn load_readings(path: impl AsRef<Path>) -> Result<Vec<RawReading>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let readings = parse_readings(&text);
    if readings.is_empty() {
        return Err(LeakwatchError::Config(format!(
            "no readings found in {}",
            path.as_ref().display()
        )));
    }
    tracing::info!(
        path = %path.as_ref().display(),
        count = readings.len(),
        "loaded recorded readings"
    );
    Ok(readings)
}

/// Parse readings out of recorded log text
///
/// Everything before the header row is ignored. Rows after it that do not
/// parse are skipped with a trace.
pub fn parse_readings(text: &str) -> Vec<RawReading> {
    let mut columns: Option<ColumnMap> = None;
    let mut readings = Vec::new();

    for line in text.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        match columns {
            None => columns = ColumnMap::from_header(&fields),
            Some(map) => match parse_row(&fields, map) {
                Some(reading) => readings.push(reading),
                None => tracing::trace!(line, "skipping unparseable row"),
            },
        }
    }
    readings
}

fn parse_row(fields: &[&str], map: ColumnMap) -> Option<RawReading> {
    let ppm = Decimal::from_str(fields.get(map.ppm)?.trim()).ok()?;
    let mv = match map.mv.and_then(|i| fields.get(i)) {
        Some(field) => Decimal::from_str(field.trim()).ok()?,
        None => Decimal::ZERO,
    };
    let text_field = |idx: Option<usize>| {
        idx.and_then(|i| fields.get(i))
            .map(|f| f.trim().to_string())
            .unwrap_or_default()
    };
    Some(RawReading {
        ppm,
        mv,
        time: text_field(map.time),
        date: text_field(map.date),
        range: text_field(map.range),
        alarm_conditions: text_field(map.alarm),
    })
}

/// Feed recorded readings into a session at a fixed interval
///
/// Returns the driving task; dropping it stops the replay. Once the
/// recording is exhausted the task keeps ticking but sends nothing.
pub fn replay(
    readings: Vec<RawReading>,
    commands: Sender<SessionCommand>,
    interval: Duration,
) -> Result<PeriodicTask> {
    let mut pending = readings.into_iter();
    PeriodicTask::spawn("replay", interval, move || {
        if let Some(reading) = pending.next() {
            let _ = commands.send(SessionCommand::InjectReading(reading));
        }
    })
}

/// Replay into a running session
pub fn replay_into(
    session: &SessionHandle,
    readings: Vec<RawReading>,
    interval: Duration,
) -> Result<PeriodicTask> {
    replay(readings, session.commands.clone(), interval)
}
