//! Core data types for Leakwatch
//!
//! This module contains the fundamental data structures used throughout
//! the application for representing sensor readings and chart data.
//!
//! # Main Types
//!
//! - [`RawReading`] - A parsed sensor reading with exact-decimal ppm/mv
//! - [`SmoothedReading`] - Filter output, same shape as a raw reading
//! - [`ChartPoint`] - A plottable (x, y) pair with a synthetic sample index
//! - [`BoundedSeries`] - Fixed-capacity sliding window, oldest-evicted
//! - [`ExtremaQueue`] - Monotonic deque tracking the running window extremum
//!
//! # Memory Management
//!
//! Reading history and chart data live in bounded windows of
//! [`HISTORY_CAPACITY`](crate::config::HISTORY_CAPACITY) elements. When a
//! window is full, pushing evicts the oldest element automatically.
//!
//! # Decimal Arithmetic
//!
//! `ppm` and `mv` are `rust_decimal::Decimal`, not floats. The smoothing
//! filter accumulates weighted sums over long runs, and binary floating
//! point would drift; values downgrade to `f64` only at the chart boundary.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single sensor reading as parsed off the wire
///
/// Immutable once constructed. Produced by the protocol codec from a
/// "d"-class frame; consumed by the history buffer and the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Gas concentration in parts per million
    pub ppm: Decimal,
    /// Sensor element voltage in millivolts
    pub mv: Decimal,
    /// Device-reported time of day, `HH:mm:ss`
    pub time: String,
    /// Device-reported date, `dd/MM/yy`
    pub date: String,
    /// Measurement range identifier (may be empty)
    pub range: String,
    /// Alarm condition flags (may be empty)
    pub alarm_conditions: String,
}

impl RawReading {
    /// Combine the device-reported date and time fields into a timestamp.
    ///
    /// Returns `None` when either field does not parse; the reading itself
    /// stays valid, since the pipeline keys on the sample index rather than
    /// wall-clock time.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, "%d/%m/%y").ok()?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M:%S").ok()?;
        Some(NaiveDateTime::new(date, time))
    }
}

/// Output of the smoothing filter
///
/// Same shape as [`RawReading`] with `ppm`/`mv` replaced by filter output.
/// Derived, never independently constructed: only
/// [`SavitzkyGolay`](crate::pipeline::savgol::SavitzkyGolay) produces these.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedReading {
    /// Filtered gas concentration
    pub ppm: Decimal,
    /// Filtered element voltage
    pub mv: Decimal,
    /// Time of day copied from the most recent contributing reading
    pub time: String,
    /// Date copied from the most recent contributing reading
    pub date: String,
    /// Range copied from the most recent contributing reading
    pub range: String,
    /// Alarm conditions copied from the most recent contributing reading
    pub alarm_conditions: String,
}

/// A plottable chart point
///
/// `x` is a synthetic, monotonically increasing sample counter starting at 1,
/// not wall-clock time. `y` is the transformed value (log-scaled or raw).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

impl ChartPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fixed-capacity sliding window with FIFO eviction
///
/// Insertion appends; once full, pushing evicts and returns the oldest
/// element. Invariant: `len() <= capacity()` always, and iteration order is
/// insertion (chronological) order.
#[derive(Debug, Clone)]
pub struct BoundedSeries<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedSeries<T> {
    /// Create an empty series with the given maximum length
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an element, evicting and returning the oldest when full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently pushed element
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Element `n` positions back from the most recent (0 = most recent)
    pub fn nth_latest(&self, n: usize) -> Option<&T> {
        let len = self.items.len();
        if n >= len {
            return None;
        }
        self.items.get(len - 1 - n)
    }

    /// Iterate in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedSeries<T> {
    /// Copy out the window contents in chronological order
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Which extremum an [`ExtremaQueue`] tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremaKind {
    /// Front of the queue is the running maximum
    Max,
    /// Front of the queue is the running minimum
    Min,
}

impl ExtremaKind {
    /// Whether `a` dominates `b` under this queue's ordering
    #[inline]
    fn dominates(self, a: f64, b: f64) -> bool {
        match self {
            ExtremaKind::Max => a > b,
            ExtremaKind::Min => a < b,
        }
    }
}

/// Monotonic deque tracking the running extremum of a sliding window
///
/// For a max-queue every element is `>=` all elements after it, so the front
/// is always the running maximum of the current window; a min-queue is the
/// mirror image. The window owner must call [`ExtremaQueue::on_evicted`]
/// whenever it drops its oldest element: if that element's y equals the
/// queue's front, the front is popped. This relies on exact value equality
/// between the window and the queue head, which holds because both store the
/// same `f64` values untouched.
#[derive(Debug, Clone)]
pub struct ExtremaQueue {
    points: VecDeque<ChartPoint>,
    kind: ExtremaKind,
}

impl ExtremaQueue {
    pub fn new(kind: ExtremaKind) -> Self {
        Self {
            points: VecDeque::new(),
            kind,
        }
    }

    pub fn kind(&self) -> ExtremaKind {
        self.kind
    }

    /// The running extremum of the current window
    pub fn front(&self) -> Option<ChartPoint> {
        self.points.front().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Account for the window evicting its oldest element
    pub fn on_evicted(&mut self, evicted: &ChartPoint) {
        if let Some(front) = self.points.front() {
            if front.y == evicted.y {
                self.points.pop_front();
            }
        }
    }

    /// Fold a newly appended window element into the queue
    ///
    /// If the new point dominates the front, the whole queue collapses to
    /// just the new point. Otherwise dominated elements are popped off the
    /// back before the new point is appended.
    pub fn observe(&mut self, point: ChartPoint) {
        match self.points.front() {
            Some(front) if self.kind.dominates(point.y, front.y) => {
                self.points.clear();
                self.points.push_back(point);
            }
            Some(_) => {
                while let Some(back) = self.points.back() {
                    if self.kind.dominates(point.y, back.y) {
                        self.points.pop_back();
                    } else {
                        break;
                    }
                }
                self.points.push_back(point);
            }
            None => self.points.push_back(point),
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Connection state of the sensor link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected to any device
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection error occurred; transitions back to Disconnected once
    /// resources are released
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}
