//! Aggregate session state
//!
//! One value owns everything the monitor knows: connection status, the
//! sliding histories, chart data with its extrema queues, the zero offset
//! and the leak-rate test state. The worker thread is the single writer;
//! observers receive snapshots.

use crate::config::{LeakDetectionConfig, MonitorConfig};
use crate::pipeline::leak::LeakState;
use crate::types::{
    BoundedSeries, ChartPoint, ConnectionStatus, ExtremaKind, ExtremaQueue, RawReading,
    SmoothedReading,
};
use rust_decimal::Decimal;

/// Everything the monitor session tracks
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Connection state machine position
    pub status: ConnectionStatus,
    /// Name of the connected (or connecting) device
    pub device_name: Option<String>,
    /// Last connection error, kept across the Error -> Disconnected cleanup
    pub error_message: Option<String>,
    /// Whether reading requests are being sent periodically
    pub polling: bool,
    /// Command echoed by the device, pending its payload delivery
    pub last_command: Option<char>,
    /// Raw readings in arrival order
    pub raw_history: BoundedSeries<RawReading>,
    /// Filter output, starts filling once the filter is warm
    pub smoothed_history: BoundedSeries<SmoothedReading>,
    /// Transformed points as plotted
    pub chart_data: BoundedSeries<ChartPoint>,
    /// Running maximum of the charted window
    pub max_queue: ExtremaQueue,
    /// Running minimum of the charted window
    pub min_queue: ExtremaQueue,
    /// Baseline concentration subtracted before charting
    pub zero_offset: Option<Decimal>,
    /// Leak-rate test and rise-detection state
    pub leak: LeakState,
    /// Most recent trend estimate of the charted values
    pub slope: Option<f64>,
    /// Padded y-axis range for rendering
    pub render_range: Option<(f64, f64)>,
    /// Active leak-detection parameters
    pub leak_config: LeakDetectionConfig,
}

impl SessionState {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            device_name: None,
            error_message: None,
            polling: false,
            last_command: None,
            raw_history: BoundedSeries::new(config.history_capacity),
            smoothed_history: BoundedSeries::new(config.history_capacity),
            chart_data: BoundedSeries::new(config.history_capacity),
            max_queue: ExtremaQueue::new(ExtremaKind::Max),
            min_queue: ExtremaQueue::new(ExtremaKind::Min),
            zero_offset: None,
            leak: LeakState::default(),
            slope: None,
            render_range: None,
            leak_config: config.leak.clone(),
        }
    }

    /// Capture the most recent concentration as the zero baseline
    ///
    /// No-op while a zero is already set or before any reading has arrived;
    /// returns whether the offset changed.
    pub fn zero(&mut self) -> bool {
        if self.zero_offset.is_some() {
            return false;
        }
        match self.raw_history.latest() {
            Some(reading) => {
                self.zero_offset = Some(reading.ppm);
                true
            }
            None => false,
        }
    }

    /// Drop the zero baseline, returning charted values to absolute ppm
    pub fn clear_zero(&mut self) {
        self.zero_offset = None;
    }

    /// Replace the leak-detection parameters
    pub fn set_leak_config(&mut self, config: LeakDetectionConfig) {
        self.leak_config = config;
    }

    /// Discard all measurement-derived state
    ///
    /// Connection status, device name and polling are untouched; the session
    /// keeps running against the same device with a clean slate.
    pub fn reset_measurements(&mut self) {
        self.last_command = None;
        self.raw_history.clear();
        self.smoothed_history.clear();
        self.chart_data.clear();
        self.max_queue.clear();
        self.min_queue.clear();
        self.zero_offset = None;
        self.leak = LeakState::default();
        self.slope = None;
        self.render_range = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reading(ppm: Decimal) -> RawReading {
        RawReading {
            ppm,
            mv: dec!(5),
            time: "10:00:00".to_string(),
            date: "01/01/24".to_string(),
            range: String::new(),
            alarm_conditions: String::new(),
        }
    }

    #[test]
    fn test_zero_requires_a_reading() {
        let mut state = SessionState::new(&MonitorConfig::default());
        assert!(!state.zero());
        assert_eq!(state.zero_offset, None);

        state.raw_history.push(reading(dec!(42.5)));
        assert!(state.zero());
        assert_eq!(state.zero_offset, Some(dec!(42.5)));
    }

    #[test]
    fn test_zero_does_not_overwrite() {
        let mut state = SessionState::new(&MonitorConfig::default());
        state.raw_history.push(reading(dec!(10)));
        assert!(state.zero());

        state.raw_history.push(reading(dec!(99)));
        assert!(!state.zero());
        assert_eq!(state.zero_offset, Some(dec!(10)));

        state.clear_zero();
        assert!(state.zero());
        assert_eq!(state.zero_offset, Some(dec!(99)));
    }

    #[test]
    fn test_reset_keeps_connection() {
        let mut state = SessionState::new(&MonitorConfig::default());
        state.status = ConnectionStatus::Connected;
        state.device_name = Some("HXG-3P".to_string());
        state.polling = true;
        state.raw_history.push(reading(dec!(10)));
        state.zero();
        state.leak.leak_detected = true;
        state.last_command = Some('d');

        state.reset_measurements();

        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.device_name.as_deref(), Some("HXG-3P"));
        assert!(state.polling);
        assert!(state.raw_history.is_empty());
        assert!(state.chart_data.is_empty());
        assert_eq!(state.zero_offset, None);
        assert!(!state.leak.leak_detected);
        assert_eq!(state.last_command, None);
    }
}
