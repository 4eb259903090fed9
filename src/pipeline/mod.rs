//! Measurement pipeline
//!
//! Pure data-flow layer between the protocol codec and the session worker.
//! Every accepted reading passes through the same fold:
//!
//! 1. append to the raw history
//! 2. run the Savitzky-Golay filter once the window is warm
//! 3. transform the charted concentration (zero offset, log scale)
//! 4. append the chart point, maintaining both extrema queues
//! 5. derive the padded render range from the window extrema
//! 6. estimate the trend and fold the reading into the leak state
//!
//! The pipeline itself is stateless configuration; all mutable state lives
//! in [`SessionState`] so the worker can hand out snapshots.
//!
//! # Submodules
//!
//! - [`savgol`] - smoothing filter
//! - [`slope`] - least-squares trend estimation
//! - [`leak`] - leak-rate test and rise detection

pub mod leak;
pub mod savgol;
pub mod slope;

use crate::config::{MonitorConfig, RangePadding, SLOPE_WINDOW};
use crate::session::SessionState;
use crate::types::{ChartPoint, RawReading};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use savgol::SavitzkyGolay;

/// Configuration of the per-reading fold
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Chart the filter output instead of raw readings once available
    chart_smoothed: bool,
    /// Scale factors applied to the window extrema for the render range
    range_padding: RangePadding,
    /// Trend and rise-detection window length
    slope_window: usize,
}

impl Pipeline {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            chart_smoothed: config.chart_smoothed,
            range_padding: config.range_padding,
            slope_window: SLOPE_WINDOW,
        }
    }

    /// Fold one accepted reading into the session state
    pub fn apply_reading(&self, state: &mut SessionState, reading: RawReading) {
        state.raw_history.push(reading.clone());

        if let Some(smoothed) = SavitzkyGolay::smooth(&state.raw_history) {
            state.smoothed_history.push(smoothed);
        }

        // Chart the smoothed value once the filter is warm; before that the
        // raw reading keeps the chart moving.
        let charted_ppm = if self.chart_smoothed {
            state
                .smoothed_history
                .latest()
                .map(|s| s.ppm)
                .unwrap_or(reading.ppm)
        } else {
            reading.ppm
        };

        let y = transform_value(charted_ppm, state.zero_offset);
        let (x, previous_y) = match state.chart_data.latest() {
            Some(previous) => (previous.x + 1.0, Some(previous.y)),
            None => (1.0, None),
        };
        let point = ChartPoint::new(x, y);

        if let Some(evicted) = state.chart_data.push(point) {
            state.max_queue.on_evicted(&evicted);
            state.min_queue.on_evicted(&evicted);
        }
        state.max_queue.observe(point);
        state.min_queue.observe(point);

        state.render_range = self.render_range(state);

        let ys: Vec<f64> = state.chart_data.iter().map(|p| p.y).collect();
        state.slope = if ys.len() >= self.slope_window {
            slope::ols_slope(&ys[ys.len() - self.slope_window..])
        } else {
            None
        };

        state
            .leak
            .check_rise(state.zero_offset.is_some(), previous_y, y);
        state.leak.update(reading.ppm, state.slope, &state.leak_config);
    }

    /// Padded y-axis range derived from the window extrema
    fn render_range(&self, state: &SessionState) -> Option<(f64, f64)> {
        let min = state.min_queue.front()?.y;
        let max = state.max_queue.front()?.y;
        Some((
            min * self.range_padding.min_scale,
            max * self.range_padding.max_scale,
        ))
    }
}

/// Transform a concentration into its charted value
///
/// The zero offset, when set, is subtracted first. Non-positive results chart
/// as 0; positive results chart as their base-10 logarithm, so each unit on
/// the y axis is a decade of concentration.
pub fn transform_value(ppm: Decimal, zero_offset: Option<Decimal>) -> f64 {
    let adjusted = match zero_offset {
        Some(zero) => ppm - zero,
        None => ppm,
    };
    if adjusted <= Decimal::ZERO {
        return 0.0;
    }
    adjusted.to_f64().map(f64::log10).unwrap_or(0.0)
}
