//! Chart surface abstraction
//!
//! The session worker does not render anything itself. On every draw tick
//! it pushes the current series and axis range to a [`ChartSurface`], which
//! a frontend implements however it likes. [`HeadlessChart`] records the
//! calls for tests and for the log-only binary.

use crate::types::ChartPoint;

/// RGBA color, 0-255 per channel
pub type Color = [u8; 4];

/// One named series as handed to the surface
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesUpdate {
    pub name: String,
    pub points: Vec<ChartPoint>,
    pub color: Color,
    pub visible: bool,
}

/// Rendering target for the monitor session
///
/// Implementations must be `Send`: the worker thread owns the surface and
/// drives it from draw ticks.
pub trait ChartSurface: Send {
    /// One-time setup before the first draw
    fn configure(&mut self);

    /// Update the y-axis render range
    fn set_range(&mut self, min: f64, max: f64);

    /// Replace the contents of one series
    fn draw_series(&mut self, update: SeriesUpdate);

    /// Toggle a series without re-sending its points
    fn set_visibility(&mut self, name: &str, visible: bool);
}

/// Recording surface with no output
///
/// Keeps the last state pushed by the worker so tests and the headless
/// binary can inspect what would have been rendered.
#[derive(Debug, Default)]
pub struct HeadlessChart {
    configured: bool,
    range: Option<(f64, f64)>,
    series: Vec<SeriesUpdate>,
}

impl HeadlessChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn series(&self, name: &str) -> Option<&SeriesUpdate> {
        self.series.iter().find(|s| s.name == name)
    }
}

impl ChartSurface for HeadlessChart {
    fn configure(&mut self) {
        self.configured = true;
    }

    fn set_range(&mut self, min: f64, max: f64) {
        self.range = Some((min, max));
    }

    fn draw_series(&mut self, update: SeriesUpdate) {
        match self.series.iter_mut().find(|s| s.name == update.name) {
            Some(existing) => *existing = update,
            None => self.series.push(update),
        }
    }

    fn set_visibility(&mut self, name: &str, visible: bool) {
        if let Some(series) = self.series.iter_mut().find(|s| s.name == name) {
            series.visible = visible;
        }
    }
}

/// Format a log-scaled chart value as the concentration it represents
///
/// The y axis holds `log10(ppm)`; tick labels show the concentration in
/// scientific notation. The chart floor of 0 displays as a plain zero.
pub fn format_log_value(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{:.2e}", 10f64.powf(value))
    }
}
