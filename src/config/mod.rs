//! Configuration module for Leakwatch
//!
//! This module handles runtime configuration:
//! - Monitor settings (polling/draw intervals, window sizes, range padding)
//! - Operator-supplied leak-detection parameters with validation
//! - Loading/saving the monitor config as TOML
//!
//! # Validation
//!
//! Leak-detection parameters arrive from the operator as text. Validation is
//! all-or-nothing: if any field fails to parse, the whole update is rejected
//! and the prior configuration remains in effect.

use crate::error::{LeakwatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Capacity of the raw/smoothed/chart sliding windows
pub const HISTORY_CAPACITY: usize = 120;

/// Window length of the Savitzky-Golay smoothing kernel
pub const FILTER_WINDOW: usize = 13;

/// Number of most recent chart points used for slope estimation
pub const SLOPE_WINDOW: usize = 13;

/// Default interval between outbound reading requests
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default interval between chart redraws
pub const DEFAULT_DRAW_INTERVAL_MS: u64 = 1000;

/// Operator-tunable leak-detection parameters
///
/// Immutable once set; replaced wholesale on reconfiguration via
/// [`LeakDetectionConfig::from_fields`] or a saved config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakDetectionConfig {
    /// Reference leak rate for the device class
    pub leak_rate_standard: f64,
    /// Maximum slope magnitude (after scaling) considered "pumped down"
    pub pumping_stability_rate: f64,
    /// Number of stable readings before leak-rate output is considered settled
    pub minimum_count_for_leak_rate: u32,
    /// ppm threshold below which leak-rate testing can begin
    pub leak_rate_test_start: f64,
    /// Scale factor applied to the slope before the stability comparison
    pub slope_factor: f64,
    /// Sensitivity of the leak-rate color indicator
    pub leak_rate_color_sensitivity: f64,
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            leak_rate_standard: 1e-12,
            pumping_stability_rate: 0.1,
            minimum_count_for_leak_rate: 5,
            leak_rate_test_start: 100.0,
            slope_factor: 100.0,
            leak_rate_color_sensitivity: 5.0,
        }
    }
}

impl LeakDetectionConfig {
    /// Build a config from operator-supplied text fields
    ///
    /// All-or-nothing: the first unparseable field fails the whole update
    /// and the caller keeps its previous configuration.
    pub fn from_fields(
        leak_rate_standard: &str,
        pumping_stability_rate: &str,
        minimum_count_for_leak_rate: &str,
        leak_rate_test_start: &str,
        slope_factor: &str,
        leak_rate_color_sensitivity: &str,
    ) -> Result<Self> {
        Ok(Self {
            leak_rate_standard: parse_float("leak_rate_standard", leak_rate_standard)?,
            pumping_stability_rate: parse_float(
                "pumping_stability_rate",
                pumping_stability_rate,
            )?,
            minimum_count_for_leak_rate: parse_int(
                "minimum_count_for_leak_rate",
                minimum_count_for_leak_rate,
            )?,
            leak_rate_test_start: parse_float("leak_rate_test_start", leak_rate_test_start)?,
            slope_factor: parse_float("slope_factor", slope_factor)?,
            leak_rate_color_sensitivity: parse_float(
                "leak_rate_color_sensitivity",
                leak_rate_color_sensitivity,
            )?,
        })
    }
}

fn parse_float(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| LeakwatchError::Config(format!("{} must be a number, got {:?}", name, value)))
}

fn parse_int(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| LeakwatchError::Config(format!("{} must be an integer, got {:?}", name, value)))
}

/// Padding factors applied to the extrema when deriving the render range
///
/// The range is `[min * min_scale, max * max_scale]`. Deployments have used
/// 0.8/1.2 and 0.9/1.1; this is a tunable, not a constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePadding {
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for RangePadding {
    fn default() -> Self {
        Self {
            min_scale: 0.8,
            max_scale: 1.2,
        }
    }
}

/// Top-level monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between outbound "request reading" commands, in milliseconds
    pub poll_interval_ms: u64,
    /// Interval between chart surface refreshes, in milliseconds
    pub draw_interval_ms: u64,
    /// Sliding-window capacity for histories and chart data
    pub history_capacity: usize,
    /// Chart the smoothed ppm once the filter is warm, falling back to raw
    pub chart_smoothed: bool,
    /// Render-range padding factors
    pub range_padding: RangePadding,
    /// Leak-detection parameters
    pub leak: LeakDetectionConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            draw_interval_ms: DEFAULT_DRAW_INTERVAL_MS,
            history_capacity: HISTORY_CAPACITY,
            chart_smoothed: false,
            range_padding: RangePadding::default(),
            leak: LeakDetectionConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text)
            .map_err(|e| LeakwatchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| LeakwatchError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_device_class() {
        let cfg = LeakDetectionConfig::default();
        assert_eq!(cfg.leak_rate_standard, 1e-12);
        assert_eq!(cfg.pumping_stability_rate, 0.1);
        assert_eq!(cfg.minimum_count_for_leak_rate, 5);
        assert_eq!(cfg.leak_rate_test_start, 100.0);
        assert_eq!(cfg.slope_factor, 100.0);
        assert_eq!(cfg.leak_rate_color_sensitivity, 5.0);
    }

    #[test]
    fn test_from_fields_valid() {
        let cfg = LeakDetectionConfig::from_fields("1e-11", "0.2", "3", "50", "10", "2.5").unwrap();
        assert_eq!(cfg.leak_rate_standard, 1e-11);
        assert_eq!(cfg.pumping_stability_rate, 0.2);
        assert_eq!(cfg.minimum_count_for_leak_rate, 3);
        assert_eq!(cfg.leak_rate_test_start, 50.0);
        assert_eq!(cfg.slope_factor, 10.0);
        assert_eq!(cfg.leak_rate_color_sensitivity, 2.5);
    }

    #[test]
    fn test_from_fields_rejects_whole_update() {
        // One bad field fails the entire update
        let res = LeakDetectionConfig::from_fields("1e-11", "0.2", "three", "50", "10", "2.5");
        assert!(matches!(res, Err(LeakwatchError::Config(_))));

        let res = LeakDetectionConfig::from_fields("", "0.2", "3", "50", "10", "2.5");
        assert!(res.is_err());
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        let mut cfg = MonitorConfig::default();
        cfg.poll_interval_ms = 250;
        cfg.range_padding = RangePadding {
            min_scale: 0.9,
            max_scale: 1.1,
        };
        cfg.save(&path).unwrap();

        let loaded = MonitorConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: MonitorConfig = toml::from_str("poll_interval_ms = 500").unwrap();
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.draw_interval_ms, DEFAULT_DRAW_INTERVAL_MS);
        assert_eq!(cfg.leak, LeakDetectionConfig::default());
    }
}
