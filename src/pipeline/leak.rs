//! Leak-rate estimation and leak detection
//!
//! Two independent mechanisms live here:
//!
//! - The leak-rate test: once the chamber is pumped down (ppm below the
//!   configured start threshold and the trend flat enough), the session
//!   enters test mode. The lowest leak rate seen since entering test mode is
//!   the baseline, and the current rate is reported relative to it as a
//!   0-255 color intensity.
//! - Rise detection: once a zero baseline is set, any charted value that
//!   exceeds its predecessor raises a latched leak flag that only operator
//!   acknowledgment clears.

use crate::config::LeakDetectionConfig;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Numerator of the ppm-to-leak-rate conversion, in mbar*l/s per ppm
const LEAK_RATE_PER_PPM: f64 = 1e-11;

/// Convert a concentration to an instantaneous leak rate
///
/// Undefined for non-positive concentrations.
pub fn leak_rate_from_ppm(ppm: Decimal) -> Option<f64> {
    if ppm <= Decimal::ZERO {
        return None;
    }
    ppm.to_f64().map(|p| LEAK_RATE_PER_PPM / p)
}

/// Leak-rate test state carried across readings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeakState {
    /// Test mode latch: set once activation conditions are met
    pub active: bool,
    /// Leak rate derived from the most recent reading
    pub leak_rate: Option<f64>,
    /// Lowest leak rate observed since the test started. Never increases
    /// while the test is running.
    pub base_leak_rate: Option<f64>,
    /// Indicator intensity, 0 at the baseline rate
    pub color_intensity: u8,
    /// Latched rise-detection flag, cleared only by acknowledgment
    pub leak_detected: bool,
}

impl LeakState {
    /// Fold one reading into the test state
    ///
    /// `slope` is the current trend of the charted values, `None` while the
    /// trend window is not yet full. Test mode cannot activate without a
    /// trend estimate.
    pub fn update(&mut self, ppm: Decimal, slope: Option<f64>, config: &LeakDetectionConfig) {
        self.leak_rate = leak_rate_from_ppm(ppm);

        if !self.active {
            let pumped_down = ppm
                .to_f64()
                .map(|p| p <= config.leak_rate_test_start)
                .unwrap_or(false);
            let stable = slope
                .map(|s| (s * config.slope_factor).abs() <= config.pumping_stability_rate)
                .unwrap_or(false);
            if pumped_down && stable {
                self.active = true;
            }
        }

        if !self.active {
            self.base_leak_rate = None;
            self.color_intensity = 0;
            return;
        }

        if let Some(rate) = self.leak_rate {
            let base = match self.base_leak_rate {
                Some(base) => base.min(rate),
                None => rate,
            };
            self.base_leak_rate = Some(base);
            self.color_intensity = color_intensity(rate, base, config);
        }
    }

    /// Raise the latched leak flag when a charted value rises above its
    /// predecessor
    ///
    /// Only armed while a zero baseline is set: with the baseline subtracted
    /// the chart should sit at its floor, so any rise is suspect. The very
    /// first charted point has no predecessor and cannot trigger.
    pub fn check_rise(&mut self, zeroed: bool, previous: Option<f64>, current: f64) {
        if !zeroed {
            return;
        }
        if let Some(previous) = previous {
            if current > previous {
                self.leak_detected = true;
            }
        }
    }

    /// Operator acknowledgment clears the latched flag
    pub fn acknowledge(&mut self) {
        self.leak_detected = false;
    }
}

/// Intensity of the leak indicator relative to the baseline rate
///
/// `255 * sensitivity * log10(rate / base)`, clamped to 0..=255. At the
/// baseline the ratio is 1 and the intensity 0.
fn color_intensity(rate: f64, base: f64, config: &LeakDetectionConfig) -> u8 {
    if base <= 0.0 || rate <= 0.0 {
        return 0;
    }
    let raw = 255.0 * config.leak_rate_color_sensitivity * (rate / base).log10();
    raw.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_leak_rate_conversion() {
        assert_eq!(leak_rate_from_ppm(dec!(1)), Some(1e-11));
        let rate = leak_rate_from_ppm(dec!(100)).unwrap();
        assert!((rate - 1e-13).abs() < 1e-25);
        assert_eq!(leak_rate_from_ppm(Decimal::ZERO), None);
        assert_eq!(leak_rate_from_ppm(dec!(-5)), None);
    }

    #[test]
    fn test_activation_requires_both_conditions() {
        let config = LeakDetectionConfig::default();
        let mut state = LeakState::default();

        // ppm low enough but trend too steep
        state.update(dec!(50), Some(0.5), &config);
        assert!(!state.active);

        // trend flat but ppm too high
        state.update(dec!(500), Some(0.0), &config);
        assert!(!state.active);

        // no trend estimate yet
        state.update(dec!(50), None, &config);
        assert!(!state.active);

        // both satisfied
        state.update(dec!(50), Some(0.0005), &config);
        assert!(state.active);
    }

    #[test]
    fn test_activation_latches() {
        let config = LeakDetectionConfig::default();
        let mut state = LeakState::default();
        state.update(dec!(50), Some(0.0), &config);
        assert!(state.active);

        // Conditions no longer hold, test keeps running
        state.update(dec!(5000), Some(10.0), &config);
        assert!(state.active);
    }

    #[test]
    fn test_baseline_is_running_minimum() {
        let config = LeakDetectionConfig::default();
        let mut state = LeakState::default();
        state.update(dec!(50), Some(0.0), &config);
        assert!(state.active);

        let mut previous_base = state.base_leak_rate.unwrap();
        // Rising ppm means falling leak rate, so the baseline should track it
        for ppm in [dec!(60), dec!(80), dec!(70), dec!(100), dec!(90)] {
            state.update(ppm, Some(0.0), &config);
            let base = state.base_leak_rate.unwrap();
            assert!(base <= previous_base);
            previous_base = base;
        }
        assert_eq!(previous_base, 1e-11 / 100.0);
    }

    #[test]
    fn test_color_intensity_zero_at_baseline() {
        let config = LeakDetectionConfig::default();
        let mut state = LeakState::default();
        state.update(dec!(100), Some(0.0), &config);
        assert!(state.active);
        assert_eq!(state.color_intensity, 0);
    }

    #[test]
    fn test_color_intensity_grows_then_saturates() {
        let config = LeakDetectionConfig::default();
        let mut state = LeakState::default();
        // Baseline at ppm = 100 (rate 1e-13)
        state.update(dec!(100), Some(0.0), &config);
        assert!(state.active);

        // ppm drops, rate rises above the baseline
        state.update(dec!(80), Some(0.0), &config);
        assert!(state.color_intensity > 0);
        assert!(state.color_intensity < 255);

        // Far above the baseline the indicator saturates
        state.update(dec!(0.001), Some(0.0), &config);
        assert_eq!(state.color_intensity, 255);
    }

    #[test]
    fn test_rise_latches_until_acknowledged() {
        let mut state = LeakState::default();
        state.check_rise(true, Some(0.0), 1.5);
        assert!(state.leak_detected);

        // Falling or flat data does not clear the latch
        state.check_rise(true, Some(1.5), 1.5);
        state.check_rise(true, Some(1.5), 0.5);
        assert!(state.leak_detected);

        state.acknowledge();
        assert!(!state.leak_detected);
    }

    #[test]
    fn test_rise_requires_zero_baseline() {
        let mut state = LeakState::default();
        state.check_rise(false, Some(0.0), 100.0);
        assert!(!state.leak_detected);
    }

    #[test]
    fn test_rise_needs_a_predecessor_and_a_strict_increase() {
        let mut state = LeakState::default();
        state.check_rise(true, None, 5.0);
        assert!(!state.leak_detected);

        state.check_rise(true, Some(5.0), 5.0);
        assert!(!state.leak_detected);

        state.check_rise(true, Some(5.0), 5.1);
        assert!(state.leak_detected);
    }
}
