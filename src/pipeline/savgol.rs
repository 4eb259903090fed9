//! Savitzky-Golay smoothing filter
//!
//! A weighted moving average over the most recent
//! [`FILTER_WINDOW`](crate::config::FILTER_WINDOW) raw readings using a
//! fixed polynomial-derived kernel. The coefficients sum to exactly 1, so a
//! constant input passes through unchanged.
//!
//! All accumulation is done in `Decimal`: the filter runs for hours at a
//! time and binary floating point would accumulate rounding error in the
//! weighted sums.

use crate::config::FILTER_WINDOW;
use crate::types::{BoundedSeries, RawReading, SmoothedReading};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Smoothing kernel, index 0 applied to the most recent sample
pub const COEFFICIENTS: [Decimal; FILTER_WINDOW] = [
    dec!(0.27473),
    dec!(0.24176),
    dec!(0.20879),
    dec!(0.17582),
    dec!(0.14286),
    dec!(0.10989),
    dec!(0.07692),
    dec!(0.04396),
    dec!(0.01099),
    dec!(-0.02198),
    dec!(-0.05495),
    dec!(-0.08791),
    dec!(-0.12088),
];

/// Savitzky-Golay filter over the raw reading history
///
/// Stateless: the history buffer is the filter state. Produces no output
/// until the buffer holds a full window of samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavitzkyGolay;

impl SavitzkyGolay {
    /// Apply the kernel to the most recent window of the history
    ///
    /// Returns `None` while fewer than [`FILTER_WINDOW`] samples are
    /// available. Output point = sum of `COEFFICIENTS[i] * history[latest - i]`,
    /// applied independently to ppm and mv. Metadata (time, date, range,
    /// alarm) is carried over from the most recent contributing reading.
    pub fn smooth(history: &BoundedSeries<RawReading>) -> Option<SmoothedReading> {
        if history.len() < FILTER_WINDOW {
            return None;
        }

        let mut ppm = Decimal::ZERO;
        let mut mv = Decimal::ZERO;
        for (i, coeff) in COEFFICIENTS.iter().enumerate() {
            let sample = history.nth_latest(i)?;
            ppm += coeff * sample.ppm;
            mv += coeff * sample.mv;
        }

        let newest = history.latest()?;
        Some(SmoothedReading {
            ppm,
            mv,
            time: newest.time.clone(),
            date: newest.date.clone(),
            range: newest.range.clone(),
            alarm_conditions: newest.alarm_conditions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ppm: Decimal, mv: Decimal) -> RawReading {
        RawReading {
            ppm,
            mv,
            time: "10:00:00".to_string(),
            date: "01/01/24".to_string(),
            range: "R1".to_string(),
            alarm_conditions: String::new(),
        }
    }

    #[test]
    fn test_coefficients_sum_to_one() {
        let sum: Decimal = COEFFICIENTS.iter().sum();
        assert_eq!(sum, Decimal::ONE);
    }

    #[test]
    fn test_no_output_below_window() {
        let mut history = BoundedSeries::new(120);
        for _ in 0..(FILTER_WINDOW - 1) {
            history.push(reading(dec!(100), dec!(5)));
            assert!(SavitzkyGolay::smooth(&history).is_none());
        }
    }

    #[test]
    fn test_constant_input_passes_through_exactly() {
        let mut history = BoundedSeries::new(120);
        for _ in 0..FILTER_WINDOW {
            history.push(reading(dec!(100), dec!(5)));
        }
        let smoothed = SavitzkyGolay::smooth(&history).unwrap();
        // Coefficients sum to 1, so a constant signal is reproduced exactly
        assert_eq!(smoothed.ppm.normalize(), dec!(100));
        assert_eq!(smoothed.mv.normalize(), dec!(5));
    }

    #[test]
    fn test_hand_computed_window() {
        // Newest sample 1, all older samples 0: output = COEFFICIENTS[0]
        let mut history = BoundedSeries::new(120);
        for _ in 0..(FILTER_WINDOW - 1) {
            history.push(reading(Decimal::ZERO, Decimal::ZERO));
        }
        history.push(reading(Decimal::ONE, Decimal::ONE));

        let smoothed = SavitzkyGolay::smooth(&history).unwrap();
        assert_eq!(smoothed.ppm, COEFFICIENTS[0]);
        assert_eq!(smoothed.mv, COEFFICIENTS[0]);
    }

    #[test]
    fn test_metadata_from_newest_reading() {
        let mut history = BoundedSeries::new(120);
        for _ in 0..(FILTER_WINDOW - 1) {
            history.push(reading(dec!(1), dec!(1)));
        }
        let mut newest = reading(dec!(1), dec!(1));
        newest.time = "23:59:59".to_string();
        history.push(newest);

        let smoothed = SavitzkyGolay::smooth(&history).unwrap();
        assert_eq!(smoothed.time, "23:59:59");
        assert_eq!(smoothed.range, "R1");
    }

    #[test]
    fn test_uses_only_latest_window() {
        // Older-than-window samples must not affect the output
        let mut a = BoundedSeries::new(120);
        let mut b = BoundedSeries::new(120);
        a.push(reading(dec!(99999), dec!(99999)));
        for _ in 0..FILTER_WINDOW {
            a.push(reading(dec!(7), dec!(3)));
            b.push(reading(dec!(7), dec!(3)));
        }
        assert_eq!(SavitzkyGolay::smooth(&a), SavitzkyGolay::smooth(&b));
    }
}
