//! Ordinary least squares slope estimation
//!
//! Estimates the trend of the most recent chart points. Samples are treated
//! as equally spaced: x is the sample index 0..n-1, y is the charted value.
//! The slope therefore has units of "charted value per sample", which is
//! what the pump-down stability check compares against.

/// Least-squares slope of `values` against their indices
///
/// Returns `None` for fewer than two samples, where a trend is undefined.
pub fn ols_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    Some((n_f * sum_xy - sum_x * sum_y) / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_below_two_samples() {
        assert_eq!(ols_slope(&[]), None);
        assert_eq!(ols_slope(&[42.0]), None);
    }

    #[test]
    fn test_flat_series_has_zero_slope() {
        let slope = ols_slope(&[5.0; 13]).unwrap();
        assert_eq!(slope, 0.0);
    }

    #[test]
    fn test_exact_linear_series() {
        // y = 3x + 1
        let values: Vec<f64> = (0..13).map(|i| 3.0 * i as f64 + 1.0).collect();
        let slope = ols_slope(&values).unwrap();
        assert!((slope - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_descending_series_is_negative() {
        let values: Vec<f64> = (0..13).map(|i| 100.0 - 2.0 * i as f64).collect();
        let slope = ols_slope(&values).unwrap();
        assert!((slope + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_samples() {
        let slope = ols_slope(&[1.0, 4.0]).unwrap();
        assert!((slope - 3.0).abs() < 1e-12);
    }
}
