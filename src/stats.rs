//! Statistics kernel
//!
//! Pure numeric functions over ordered value sequences: trend
//! classification, fit confidence, percent change, and Pearson correlation.
//! No I/O. Callers guarantee chronological order; index position stands in
//! for elapsed time, so the window is treated as equally spaced.

use crate::error::{AsclepiusError, Result};
use crate::types::TrendDirection;

/// Slope threshold factor relative to the window mean
const SLOPE_THRESHOLD_FACTOR: f64 = 0.1;

/// Standard-deviation factor relative to the mean above which a
/// non-trending window is classified volatile
const VOLATILITY_FACTOR: f64 = 0.3;

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than 2 values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Ordinary least-squares fit of `values` against index positions
///
/// Returns `(slope, intercept)`, or `None` when the fit is degenerate
/// (fewer than 2 points, or zero index variance).
pub fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let xs_mean = (n - 1) as f64 / 2.0;
    let ys_mean = mean(values);

    let mut ss_xx = 0.0;
    let mut ss_xy = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - xs_mean;
        ss_xx += dx * dx;
        ss_xy += dx * (y - ys_mean);
    }

    // Cannot happen with distinct index positions, but guard anyway
    if ss_xx == 0.0 {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let intercept = ys_mean - slope * xs_mean;
    Some((slope, intercept))
}

/// Classify the direction of an ordered window
///
/// Fits a least-squares line against index positions and compares the slope
/// to `0.1 * |mean|`. Windows that neither rise nor fall past the threshold
/// are `Volatile` when the standard deviation exceeds `0.3 * |mean|`, else
/// `Stable`. Fewer than 2 values classify as `Stable`.
pub fn classify_trend(values: &[f64]) -> TrendDirection {
    let Some((slope, _)) = linear_fit(values) else {
        return TrendDirection::Stable;
    };

    // Thresholds scale with the magnitude of the level; a negative mean
    // must not flip their sign
    let scale = mean(values).abs();
    let threshold = SLOPE_THRESHOLD_FACTOR * scale;

    if slope > threshold {
        TrendDirection::Increasing
    } else if slope < -threshold {
        TrendDirection::Decreasing
    } else if std_dev(values) > VOLATILITY_FACTOR * scale {
        TrendDirection::Volatile
    } else {
        TrendDirection::Stable
    }
}

/// Confidence of the linear fit as R² scaled to [0, 100]
///
/// Returns 0.0 for fewer than 3 values, and 0.0 when the window has no
/// variance at all (SS_tot == 0), since a flat window carries no evidence
/// of a trend.
pub fn confidence(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let Some((slope, intercept)) = linear_fit(values) else {
        return 0.0;
    };

    let ys_mean = mean(values);
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - ys_mean).powi(2);
    }

    if ss_tot == 0.0 {
        return 0.0;
    }

    let r_squared = 1.0 - ss_res / ss_tot;
    (r_squared * 100.0).clamp(0.0, 100.0)
}

/// Change from the first to the last value of the window, in percent
///
/// Errors with [`AsclepiusError::ZeroBaseline`] when the first value is
/// zero; the caller decides whether to guard, reject, or substitute.
pub fn percent_change(values: &[f64]) -> Result<f64> {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return Ok(0.0);
    };
    if *first == 0.0 {
        return Err(AsclepiusError::ZeroBaseline);
    }
    Ok((last - first) / first * 100.0)
}

/// Pearson correlation coefficient between two matching-index series
///
/// Defined only for equal lengths greater than 3; `None` otherwise, and
/// `None` when either series has zero variance.
pub fn correlate(series_a: &[f64], series_b: &[f64]) -> Option<f64> {
    let n = series_a.len();
    if n != series_b.len() || n <= 3 {
        return None;
    }

    let mean_a = mean(series_a);
    let mean_b = mean(series_b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in series_a.iter().zip(series_b.iter()) {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return None;
    }

    Some((cov / denom).clamp(-1.0, 1.0))
}
