use crate::ml::stats::{clean, linear_fit, mean};
use crate::models::{Frequency, Trend, TrendReport};

/// Minimum points for a trend fit.
pub const MIN_TREND_POINTS: usize = 3;
/// Minimum points before any seasonal profile is attempted.
pub const MIN_SEASONALITY_POINTS: usize = 24;
/// Slopes smaller than this in magnitude count as flat.
const FLAT_SLOPE: f64 = 1e-9;

/// Fit a line over the index and classify its slope. NaN entries are
/// dropped first.
pub fn trend_analysis(y: &[f64]) -> TrendReport {
    let y = clean(y);
    let fit = if y.len() >= MIN_TREND_POINTS { linear_fit(&y) } else { None };
    let Some((slope, intercept)) = fit else {
        return TrendReport {
            trend: Trend::InsufficientData,
            slope: 0.0,
            intercept: None,
            change_rate: None,
        };
    };

    let trend = if slope > FLAT_SLOPE {
        Trend::Increasing
    } else if slope < -FLAT_SLOPE {
        Trend::Decreasing
    } else {
        Trend::Stable
    };

    let avg = mean(&y).unwrap_or(0.0);
    let change_rate = if avg != 0.0 { slope / avg * 100.0 } else { 0.0 };

    TrendReport {
        trend,
        slope,
        intercept: Some(intercept),
        change_rate: Some(change_rate),
    }
}

/// Seasonal index: the mean of every phase of a cycle of
/// `freq.season_length()` points.
///
/// Needs at least two full cycles and at least 24 points; returns `None`
/// otherwise.
pub fn detect_seasonality(y: &[f64], freq: Frequency) -> Option<Vec<f64>> {
    let season_length = freq.season_length();
    if y.len() < MIN_SEASONALITY_POINTS || y.len() < season_length * 2 {
        return None;
    }

    let indices = (0..season_length)
        .map(|phase| {
            let phase_values: Vec<f64> = y
                .iter()
                .skip(phase)
                .step_by(season_length)
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            mean(&phase_values).unwrap_or(f64::NAN)
        })
        .collect();
    Some(indices)
}
