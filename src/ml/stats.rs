//! Small descriptive statistics shared by the forecasting and insight code.

use linregress::{FormulaRegressionBuilder, RegressionDataBuilder};
use statrs::statistics::Statistics;
use tracing::debug;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Sample standard deviation (n - 1 denominator). `None` below two points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev())
}

/// Ordinary least squares fit of `values` against the index `0..n`.
/// Returns `(slope, intercept)`, or `None` below two points.
pub fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    // Two points leave no residual degrees of freedom; the line is exact.
    if n == 2 {
        return Some((values[1] - values[0], values[0]));
    }

    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let data = vec![("Y".to_string(), values.to_vec()), ("X".to_string(), x)];
    let fitted = RegressionDataBuilder::new().build_from(data).and_then(|data| {
        FormulaRegressionBuilder::new()
            .data(&data)
            .formula("Y ~ X")
            .fit()
    });

    match fitted {
        // parameters() is [intercept, slope]
        Ok(model) => {
            let params = model.parameters();
            Some((params[1], params[0]))
        }
        Err(e) => {
            debug!(points = n, "Linear fit failed: {e}");
            None
        }
    }
}

/// Drop NaN entries.
pub fn clean(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(sample_std(&[1.0]), None);
        let sd = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn test_linear_fit() {
        let (slope, intercept) = linear_fit(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
        assert_eq!(linear_fit(&[4.0]), None);
    }

    #[test]
    fn test_linear_fit_noisy_and_flat() {
        // least squares through (0,1) (1,3) (2,2): slope 0.5, intercept 1.5
        let (slope, intercept) = linear_fit(&[1.0, 3.0, 2.0]).unwrap();
        assert!((slope - 0.5).abs() < 1e-9);
        assert!((intercept - 1.5).abs() < 1e-9);

        let (slope, intercept) = linear_fit(&[5.0, 5.0, 5.0, 5.0]).unwrap();
        assert!(slope.abs() < 1e-9);
        assert!((intercept - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_two_points() {
        assert_eq!(linear_fit(&[2.0, 5.0]), Some((3.0, 2.0)));
    }
}
