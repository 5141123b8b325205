//! Short-horizon statistical forecasting of a target series.
//!
//! Every method produces `periods` non-negative values for consecutive
//! future steps. Gaussian noise proportional to the history's spread is
//! added afterwards; pass a seed (or disable noise) for repeatable output.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use statrs::distribution::{ContinuousCDF, Normal as Gaussian};
use tracing::debug;

use crate::config::ForecastConfig;
use crate::errors::PipelineError;
use crate::ml::stats::{clean, linear_fit, mean, sample_std};
use crate::models::{ConfidenceBounds, ForecastMethod, ForecastMetrics, ForecastResult};

const MA_MAX_WINDOW: usize = 30;
const MA_TREND_SPAN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfig {
    /// Noise standard deviation as a fraction of the history's std.
    pub ratio: f64,
    pub seed: Option<u64>,
}

impl NoiseConfig {
    pub fn disabled() -> Self {
        Self { ratio: 0.0, seed: None }
    }

    pub fn seeded(ratio: f64, seed: u64) -> Self {
        Self { ratio, seed: Some(seed) }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { ratio: 0.1, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecaster {
    alpha: f64,
    noise: NoiseConfig,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            noise: NoiseConfig::default(),
        }
    }
}

impl Forecaster {
    pub fn new(alpha: f64, noise: NoiseConfig) -> Self {
        Self { alpha, noise }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            alpha: config.smoothing_alpha,
            noise: NoiseConfig {
                ratio: config.noise_ratio,
                seed: config.noise_seed,
            },
        }
    }

    /// Same smoothing, no noise.
    pub fn deterministic(&self) -> Self {
        Self {
            alpha: self.alpha,
            noise: NoiseConfig::disabled(),
        }
    }

    /// Forecast `periods` steps ahead. NaN entries of `y` are ignored; an
    /// empty history yields zeros.
    pub fn forecast(&self, y: &[f64], periods: usize, method: ForecastMethod) -> Vec<f64> {
        let y = clean(y);
        if y.is_empty() {
            return vec![0.0; periods];
        }

        let mut values = match method {
            ForecastMethod::MovingAverage => moving_average(&y, periods),
            ForecastMethod::Exponential => vec![exponential_level(&y, self.alpha); periods],
            ForecastMethod::LinearTrend => linear_trend(&y, periods),
            ForecastMethod::Mean => vec![mean(&y).unwrap_or(0.0); periods],
        };
        clip(&mut values);

        let sd = sample_std(&y).unwrap_or(0.0) * self.noise.ratio;
        if sd > 0.0 && sd.is_finite() {
            match self.noise.seed {
                Some(seed) => add_noise(&mut values, sd, &mut StdRng::seed_from_u64(seed)),
                None => add_noise(&mut values, sd, &mut rand::thread_rng()),
            }
            clip(&mut values);
        }

        debug!(%method, history = y.len(), periods, "Generated forecast");
        values
    }

    /// Moving-average forecast with a symmetric band of
    /// `z(confidence_level) * std(y)`.
    pub fn forecast_with_confidence(
        &self,
        y: &[f64],
        periods: usize,
        confidence_level: f64,
    ) -> Result<ForecastResult, PipelineError> {
        self.forecast_with_method_confidence(y, periods, ForecastMethod::default(), confidence_level)
    }

    pub fn forecast_with_method_confidence(
        &self,
        y: &[f64],
        periods: usize,
        method: ForecastMethod,
        confidence_level: f64,
    ) -> Result<ForecastResult, PipelineError> {
        let z = z_score(confidence_level)?;
        let values = self.forecast(y, periods, method);
        let margin = z * sample_std(&clean(y)).unwrap_or(0.0);

        let upper = values.iter().map(|v| v + margin).collect();
        let lower = values.iter().map(|v| (v - margin).max(0.0)).collect();

        Ok(ForecastResult {
            values,
            bounds: Some(ConfidenceBounds {
                upper,
                lower,
                confidence_level,
            }),
        })
    }

    /// Backtest `method` on the last `holdout` points of `y`, without noise.
    /// `None` when there is nothing to hold out or nothing left to train on.
    pub fn evaluate_holdout(
        &self,
        y: &[f64],
        holdout: usize,
        method: ForecastMethod,
    ) -> Option<ForecastMetrics> {
        let y = clean(y);
        if holdout == 0 || holdout >= y.len() {
            return None;
        }
        let (train, actual) = y.split_at(y.len() - holdout);
        let predicted = self.deterministic().forecast(train, holdout, method);

        let n = holdout as f64;
        let mae = actual.iter().zip(&predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
        let ss_res: f64 = actual.iter().zip(&predicted).map(|(a, p)| (a - p).powi(2)).sum();
        let mse = ss_res / n;

        let actual_mean = mean(actual)?;
        let ss_tot: f64 = actual.iter().map(|a| (a - actual_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(ForecastMetrics {
            method,
            holdout,
            mae,
            mse,
            rmse: mse.sqrt(),
            r2,
        })
    }
}

/// Two-sided standard normal quantile for a confidence level in (0, 1):
/// 0.95 gives 1.96, 0.99 gives 2.576.
pub fn z_score(confidence_level: f64) -> Result<f64, PipelineError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(PipelineError::invalid(format!(
            "confidence_level must be between 0 and 1 (exclusive), got {confidence_level}"
        )));
    }
    let standard = Gaussian::new(0.0, 1.0).map_err(|e| PipelineError::invalid(e.to_string()))?;
    Ok(standard.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Mean of the trailing window plus the recent per-step slope.
fn moving_average(y: &[f64], periods: usize) -> Vec<f64> {
    let n = y.len();
    let window = MA_MAX_WINDOW.min(n);
    let base = mean(&y[n - window..]).unwrap_or(0.0);

    let trend = if n >= 2 {
        let span = MA_TREND_SPAN.min(n);
        (y[n - 1] - y[n - span]) / span as f64
    } else {
        0.0
    };

    (0..periods).map(|i| base + trend * i as f64).collect()
}

/// Simple exponential smoothing level, seeded with the first value.
fn exponential_level(y: &[f64], alpha: f64) -> f64 {
    y.iter().fold(y[0], |level, v| alpha * v + (1.0 - alpha) * level)
}

fn linear_trend(y: &[f64], periods: usize) -> Vec<f64> {
    let n = y.len();
    match linear_fit(y) {
        Some((slope, intercept)) => (n..n + periods)
            .map(|x| intercept + slope * x as f64)
            .collect(),
        None => vec![y[0]; periods],
    }
}

fn clip(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = v.max(0.0);
    }
}

fn add_noise<R: Rng>(values: &mut [f64], sd: f64, rng: &mut R) {
    let Ok(dist) = Normal::new(0.0, sd) else {
        return;
    };
    for v in values.iter_mut() {
        *v += dist.sample(rng);
    }
}
