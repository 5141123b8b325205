use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Statistical method used to extrapolate a target series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    #[default]
    MovingAverage,
    Exponential,
    LinearTrend,
    /// Repeat the historical mean.
    Mean,
}

impl FromStr for ForecastMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "moving_average" => Ok(Self::MovingAverage),
            "exponential" => Ok(Self::Exponential),
            "linear_trend" => Ok(Self::LinearTrend),
            "mean" => Ok(Self::Mean),
            _ => Err(PipelineError::invalid(format!(
                "unknown forecast method '{s}'. Valid methods: moving_average, exponential, linear_trend, mean"
            ))),
        }
    }
}

impl std::fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MovingAverage => write!(f, "moving_average"),
            Self::Exponential => write!(f, "exponential"),
            Self::LinearTrend => write!(f, "linear_trend"),
            Self::Mean => write!(f, "mean"),
        }
    }
}

/// Sampling frequency assumed when looking for a seasonal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Weekly,
    Quarterly,
}

impl Frequency {
    pub fn season_length(self) -> usize {
        match self {
            Self::Monthly => 12,
            Self::Weekly => 52,
            Self::Quarterly => 4,
        }
    }
}

impl FromStr for Frequency {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            "quarterly" => Ok(Self::Quarterly),
            _ => Err(PipelineError::invalid(format!(
                "unknown frequency '{s}'. Valid frequencies: monthly, weekly, quarterly"
            ))),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBounds {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub confidence_level: f64,
}

/// Forecast values for consecutive future periods, optionally with bounds of
/// the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ConfidenceBounds>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render as `Day,Forecast[,Upper_Bound,Lower_Bound]`, one row per step.
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        match &self.bounds {
            Some(bounds) => {
                wtr.write_record(["Day", "Forecast", "Upper_Bound", "Lower_Bound"])?;
                for (i, v) in self.values.iter().enumerate() {
                    wtr.write_record([
                        (i + 1).to_string(),
                        v.to_string(),
                        bounds.upper[i].to_string(),
                        bounds.lower[i].to_string(),
                    ])?;
                }
            }
            None => {
                wtr.write_record(["Day", "Forecast"])?;
                for (i, v) in self.values.iter().enumerate() {
                    wtr.write_record([(i + 1).to_string(), v.to_string()])?;
                }
            }
        }
        let bytes = wtr.into_inner().map_err(|e| anyhow::anyhow!("csv flush failed: {e}"))?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Headline figures for a forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub periods: usize,
    pub average: f64,
    pub total: f64,
    /// `(last / first - 1) * 100`, zero when the first value is zero.
    pub growth_rate: f64,
}

impl From<&ForecastResult> for ForecastSummary {
    fn from(result: &ForecastResult) -> Self {
        let values = &result.values;
        let total: f64 = values.iter().sum();
        let average = if values.is_empty() {
            0.0
        } else {
            total / values.len() as f64
        };
        let growth_rate = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if first != 0.0 => (last / first - 1.0) * 100.0,
            _ => 0.0,
        };
        Self {
            periods: values.len(),
            average,
            total,
            growth_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub trend: Trend,
    pub slope: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    /// Slope as a percentage of the series mean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_rate: Option<f64>,
}

/// Holdout accuracy of a forecast method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastMetrics {
    pub method: ForecastMethod,
    pub holdout: usize,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastRequest {
    pub periods: Option<usize>,
    pub method: Option<String>,
    pub confidence_level: Option<f64>,
    /// Sort rows by the date column and drop missing targets before
    /// forecasting, instead of using the preprocessed target as-is.
    #[serde(default)]
    pub chronological: bool,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateQueryParams {
    pub holdout: Option<usize>,
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryParams {
    pub freq: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_names() {
        assert_eq!("moving_average".parse::<ForecastMethod>().unwrap(), ForecastMethod::MovingAverage);
        assert_eq!("Linear Trend".parse::<ForecastMethod>().unwrap(), ForecastMethod::LinearTrend);
        assert_eq!("exponential".parse::<ForecastMethod>().unwrap(), ForecastMethod::Exponential);
        assert!(matches!(
            "arima".parse::<ForecastMethod>(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!("weekly".parse::<Frequency>().unwrap().season_length(), 52);
        assert_eq!("Quarterly".parse::<Frequency>().unwrap().season_length(), 4);
        assert!("daily".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_csv_export_with_bounds() {
        let result = ForecastResult {
            values: vec![10.0, 12.5],
            bounds: Some(ConfidenceBounds {
                upper: vec![11.0, 13.5],
                lower: vec![9.0, 11.5],
                confidence_level: 0.95,
            }),
        };
        let csv = result.to_csv().unwrap();
        assert_eq!(
            csv,
            "Day,Forecast,Upper_Bound,Lower_Bound\n1,10,11,9\n2,12.5,13.5,11.5\n"
        );
    }

    #[test]
    fn test_csv_export_without_bounds() {
        let result = ForecastResult {
            values: vec![3.0],
            bounds: None,
        };
        assert_eq!(result.to_csv().unwrap(), "Day,Forecast\n1,3\n");
    }

    #[test]
    fn test_summary_growth_rate() {
        let result = ForecastResult {
            values: vec![100.0, 110.0, 120.0],
            bounds: None,
        };
        let summary = ForecastSummary::from(&result);
        assert_eq!(summary.periods, 3);
        assert_eq!(summary.total, 330.0);
        assert_eq!(summary.average, 110.0);
        assert!((summary.growth_rate - 20.0).abs() < 1e-9);

        let flat_zero = ForecastResult {
            values: vec![0.0, 5.0],
            bounds: None,
        };
        assert_eq!(ForecastSummary::from(&flat_zero).growth_rate, 0.0);
    }
}
