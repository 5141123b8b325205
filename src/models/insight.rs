use chrono::NaiveDate;
use serde::Serialize;

use super::forecast::TrendReport;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: usize,
    pub total: Option<f64>,
    pub average: Option<f64>,
    pub unique_products: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTotal {
    pub product: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPerformance {
    /// Highest-grossing products, descending, at most ten.
    pub top: Vec<ProductTotal>,
    pub top_share_pct: f64,
    pub product_count: usize,
    /// Combined total of the three weakest products; only set when there are
    /// more than three.
    pub bottom_three_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMean {
    pub month: u32,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthOverMonth {
    /// `YYYY-MM`
    pub period: String,
    pub total: f64,
    pub delta: Option<f64>,
    pub delta_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyProfile {
    pub by_month: Vec<MonthlyMean>,
    pub peak_month: u32,
    pub low_month: u32,
    pub seasonal_variance_pct: Option<f64>,
    pub month_over_month: Vec<MonthOverMonth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Volatility {
    pub mean: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub high: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Concentration {
    pub top_count: usize,
    pub top_share_pct: f64,
    pub at_risk: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Growth,
    Decline,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutlook {
    pub outlook: Outlook,
    pub forecast_mean: f64,
    pub history_mean: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightKind {
    Outlook(ForecastOutlook),
    TopProduct { product: String, total: f64, share_pct: f64 },
    Underperformers { bottom_three_total: f64 },
    Volatility(Volatility),
    Seasonality { peak_month: u32, low_month: u32, peak_mean: f64, low_mean: f64, variance_pct: Option<f64> },
    Concentration(Concentration),
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub priority: Priority,
    pub category: String,
    #[serde(flatten)]
    pub kind: InsightKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
}

/// Descriptive analytics over an uploaded table.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub overview: DatasetOverview,
    pub products: Option<ProductPerformance>,
    pub monthly: Option<MonthlyProfile>,
    pub daily_totals: Option<Vec<DailyTotal>>,
    pub volatility: Option<Volatility>,
    pub concentration: Option<Concentration>,
    pub trend: Option<TrendReport>,
    pub seasonality: Option<Vec<f64>>,
}
