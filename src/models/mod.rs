pub mod dataset;
pub mod features;
pub mod forecast;
pub mod insight;
pub mod roles;
pub mod table;

pub use dataset::{ColumnProfile, DatasetSummary, ValidationReport};
pub use features::{Encoding, FeatureSet, FeatureSummary};
pub use forecast::{
    AnalyticsQueryParams, ConfidenceBounds, EvaluateQueryParams, ForecastMethod, ForecastMetrics,
    ForecastRequest, ForecastResult, ForecastSummary, Frequency, Trend, TrendReport,
};
pub use insight::*;
pub use roles::{ColumnRoles, Role};
pub use table::{Column, Table, Value};
