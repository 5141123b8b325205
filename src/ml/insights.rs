use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::ml::analysis::{detect_seasonality, trend_analysis};
use crate::ml::preprocess::{parse_dates, prepare_series};
use crate::ml::stats::{mean, sample_std};
use crate::models::{
    AnalyticsReport, Column, ColumnRoles, Concentration, DailyTotal, DatasetOverview,
    ForecastOutlook, Frequency, Insight, InsightKind, InsightReport, MonthOverMonth, MonthlyMean,
    MonthlyProfile, Outlook, Priority, ProductPerformance, ProductTotal, Table, Value, Volatility,
};

const TOP_PRODUCTS: usize = 10;
const HIGH_CV: f64 = 0.5;
const CONCENTRATION_SHARE: f64 = 0.2;
const CONCENTRATION_RISK_PCT: f64 = 80.0;

/// The detected target column, if it is present and numeric.
fn target_column<'a>(table: &'a Table, roles: &ColumnRoles) -> Option<&'a Column> {
    roles
        .target
        .as_deref()
        .and_then(|name| table.column(name))
        .filter(|c| c.is_numeric())
}

fn target_values(table: &Table, roles: &ColumnRoles) -> Option<Vec<f64>> {
    target_column(table, roles).map(|c| c.numbers().into_iter().flatten().collect())
}

fn group_key(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Missing => None,
    }
}

pub fn overview(table: &Table, roles: &ColumnRoles) -> DatasetOverview {
    let values = target_values(table, roles);
    let unique_products = roles
        .product
        .as_deref()
        .and_then(|name| table.column(name))
        .map(|c| {
            let mut seen: Vec<String> = c.values.iter().filter_map(group_key).collect();
            seen.sort();
            seen.dedup();
            seen.len()
        });

    DatasetOverview {
        rows: table.row_count(),
        columns: table.columns().len(),
        total: values.as_ref().map(|v| v.iter().sum()),
        average: values.as_deref().and_then(mean),
        unique_products,
    }
}

/// Target totals per product, best first.
pub fn product_performance(table: &Table, roles: &ColumnRoles) -> Option<ProductPerformance> {
    let product = table.column(roles.product.as_deref()?)?;
    let target = target_column(table, roles)?;

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (p, t) in product.values.iter().zip(&target.values) {
        let Some(key) = group_key(p) else { continue };
        let entry = totals.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            0.0
        });
        *entry += t.as_f64().unwrap_or(0.0);
    }
    if order.is_empty() {
        return None;
    }

    let mut ranked: Vec<ProductTotal> = order
        .into_iter()
        .map(|product| {
            let total = totals[&product];
            ProductTotal { product, total }
        })
        .collect();
    ranked.sort_by(|a, b| b.total.total_cmp(&a.total));

    let grand_total: f64 = ranked.iter().map(|p| p.total).sum();
    let top_share_pct = if grand_total != 0.0 {
        ranked[0].total / grand_total * 100.0
    } else {
        0.0
    };
    let bottom_three_total = (ranked.len() > 3)
        .then(|| ranked[ranked.len() - 3..].iter().map(|p| p.total).sum::<f64>());
    let product_count = ranked.len();
    ranked.truncate(TOP_PRODUCTS);

    Some(ProductPerformance {
        top: ranked,
        top_share_pct,
        product_count,
        bottom_three_total,
    })
}

/// (date, target) pairs for rows where both parse.
fn dated_targets(table: &Table, roles: &ColumnRoles) -> Option<Vec<(NaiveDate, f64)>> {
    let dates = parse_dates(table.column(roles.date.as_deref()?)?);
    let target = target_column(table, roles)?;
    Some(
        dates
            .into_iter()
            .zip(&target.values)
            .filter_map(|(d, t)| Some((d?.date(), t.as_f64()?)))
            .collect(),
    )
}

/// Mean target per calendar month plus month-over-month totals. Needs at
/// least two distinct calendar months.
pub fn monthly_profile(table: &Table, roles: &ColumnRoles) -> Option<MonthlyProfile> {
    let rows = dated_targets(table, roles)?;

    let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    let mut by_period: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, value) in &rows {
        let slot = by_month.entry(date.month()).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
        *by_period.entry((date.year(), date.month())).or_insert(0.0) += value;
    }
    if by_month.len() < 2 {
        return None;
    }

    let by_month: Vec<MonthlyMean> = by_month
        .into_iter()
        .map(|(month, (sum, count))| MonthlyMean {
            month,
            mean: sum / count as f64,
        })
        .collect();

    // First occurrence wins on ties, like idxmax/idxmin.
    let mut peak = &by_month[0];
    let mut low = &by_month[0];
    for m in &by_month[1..] {
        if m.mean > peak.mean {
            peak = m;
        }
        if m.mean < low.mean {
            low = m;
        }
    }
    let seasonal_variance_pct = (low.mean != 0.0).then(|| (peak.mean - low.mean) / low.mean * 100.0);
    let (peak_month, low_month) = (peak.month, low.month);

    let mut month_over_month = Vec::with_capacity(by_period.len());
    let mut previous: Option<f64> = None;
    for ((year, month), total) in by_period {
        let delta = previous.map(|p| total - p);
        let delta_pct = previous.filter(|p| *p != 0.0).map(|p| (total - p) / p * 100.0);
        month_over_month.push(MonthOverMonth {
            period: format!("{year:04}-{month:02}"),
            total,
            delta,
            delta_pct,
        });
        previous = Some(total);
    }

    Some(MonthlyProfile {
        by_month,
        peak_month,
        low_month,
        seasonal_variance_pct,
        month_over_month,
    })
}

/// Target summed per calendar day, in date order.
pub fn daily_totals(table: &Table, roles: &ColumnRoles) -> Option<Vec<DailyTotal>> {
    let rows = dated_targets(table, roles)?;
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in rows {
        *days.entry(date).or_insert(0.0) += value;
    }
    Some(
        days.into_iter()
            .map(|(date, total)| DailyTotal { date, total })
            .collect(),
    )
}

pub fn volatility(table: &Table, roles: &ColumnRoles) -> Option<Volatility> {
    let values = target_values(table, roles)?;
    let avg = mean(&values)?;
    let std_dev = sample_std(&values)?;
    let cv = if avg > 0.0 { std_dev / avg } else { 0.0 };
    Some(Volatility {
        mean: avg,
        std_dev,
        coefficient_of_variation: cv,
        high: cv > HIGH_CV,
    })
}

/// Share of the target carried by the largest 20 % of rows.
pub fn concentration(table: &Table, roles: &ColumnRoles) -> Option<Concentration> {
    let mut values = target_values(table, roles)?;
    let total: f64 = values.iter().sum();
    if values.is_empty() || total == 0.0 {
        return None;
    }
    values.sort_by(|a, b| b.total_cmp(a));

    let top_count = (values.len() as f64 * CONCENTRATION_SHARE) as usize;
    let top: f64 = values[..top_count].iter().sum();
    let top_share_pct = top / total * 100.0;
    Some(Concentration {
        top_count,
        top_share_pct,
        at_risk: top_share_pct > CONCENTRATION_RISK_PCT,
    })
}

/// Compare the forecast's mean against the history's mean.
pub fn forecast_outlook(table: &Table, roles: &ColumnRoles, forecast: &[f64]) -> Option<ForecastOutlook> {
    let forecast_mean = mean(forecast)?;
    let history_mean = target_values(table, roles).as_deref().and_then(mean)?;

    let outlook = if forecast_mean > history_mean * 1.1 {
        Outlook::Growth
    } else if forecast_mean < history_mean * 0.9 {
        Outlook::Decline
    } else {
        Outlook::Stable
    };
    let change_pct = if history_mean != 0.0 {
        (forecast_mean / history_mean - 1.0) * 100.0
    } else {
        0.0
    };

    Some(ForecastOutlook {
        outlook,
        forecast_mean,
        history_mean,
        change_pct,
    })
}

/// Every descriptive summary in one report. Trend and seasonality run on
/// the chronologically ordered target series.
pub fn analytics_report(table: &Table, roles: &ColumnRoles, freq: Frequency) -> AnalyticsReport {
    let series = prepare_series(table, roles).ok();
    AnalyticsReport {
        overview: overview(table, roles),
        products: product_performance(table, roles),
        monthly: monthly_profile(table, roles),
        daily_totals: daily_totals(table, roles),
        volatility: volatility(table, roles),
        concentration: concentration(table, roles),
        trend: series.as_deref().map(trend_analysis),
        seasonality: series.as_deref().and_then(|y| detect_seasonality(y, freq)),
    }
}

/// Collect every insight that applies to the table and forecast. Insights
/// whose inputs are missing are left out.
pub fn generate_insights(table: &Table, roles: &ColumnRoles, forecast: Option<&[f64]>) -> InsightReport {
    let mut insights = Vec::new();
    let mut push = |priority, category: &str, kind| {
        insights.push(Insight {
            priority,
            category: category.to_string(),
            kind,
        })
    };

    if let Some(outlook) = forecast.and_then(|f| forecast_outlook(table, roles, f)) {
        let (priority, category) = match outlook.outlook {
            Outlook::Growth => (Priority::High, "Growth"),
            Outlook::Decline => (Priority::Critical, "Risk Management"),
            Outlook::Stable => (Priority::Medium, "Optimization"),
        };
        push(priority, category, InsightKind::Outlook(outlook));
    }

    if let Some(products) = product_performance(table, roles) {
        let top = &products.top[0];
        push(
            Priority::High,
            "Product Strategy",
            InsightKind::TopProduct {
                product: top.product.clone(),
                total: top.total,
                share_pct: products.top_share_pct,
            },
        );
        if let Some(bottom_three_total) = products.bottom_three_total {
            push(
                Priority::Medium,
                "Product Strategy",
                InsightKind::Underperformers { bottom_three_total },
            );
        }
    }

    if let Some(v) = volatility(table, roles).filter(|v| v.high) {
        push(Priority::Medium, "Risk Management", InsightKind::Volatility(v));
    }

    if let Some(profile) = monthly_profile(table, roles) {
        let mean_of = |month: u32| {
            profile
                .by_month
                .iter()
                .find(|m| m.month == month)
                .map(|m| m.mean)
                .unwrap_or(0.0)
        };
        push(
            Priority::High,
            "Seasonal Strategy",
            InsightKind::Seasonality {
                peak_month: profile.peak_month,
                low_month: profile.low_month,
                peak_mean: mean_of(profile.peak_month),
                low_mean: mean_of(profile.low_month),
                variance_pct: profile.seasonal_variance_pct,
            },
        );
    }

    if let Some(c) = concentration(table, roles).filter(|c| c.at_risk) {
        push(Priority::Medium, "Risk Management", InsightKind::Concentration(c));
    }

    debug!(count = insights.len(), "Generated insights");
    InsightReport { insights }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::schema::detect_columns;

    fn table() -> (Table, ColumnRoles) {
        let csv = "\
Date,Product,Sales
2024-01-10,Apples,100
2024-01-20,Pears,50
2024-02-05,Apples,200
2024-02-15,Plums,10
2024-03-01,Kiwis,5
2024-03-02,Apples,
";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let roles = detect_columns(&table);
        (table, roles)
    }

    #[test]
    fn test_overview() {
        let (table, roles) = table();
        let o = overview(&table, &roles);
        assert_eq!(o.rows, 6);
        assert_eq!(o.total, Some(365.0));
        assert!((o.average.unwrap() - 73.0).abs() < 1e-9);
        assert_eq!(o.unique_products, Some(4));
    }

    #[test]
    fn test_product_performance() {
        let (table, roles) = table();
        let p = product_performance(&table, &roles).unwrap();
        assert_eq!(p.product_count, 4);
        assert_eq!(p.top[0], ProductTotal { product: "Apples".into(), total: 300.0 });
        assert!((p.top_share_pct - 300.0 / 365.0 * 100.0).abs() < 1e-9);
        // Pears 50, Plums 10, Kiwis 5
        assert_eq!(p.bottom_three_total, Some(65.0));
    }

    #[test]
    fn test_monthly_profile() {
        let (table, roles) = table();
        let m = monthly_profile(&table, &roles).unwrap();
        assert_eq!(m.by_month.len(), 3);
        assert_eq!(m.peak_month, 2);
        assert_eq!(m.low_month, 3);
        // Feb mean 105, Mar mean 5
        assert!((m.seasonal_variance_pct.unwrap() - 2000.0).abs() < 1e-9);

        assert_eq!(m.month_over_month[0].period, "2024-01");
        assert_eq!(m.month_over_month[0].delta, None);
        assert_eq!(m.month_over_month[1].delta, Some(60.0));
        assert!((m.month_over_month[1].delta_pct.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_totals_sorted() {
        let (table, roles) = table();
        let days = daily_totals(&table, &roles).unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(days[4].total, 5.0);
    }

    #[test]
    fn test_volatility_and_concentration() {
        let (table, roles) = table();
        let v = volatility(&table, &roles).unwrap();
        assert!(v.high);
        assert!((v.coefficient_of_variation - v.std_dev / v.mean).abs() < 1e-12);

        // five values, top 20 % is one row: 200 / 365
        let c = concentration(&table, &roles).unwrap();
        assert_eq!(c.top_count, 1);
        assert!((c.top_share_pct - 200.0 / 365.0 * 100.0).abs() < 1e-9);
        assert!(!c.at_risk);
    }

    #[test]
    fn test_missing_columns_degrade_to_none() {
        let table = Table::from_csv_bytes(b"Qty\n1\n2\n").unwrap();
        let roles = detect_columns(&table);
        assert!(product_performance(&table, &roles).is_none());
        assert!(monthly_profile(&table, &roles).is_none());
        assert!(volatility(&table, &roles).is_none());
        assert!(concentration(&table, &roles).is_none());
        assert!(forecast_outlook(&table, &roles, &[1.0]).is_none());

        let report = generate_insights(&table, &roles, Some(&[1.0, 2.0]));
        assert!(report.insights.is_empty());
    }

    #[test]
    fn test_outlook_classification() {
        let (table, roles) = table();
        let growth = forecast_outlook(&table, &roles, &[100.0, 100.0]).unwrap();
        assert_eq!(growth.outlook, Outlook::Growth);
        let decline = forecast_outlook(&table, &roles, &[10.0]).unwrap();
        assert_eq!(decline.outlook, Outlook::Decline);
        let stable = forecast_outlook(&table, &roles, &[73.0]).unwrap();
        assert_eq!(stable.outlook, Outlook::Stable);
        assert!(stable.change_pct.abs() < 1e-9);
    }

    #[test]
    fn test_analytics_report() {
        let (table, roles) = table();
        let report = analytics_report(&table, &roles, Frequency::Monthly);
        assert_eq!(report.overview.rows, 6);
        assert!(report.products.is_some());
        assert!(report.monthly.is_some());
        // 5 points: enough for a trend, not for seasonality
        assert!(report.trend.is_some());
        assert!(report.seasonality.is_none());

        let bare = Table::from_csv_bytes(b"Qty\n1\n").unwrap();
        let report = analytics_report(&bare, &detect_columns(&bare), Frequency::Monthly);
        assert!(report.trend.is_none());
        assert!(report.daily_totals.is_none());
    }

    #[test]
    fn test_generate_insights() {
        let (table, roles) = table();
        let report = generate_insights(&table, &roles, Some(&[10.0, 10.0]));
        let kinds: Vec<&InsightKind> = report.insights.iter().map(|i| &i.kind).collect();

        assert!(matches!(kinds[0], InsightKind::Outlook(o) if o.outlook == Outlook::Decline));
        assert_eq!(report.insights[0].priority, Priority::Critical);
        assert!(matches!(kinds[1], InsightKind::TopProduct { product, .. } if product == "Apples"));
        assert!(matches!(kinds[2], InsightKind::Underperformers { .. }));
        assert!(kinds.iter().any(|k| matches!(k, InsightKind::Volatility(_))));
        assert!(kinds.iter().any(|k| matches!(k, InsightKind::Seasonality { peak_month: 2, .. })));

        let without_forecast = generate_insights(&table, &roles, None);
        assert!(!without_forecast
            .insights
            .iter()
            .any(|i| matches!(i.kind, InsightKind::Outlook(_))));
    }
}
