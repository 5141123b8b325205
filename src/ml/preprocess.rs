use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::models::{
    Column, ColumnProfile, ColumnRoles, Encoding, FeatureSet, Role, Table, ValidationReport, Value,
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Code written for missing cells of a factorized column.
const MISSING_CODE: f64 = -1.0;

/// Best-effort date/time parse of a cell. Numbers and unrecognised text yield
/// `None`.
pub fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_text()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_dates(column: &Column) -> Vec<Option<NaiveDateTime>> {
    column.values.iter().map(parse_datetime).collect()
}

fn ends_with_id(name: &str) -> bool {
    name.to_lowercase().ends_with("id")
}

/// Year, month, day-of-week (Monday = 0) and quarter columns derived from a
/// parsed date column.
fn calendar_columns(dates: &[Option<NaiveDateTime>]) -> [Column; 4] {
    let derive = |name: &str, f: fn(&NaiveDateTime) -> f64| {
        Column::new(
            name,
            dates.iter().map(|d| Value::from(d.as_ref().map(f))).collect(),
        )
    };
    [
        derive("Year", |d| d.year() as f64),
        derive("Month", |d| d.month() as f64),
        derive("DayOfWeek", |d| d.weekday().num_days_from_monday() as f64),
        derive("Quarter", |d| ((d.month() - 1) / 3 + 1) as f64),
    ]
}

/// Replace each distinct value with its order of first appearance.
fn factorize(column: &Column) -> (Column, Encoding) {
    let mut codes: HashMap<String, usize> = HashMap::new();
    let mut encoding = Encoding::default();

    let values = column
        .values
        .iter()
        .map(|v| {
            let key = match v {
                Value::Missing => return Value::Number(MISSING_CODE),
                Value::Text(s) => s.clone(),
                Value::Number(n) => n.to_string(),
            };
            let code = *codes.entry(key.clone()).or_insert_with(|| {
                encoding.values.push(key);
                encoding.values.len() - 1
            });
            Value::Number(code as f64)
        })
        .collect();

    (Column::new(column.name.clone(), values), encoding)
}

/// Turn a raw table into numeric model inputs.
///
/// 1. The date column, if any, is parsed and `Year`, `Month`, `DayOfWeek`
///    and `Quarter` columns are derived. Unparseable dates become missing.
/// 2. Text columns other than the target, the date and `...id` columns are
///    factorized; missing cells get code -1.
/// 3. Every numeric column other than the target, the date and `...id`
///    columns becomes a feature, in table order.
/// 4. All remaining missing values are set to 0. This is a blunt policy,
///    not imputation.
///
/// Roles naming a column that is not in the table are ignored. The result
/// is deterministic.
pub fn preprocess(table: &Table, roles: &ColumnRoles) -> FeatureSet {
    let mut work = table.clone();
    let date_col = roles.date.as_deref().filter(|c| table.column(c).is_some());
    let target_col = roles.target.as_deref().filter(|c| table.column(c).is_some());

    if let Some(name) = date_col {
        let dates = table.column(name).map(parse_dates).unwrap_or_default();
        let unparsed = dates.iter().filter(|d| d.is_none()).count();
        if unparsed > 0 {
            debug!(column = name, unparsed, "Date cells coerced to missing");
        }
        for column in calendar_columns(&dates) {
            work.upsert_column(column);
        }
    }

    let excluded = |name: &str| Some(name) == target_col || Some(name) == date_col || ends_with_id(name);

    let mut encodings = BTreeMap::new();
    let categorical: Vec<String> = work
        .columns()
        .iter()
        .filter(|c| !c.is_numeric() && !c.is_empty() && !excluded(&c.name))
        .map(|c| c.name.clone())
        .collect();
    for name in categorical {
        if let Some(column) = work.column(&name) {
            let (encoded, encoding) = factorize(column);
            work.upsert_column(encoded);
            encodings.insert(name, encoding);
        }
    }

    let feature_cols: Vec<String> = work
        .columns()
        .iter()
        .filter(|c| !excluded(&c.name) && c.is_numeric())
        .map(|c| c.name.clone())
        .collect();

    let x = zero_filled(&work.select(&feature_cols));
    let y = target_col
        .and_then(|name| work.column(name))
        .map(|c| c.numbers().into_iter().map(|v| v.unwrap_or(0.0)).collect())
        .unwrap_or_default();

    debug!(
        features = feature_cols.len(),
        encoded = encodings.len(),
        rows = x.row_count(),
        "Preprocessed table"
    );

    FeatureSet {
        x,
        y,
        feature_cols,
        encodings,
    }
}

fn zero_filled(table: &Table) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            Column::new(
                c.name.clone(),
                c.values
                    .iter()
                    .map(|v| if v.is_missing() { Value::Number(0.0) } else { v.clone() })
                    .collect(),
            )
        })
        .collect();
    Table::from_columns(columns)
}

/// Target series in chronological order with missing cells dropped.
///
/// Rows are stably sorted by the parsed date column when one is detected;
/// rows whose date cannot be parsed go last.
pub fn prepare_series(table: &Table, roles: &ColumnRoles) -> Result<Vec<f64>, PipelineError> {
    let target = roles
        .target
        .as_deref()
        .and_then(|name| table.column(name))
        .ok_or(PipelineError::MissingColumn { role: Role::Target })?;

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    if let Some(dates) = roles.date.as_deref().and_then(|name| table.column(name)).map(parse_dates) {
        // None sorts before Some, so compare on (is_none, date) to push
        // unparseable rows to the end.
        order.sort_by_key(|&i| (dates[i].is_none(), dates[i]));
    }

    Ok(order.into_iter().filter_map(|i| target.values[i].as_f64()).collect())
}

/// Sanity checks run on upload.
pub fn validate_table(table: &Table) -> ValidationReport {
    let mut report = ValidationReport::default();

    if table.is_empty() || table.columns().is_empty() {
        report.errors.push("The uploaded file is empty".into());
        return report;
    }

    if table.row_count() < 10 {
        report
            .warnings
            .push("Dataset has fewer than 10 rows. Results may be unreliable.".into());
    }

    if !table.columns().iter().any(Column::is_numeric) {
        report.errors.push("No numeric columns found in the data".into());
    }

    let rows = table.row_count() as f64;
    let sparse: Vec<&str> = table
        .columns()
        .iter()
        .filter(|c| c.missing_count() as f64 / rows * 100.0 > 50.0)
        .map(|c| c.name.as_str())
        .collect();
    if !sparse.is_empty() {
        warn!(columns = ?sparse, "Columns mostly missing");
        report
            .warnings
            .push(format!("Columns with >50% missing values: {}", sparse.join(", ")));
    }

    report
}

pub fn column_profile(table: &Table) -> ColumnProfile {
    let (numeric, categorical): (Vec<&Column>, Vec<&Column>) =
        table.columns().iter().partition(|c| c.is_numeric());
    ColumnProfile {
        numeric: numeric.into_iter().map(|c| c.name.clone()).collect(),
        categorical: categorical.into_iter().map(|c| c.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::schema::detect_columns;

    fn sales_table() -> Table {
        let csv = "\
Invoice ID,Date,Branch,Product line,Total,Rating
750-67-8428,2019-01-05,A,Health,548.97,9.1
226-31-3081,2019-03-08,C,Electronic,80.22,
631-41-3108,not a date,A,Home,340.53,7.4
123-19-1176,2019-01-27,A,Health,489.05,8.4
";
        Table::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_datetime_formats() {
        let parse = |s: &str| parse_datetime(&Value::Text(s.into()));
        assert_eq!(
            parse("2019-01-05").unwrap().date(),
            NaiveDate::from_ymd_opt(2019, 1, 5).unwrap()
        );
        assert_eq!(
            parse("3/8/2019").unwrap().date(),
            NaiveDate::from_ymd_opt(2019, 3, 8).unwrap()
        );
        assert!(parse("2019-01-05 13:08:00").is_some());
        assert!(parse("2019-01-05T13:08:00+02:00").is_some());
        assert!(parse("yesterday").is_none());
        assert!(parse_datetime(&Value::Number(20190105.0)).is_none());
    }

    #[test]
    fn test_preprocess_selects_numeric_features() {
        let table = sales_table();
        let roles = detect_columns(&table);
        let fs = preprocess(&table, &roles);

        assert_eq!(
            fs.feature_cols,
            vec!["Branch", "Product line", "Rating", "Year", "Month", "DayOfWeek", "Quarter"]
        );
        assert!(!fs.feature_cols.iter().any(|c| c == "Date" || c == "Invoice ID" || c == "Total"));
        assert_eq!(fs.y, vec![548.97, 80.22, 340.53, 489.05]);

        for col in fs.x.columns() {
            assert!(col.is_numeric());
            assert_eq!(col.missing_count(), 0, "column {} has missing values", col.name);
        }
    }

    #[test]
    fn test_calendar_features_and_unparseable_dates() {
        let table = sales_table();
        let fs = preprocess(&table, &detect_columns(&table));

        let month = fs.x.column("Month").unwrap().numbers();
        assert_eq!(month, vec![Some(1.0), Some(3.0), Some(0.0), Some(1.0)]);

        // 2019-01-05 was a Saturday
        let dow = fs.x.column("DayOfWeek").unwrap().numbers();
        assert_eq!(dow[0], Some(5.0));

        let quarter = fs.x.column("Quarter").unwrap().numbers();
        assert_eq!(quarter, vec![Some(1.0), Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_factorization_in_first_appearance_order() {
        let table = sales_table();
        let fs = preprocess(&table, &detect_columns(&table));

        let enc = &fs.encodings["Product line"];
        assert_eq!(enc.values, vec!["Health", "Electronic", "Home"]);
        assert_eq!(enc.decode(1), Some("Electronic"));
        assert_eq!(enc.code_of("Home"), Some(2));
        assert_eq!(
            fs.x.column("Product line").unwrap().numbers(),
            vec![Some(0.0), Some(1.0), Some(2.0), Some(0.0)]
        );
        assert!(!fs.encodings.contains_key("Invoice ID"));
        assert!(!fs.encodings.contains_key("Date"));
    }

    #[test]
    fn test_missing_categorical_gets_sentinel_code() {
        let table = Table::from_csv_bytes(b"Region,Sales\nNorth,1\n,2\nSouth,3\n").unwrap();
        let fs = preprocess(&table, &detect_columns(&table));
        assert_eq!(
            fs.x.column("Region").unwrap().numbers(),
            vec![Some(0.0), Some(-1.0), Some(1.0)]
        );
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let table = sales_table();
        let roles = detect_columns(&table);
        assert_eq!(preprocess(&table, &roles), preprocess(&table, &roles));
    }

    #[test]
    fn test_absent_roles_are_ignored() {
        let table = Table::from_csv_bytes(b"Qty,Price\n1,2\n3,4\n").unwrap();
        let roles = ColumnRoles {
            date: Some("Order Date".into()),
            target: Some("Sales".into()),
            ..Default::default()
        };
        let fs = preprocess(&table, &roles);
        assert_eq!(fs.feature_cols, vec!["Qty", "Price"]);
        assert!(fs.y.is_empty());
    }

    #[test]
    fn test_prepare_series_sorts_by_date_and_drops_missing() {
        let csv = "Date,Sales\n2024-01-03,30\n2024-01-01,10\nbad,99\n2024-01-02,\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let roles = detect_columns(&table);
        assert_eq!(prepare_series(&table, &roles).unwrap(), vec![10.0, 30.0, 99.0]);
    }

    #[test]
    fn test_prepare_series_requires_target() {
        let table = Table::from_csv_bytes(b"Date,Qty\n2024-01-01,1\n").unwrap();
        let err = prepare_series(&table, &detect_columns(&table)).unwrap_err();
        assert_eq!(err, PipelineError::MissingColumn { role: Role::Target });
    }

    #[test]
    fn test_validate_table() {
        let report = validate_table(&Table::default());
        assert_eq!(report.errors, vec!["The uploaded file is empty".to_string()]);

        let table = Table::from_csv_bytes(b"Name,Note\na,\nb,\nc,x\n").unwrap();
        let report = validate_table(&table);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("No numeric columns")));
        assert!(report.warnings.iter().any(|w| w.contains("fewer than 10 rows")));
        assert!(report.warnings.iter().any(|w| w.contains("Note")));
    }

    #[test]
    fn test_column_profile() {
        let profile = column_profile(&sales_table());
        assert_eq!(profile.numeric, vec!["Total", "Rating"]);
        assert_eq!(profile.categorical, vec!["Invoice ID", "Date", "Branch", "Product line"]);
    }
}
