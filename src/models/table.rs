use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use serde::Serialize;

use crate::errors::PipelineError;

/// Cell contents recognised as "no value" when a table is read.
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "#n/a", "nan", "null", "none", "<na>"];

/// A single cell of an uploaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Infer the type of a raw CSV cell.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_nan() => Value::Missing,
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            Value::Missing
        } else {
            Value::Number(n)
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map(Value::from).unwrap_or(Value::Missing)
    }
}

/// A named column. Every column of a [`Table`] has the table's row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn numeric(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(name, values.into_iter().map(Value::from).collect())
    }

    /// A column is numeric when none of its cells hold text. An all-missing
    /// column counts as numeric; a column without rows does not.
    pub fn is_numeric(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| !matches!(v, Value::Text(_)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric view of the column; text and missing cells become `None`.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }
}

/// An ordered collection of equally long, named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

/// First rows of a table, row-major, for display.
#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from columns, padding short columns with missing cells.
    pub fn from_columns(mut columns: Vec<Column>) -> Self {
        let rows = columns.iter().map(Column::len).max().unwrap_or(0);
        for col in &mut columns {
            col.values.resize(rows, Value::Missing);
        }
        Self { columns }
    }

    /// Read a CSV table with a header row.
    ///
    /// Duplicate header names are disambiguated with a `.N` suffix and blank
    /// headers are named `Unnamed: <index>`. Short records are padded with
    /// missing cells; extra fields are ignored.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let names = unique_headers(rdr.headers()?.iter());
        let mut rows: Vec<Vec<Value>> = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(Value::infer).collect());
        }
        Ok(Self::from_rows(names, rows))
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        Self::from_csv_reader(bytes)
    }

    /// Read the first worksheet of a workbook (xlsx, xls, xlsb or ods). The
    /// first row holds the headers; headers and rows follow the CSV rules.
    pub fn from_workbook_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PipelineError::Ingest("workbook has no worksheets".into()))??;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Self::default());
        };
        let header: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
        let names = unique_headers(header.iter().map(String::as_str));
        let rows: Vec<Vec<Value>> = rows.map(|r| r.iter().map(workbook_cell).collect()).collect();
        Ok(Self::from_rows(names, rows))
    }

    /// Assemble columns from header names and row-major cells.
    fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            let mut cells = row.into_iter();
            for column in values.iter_mut() {
                column.push(cells.next().unwrap_or(Value::Missing));
            }
        }
        let columns = names
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Insert a column, replacing any existing column with the same name in
    /// place. New columns are appended.
    pub fn upsert_column(&mut self, column: Column) {
        let rows = self.row_count();
        let mut column = column;
        if !self.columns.is_empty() {
            column.values.resize(rows, Value::Missing);
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Project onto the named columns, in the order given. Unknown names are
    /// skipped.
    pub fn select(&self, names: &[String]) -> Table {
        let columns = names
            .iter()
            .filter_map(|name| self.column(name).cloned())
            .collect();
        Table { columns }
    }

    pub fn preview(&self, limit: usize) -> TablePreview {
        let rows = (0..self.row_count().min(limit))
            .map(|r| self.columns.iter().map(|c| c.values[r].clone()).collect())
            .collect();
        TablePreview {
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            rows,
        }
    }
}

/// Spreadsheet cells map onto the same values a CSV cell would; date cells
/// become ISO text so the date parser picks them up.
fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Missing,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::from(*f),
        Data::String(s) | Data::DateTimeIso(s) => Value::infer(s),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Missing,
        },
        other => Value::infer(&other.to_string()),
    }
}

/// Blank headers become `Unnamed: <index>`; repeats get the first free
/// `.N` suffix so no two columns share a name.
fn unique_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for (i, raw) in headers.enumerate() {
        let base = if raw.is_empty() {
            format!("Unnamed: {i}")
        } else {
            raw.to_string()
        };
        let mut name = base.clone();
        while taken.contains(&name) {
            let suffix = next_suffix.entry(base.clone()).or_insert(0);
            *suffix += 1;
            name = format!("{base}.{suffix}");
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}
