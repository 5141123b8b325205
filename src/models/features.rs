use std::collections::BTreeMap;

use serde::Serialize;

use super::table::Table;

/// Code <-> value translation produced by factorizing a text column.
/// Codes are list positions, assigned in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Encoding {
    pub values: Vec<String>,
}

impl Encoding {
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Model-ready view of a table.
///
/// Every column of `x` is listed in `feature_cols`, is numeric and holds no
/// missing values. `y` is empty when no target was detected, otherwise it has
/// `x`'s row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub x: Table,
    pub y: Vec<f64>,
    pub feature_cols: Vec<String>,
    pub encodings: BTreeMap<String, Encoding>,
}

/// Shape of a [`FeatureSet`] for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub rows: usize,
    pub feature_cols: Vec<String>,
    pub target_len: usize,
    pub encodings: BTreeMap<String, Encoding>,
}

impl From<&FeatureSet> for FeatureSummary {
    fn from(fs: &FeatureSet) -> Self {
        Self {
            rows: fs.x.row_count(),
            feature_cols: fs.feature_cols.clone(),
            target_len: fs.y.len(),
            encodings: fs.encodings.clone(),
        }
    }
}
