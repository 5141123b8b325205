use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::roles::ColumnRoles;
use super::table::TablePreview;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

/// What the caller learns about an uploaded table.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub rows: usize,
    pub columns: usize,
    pub roles: ColumnRoles,
    pub validation: ValidationReport,
    pub profile: ColumnProfile,
    pub preview: TablePreview,
}
