use serde::Serialize;

/// Semantic role a column can play in a sales table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Date,
    Target,
    Product,
    External,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Target => write!(f, "target"),
            Self::Product => write!(f, "product"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Columns detected for each role. Derived once per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnRoles {
    pub date: Option<String>,
    pub target: Option<String>,
    pub product: Option<String>,
    pub external: Vec<String>,
}

impl ColumnRoles {
    /// Name of the target column, or a `MissingColumn` error.
    pub fn require_target(&self) -> Result<&str, crate::errors::PipelineError> {
        self.target
            .as_deref()
            .ok_or(crate::errors::PipelineError::MissingColumn { role: Role::Target })
    }
}
