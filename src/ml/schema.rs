//! Keyword-based column role detection.
//!
//! Each role is an ordered rule: scan columns left to right and take the first
//! one whose lowercased name contains a keyword and that passes the rule's
//! validator. The external-factor rule collects every match instead.

use tracing::debug;

use crate::models::{Column, ColumnRoles, Role, Table};

struct RoleRule {
    role: Role,
    keywords: &'static [&'static str],
    accepts: fn(&Column) -> bool,
    collect_all: bool,
}

fn any_column(_: &Column) -> bool {
    true
}

const RULES: &[RoleRule] = &[
    RoleRule {
        role: Role::Date,
        keywords: &["date", "time", "timestamp"],
        accepts: any_column,
        collect_all: false,
    },
    RoleRule {
        role: Role::Target,
        keywords: &["sales", "total", "profit", "revenue", "amount"],
        accepts: Column::is_numeric,
        collect_all: false,
    },
    RoleRule {
        role: Role::Product,
        keywords: &["product", "item", "category", "line"],
        accepts: any_column,
        collect_all: false,
    },
    RoleRule {
        role: Role::External,
        keywords: &["weather", "event", "crisis", "season", "holiday"],
        accepts: any_column,
        collect_all: true,
    },
];

impl RoleRule {
    fn matches(&self, column: &Column) -> bool {
        let name = column.name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k)) && (self.accepts)(column)
    }
}

/// Classify the columns of `table` into roles. Never fails; undetected roles
/// are left empty.
pub fn detect_columns(table: &Table) -> ColumnRoles {
    let mut roles = ColumnRoles::default();

    for rule in RULES {
        let mut matches = table.columns().iter().filter(|c| rule.matches(c));
        if rule.collect_all {
            let names: Vec<String> = matches.map(|c| c.name.clone()).collect();
            if rule.role == Role::External {
                roles.external = names;
            }
            continue;
        }

        let found = matches.next().map(|c| c.name.clone());
        match rule.role {
            Role::Date => roles.date = found,
            Role::Target => roles.target = found,
            Role::Product => roles.product = found,
            Role::External => {}
        }
    }

    debug!(
        date = ?roles.date,
        target = ?roles.target,
        product = ?roles.product,
        external = roles.external.len(),
        "Detected column roles"
    );
    roles
}
