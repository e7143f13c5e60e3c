use pgrule_core::{PolicyError, Result, TableName};
use serde::{Deserialize, Serialize};

use crate::rule::Column;
use crate::store::{placeholder, SqlFragment, Statement};

const SELECT_COLUMNS: &str = "id, p_type, v0, v1, v2, v3, v4, v5";

/// Per-column sets of acceptable values. An empty list leaves the column unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    #[serde(default)]
    pub p_type: Vec<String>,
    #[serde(default)]
    pub v0: Vec<String>,
    #[serde(default)]
    pub v1: Vec<String>,
    #[serde(default)]
    pub v2: Vec<String>,
    #[serde(default)]
    pub v3: Vec<String>,
    #[serde(default)]
    pub v4: Vec<String>,
    #[serde(default)]
    pub v5: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the candidate values of one column.
    pub fn with<I, S>(mut self, column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.values_mut(column) = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn values(&self, column: Column) -> &[String] {
        match column {
            Column::PType => &self.p_type,
            Column::V0 => &self.v0,
            Column::V1 => &self.v1,
            Column::V2 => &self.v2,
            Column::V3 => &self.v3,
            Column::V4 => &self.v4,
            Column::V5 => &self.v5,
        }
    }

    fn values_mut(&mut self, column: Column) -> &mut Vec<String> {
        match column {
            Column::PType => &mut self.p_type,
            Column::V0 => &mut self.v0,
            Column::V1 => &mut self.v1,
            Column::V2 => &mut self.v2,
            Column::V3 => &mut self.v3,
            Column::V4 => &mut self.v4,
            Column::V5 => &mut self.v5,
        }
    }

    /// Columns carrying at least one candidate, in table order.
    pub fn constrained_columns(&self) -> impl Iterator<Item = Column> + '_ {
        Column::ALL
            .into_iter()
            .filter(|column| !self.values(*column).is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.constrained_columns().next().is_none()
    }

    /// Conjunction of one `IN` list per constrained column, or `None` when
    /// nothing is constrained.
    pub fn where_clause(&self) -> Option<SqlFragment> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        for column in Column::ALL {
            let Some(fragment) = in_clause(column, self.values(column), args.len() + 1) else {
                continue;
            };
            clauses.push(fragment.sql);
            args.extend(fragment.args);
        }

        if clauses.is_empty() {
            return None;
        }
        Some(SqlFragment {
            sql: clauses.join(" AND "),
            args,
        })
    }
}

impl TryFrom<&serde_json::Value> for Filter {
    type Error = PolicyError;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        Filter::deserialize(value).map_err(|err| PolicyError::InvalidFilter(err.to_string()))
    }
}

/// `column IN ($k, $k+1, ...)` with one placeholder per candidate, numbered
/// from `first_placeholder`. `None` when there are no candidates.
pub fn in_clause(
    column: Column,
    values: &[String],
    first_placeholder: usize,
) -> Option<SqlFragment> {
    if values.is_empty() {
        return None;
    }
    let placeholders: Vec<String> = (first_placeholder..first_placeholder + values.len())
        .map(placeholder)
        .collect();
    Some(SqlFragment {
        sql: format!("{} IN ({})", column.as_str(), placeholders.join(", ")),
        args: values.to_vec(),
    })
}

/// Selects every row of `table` satisfying `filter`, oldest first.
pub fn select_statement(table: &TableName, filter: &Filter) -> Statement {
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM {}", table.quoted());
    let mut args = Vec::new();
    if let Some(clause) = filter.where_clause() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause.sql);
        args = clause.args;
    }
    sql.push_str(" ORDER BY id");
    Statement::new(sql, args)
}
