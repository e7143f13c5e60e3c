use pgrule_core::TableName;

use crate::rule::Column;
use crate::store::Statement;

/// Upper bound on the length of a stored field.
pub const FIELD_WIDTH: usize = 40;

/// DDL creating the rule table and its uniqueness index if they are missing.
///
/// Postgres treats NULLs as distinct, so the index covers the coalesced
/// columns; otherwise two rules differing only in unset slots would not collide.
pub fn create_table(table: &TableName) -> Vec<Statement> {
    let definitions: Vec<String> = Column::ALL
        .iter()
        .map(|column| format!("{column} VARCHAR({FIELD_WIDTH}) NULL"))
        .collect();
    let coalesced: Vec<String> = Column::ALL
        .iter()
        .map(|column| format!("COALESCE({column}, '')"))
        .collect();

    vec![
        Statement::raw(format!(
            "CREATE TABLE IF NOT EXISTS {} (id BIGSERIAL PRIMARY KEY, {})",
            table.quoted(),
            definitions.join(", ")
        )),
        Statement::raw(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            table.unique_index(),
            table.quoted(),
            coalesced.join(", ")
        )),
    ]
}

pub fn drop_table(table: &TableName) -> Statement {
    Statement::raw(format!("DROP TABLE IF EXISTS {}", table.quoted()))
}
