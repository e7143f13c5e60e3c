//! Conversion between rule rows and the engine's token lines.
//!
//! A rule's arity is the count of contiguous non-empty fields starting at
//! `v0`. Encoding never writes empty slots, and decoding stops at the first
//! unset slot even if later slots still hold data.

use pgrule_core::{PolicyError, Result, TableName};

use crate::rule::{Column, RuleRow, MAX_FIELDS};
use crate::store::{placeholder, Statement};

/// Maps a rule onto the columns it occupies, skipping empty slots.
pub fn encode<S: AsRef<str>>(ptype: &str, fields: &[S]) -> Result<Vec<(Column, String)>> {
    if ptype.is_empty() {
        return Err(PolicyError::InvalidRule("rule type must not be empty".into()));
    }
    if fields.len() > MAX_FIELDS {
        return Err(PolicyError::InvalidRule(format!(
            "{} fields given, at most {MAX_FIELDS} are supported",
            fields.len()
        )));
    }

    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push((Column::PType, ptype.to_string()));
    for (index, value) in fields.iter().enumerate() {
        let value = value.as_ref();
        if value.is_empty() {
            continue;
        }
        if let Some(column) = Column::field(index) {
            columns.push((column, value.to_string()));
        }
    }
    Ok(columns)
}

/// Rebuilds the token line `[p_type, v0, ...]` of a stored row.
///
/// Returns an empty line for rows without a type tag.
pub fn decode(row: &RuleRow) -> Vec<String> {
    let Some(ptype) = row.p_type.as_deref().filter(|value| !value.is_empty()) else {
        return Vec::new();
    };

    let mut line = vec![ptype.to_string()];
    line.extend(
        row.fields()
            .into_iter()
            .map_while(|slot| slot.filter(|value| !value.is_empty()))
            .map(str::to_string),
    );
    line
}

/// Textual rule line, e.g. `p, alice, data1, read`.
pub fn rule_line<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| token.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `INSERT` for one rule, listing only the occupied columns.
pub fn insert_statement<S: AsRef<str>>(
    table: &TableName,
    ptype: &str,
    fields: &[S],
) -> Result<Statement> {
    let columns = encode(ptype, fields)?;

    let names: Vec<&str> = columns.iter().map(|(column, _)| column.as_str()).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(placeholder).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        names.join(", "),
        placeholders.join(", ")
    );
    let args = columns.into_iter().map(|(_, value)| value).collect();
    Ok(Statement::new(sql, args))
}
