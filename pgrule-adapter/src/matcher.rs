//! Equality predicates locating rules without a primary key.
//!
//! A predicate always pins `p_type` and then each constrained field slot.
//! Slots left as `None`, and slots past the end of the list, match anything,
//! so a predicate over two fields removes every rule sharing that prefix.
//! A slot constrained to the empty string matches only an unset field.

use pgrule_core::{PolicyError, Result, TableName};

use crate::rule::{Column, MAX_FIELDS};
use crate::store::{placeholder, SqlFragment, Statement};

/// Constrains every given field, in order, starting at `v0`.
///
/// Empty values are stored as NULL, so they pin their slot to unset.
pub fn rule_fields<S: AsRef<str>>(rule: &[S]) -> Result<Vec<Option<String>>> {
    if rule.len() > MAX_FIELDS {
        return Err(PolicyError::InvalidRule(format!(
            "{} fields given, at most {MAX_FIELDS} are supported",
            rule.len()
        )));
    }
    Ok(rule
        .iter()
        .map(|value| Some(value.as_ref().to_string()))
        .collect())
}

/// Places `values` at slots `field_index..field_index + values.len()`.
///
/// Earlier slots stay unconstrained rather than being matched against empty
/// strings; an empty value also leaves its slot unconstrained.
pub fn project_window<S: AsRef<str>>(
    field_index: usize,
    values: &[S],
) -> Result<Vec<Option<String>>> {
    if field_index >= MAX_FIELDS {
        return Err(PolicyError::InvalidRule(format!(
            "field index {field_index} is out of range 0..{MAX_FIELDS}"
        )));
    }
    if field_index + values.len() > MAX_FIELDS {
        return Err(PolicyError::InvalidRule(format!(
            "{} values starting at field {field_index} run past v{}",
            values.len(),
            MAX_FIELDS - 1
        )));
    }

    let mut slots = vec![None; field_index];
    slots.extend(values.iter().map(|value| {
        let value = value.as_ref();
        (!value.is_empty()).then(|| value.to_string())
    }));
    Ok(slots)
}

/// `p_type = $1 [AND vN = $k ...]` over the constrained slots.
///
/// An empty value compares through `COALESCE(vN, '')` so it matches NULL.
pub fn match_clause(ptype: &str, fields: &[Option<String>]) -> SqlFragment {
    let mut sql = format!("{} = {}", Column::PType.as_str(), placeholder(1));
    let mut args = vec![ptype.to_string()];

    for (index, value) in fields.iter().enumerate() {
        let (Some(value), Some(column)) = (value, Column::field(index)) else {
            continue;
        };
        args.push(value.clone());
        let target = if value.is_empty() {
            format!("COALESCE({column}, '')")
        } else {
            column.as_str().to_string()
        };
        sql.push_str(&format!(" AND {target} = {}", placeholder(args.len())));
    }

    SqlFragment { sql, args }
}

/// `DELETE` of every row matching `match_clause(ptype, fields)`.
pub fn delete_statement(table: &TableName, ptype: &str, fields: &[Option<String>]) -> Statement {
    let clause = match_clause(ptype, fields);
    Statement::new(
        format!("DELETE FROM {} WHERE {}", table.quoted(), clause.sql),
        clause.args,
    )
}
