//! SQL identifier validation.
//!
//! Table and database names end up in identifier position, where Postgres
//! offers no bind parameters. Everything that reaches a query string through
//! this module has been checked against a strict allow-list and is emitted
//! double-quoted.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::ConfigError;

/// Default base name of the rule table.
pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

/// Postgres truncates identifiers at 63 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Table names leave room for the `_unique_idx` suffix of the index name.
const MAX_TABLE_NAME_LEN: usize = MAX_IDENTIFIER_LEN - "_unique_idx".len();

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).expect("invalid identifier pattern"))
}

/// Checks that `value` is a plain SQL identifier no longer than `max_len`.
pub fn validate_identifier(value: &str, max_len: usize) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidIdentifier {
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ConfigError::InvalidIdentifier {
            value: value.to_string(),
            reason: "too long",
        });
    }
    if !identifier_pattern().is_match(value) {
        return Err(ConfigError::InvalidIdentifier {
            value: value.to_string(),
            reason: "only ASCII letters, digits and underscores are allowed",
        });
    }
    Ok(())
}

/// Validates a database name.
pub fn validate_database_name(value: &str) -> Result<(), ConfigError> {
    validate_identifier(value, MAX_IDENTIFIER_LEN)
}

/// Double-quotes an identifier that already passed validation.
pub fn quote(value: &str) -> String {
    format!("\"{value}\"")
}

/// Validated name of the table holding policy rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Builds `prefix_name`, or plain `name` when the prefix is absent or empty.
    pub fn new(prefix: Option<&str>, name: &str) -> Result<Self, ConfigError> {
        let composed = match prefix.filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };
        validate_identifier(&composed, MAX_TABLE_NAME_LEN)?;
        Ok(Self(composed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted form for use in SQL text.
    pub fn quoted(&self) -> String {
        quote(&self.0)
    }

    /// Quoted name of the unique index spanning the rule columns.
    pub fn unique_index(&self) -> String {
        quote(&format!("{}_unique_idx", self.0))
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE_NAME.to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
