use std::fmt;

use sqlx::FromRow;

/// Positional field slots available to a rule (`v0`..`v5`).
pub const MAX_FIELDS: usize = 6;

/// Logical columns of the rule table.
///
/// Column names reach SQL text only through this enum, so they never carry
/// caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    PType,
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::PType,
        Column::V0,
        Column::V1,
        Column::V2,
        Column::V3,
        Column::V4,
        Column::V5,
    ];

    /// Column holding positional field `index`, if the index is in range.
    pub fn field(index: usize) -> Option<Column> {
        Self::ALL.get(index + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Column::PType => "p_type",
            Column::V0 => "v0",
            Column::V1 => "v1",
            Column::V2 => "v2",
            Column::V3 => "v3",
            Column::V4 => "v4",
            Column::V5 => "v5",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted rule row. Unset slots come back as `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct RuleRow {
    pub id: i64,
    pub p_type: Option<String>,
    pub v0: Option<String>,
    pub v1: Option<String>,
    pub v2: Option<String>,
    pub v3: Option<String>,
    pub v4: Option<String>,
    pub v5: Option<String>,
}

impl RuleRow {
    /// Builds a row from a type tag and up to six fields; empty strings stay unset.
    pub fn new<S: AsRef<str>>(p_type: &str, fields: &[S]) -> Self {
        let slot = |index: usize| {
            fields
                .get(index)
                .map(|value| value.as_ref())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            id: 0,
            p_type: Some(p_type.to_string()).filter(|value| !value.is_empty()),
            v0: slot(0),
            v1: slot(1),
            v2: slot(2),
            v3: slot(3),
            v4: slot(4),
            v5: slot(5),
        }
    }

    /// Field slots in positional order.
    pub fn fields(&self) -> [Option<&str>; MAX_FIELDS] {
        [
            self.v0.as_deref(),
            self.v1.as_deref(),
            self.v2.as_deref(),
            self.v3.as_deref(),
            self.v4.as_deref(),
            self.v5.as_deref(),
        ]
    }
}
