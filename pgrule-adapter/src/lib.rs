//! Postgres storage adapter for policy rules.
//!
//! A rule is a type tag (`p`, `g`, `p2`, ...) followed by up to six
//! positional fields. Rules live one per row in a table with `p_type` and
//! `v0`..`v5` columns; the policy engine reaches them through the
//! [`Adapter`] contract and hands over its in-memory rule set as a
//! [`PolicyModel`].

mod adapter;
pub mod codec;
mod filter;
pub mod matcher;
mod model;
mod rule;
pub mod schema;
mod store;

pub use adapter::{Adapter, PgAdapter};
pub use filter::{in_clause, select_statement, Filter};
pub use model::{section_of, MemoryModel, PolicyModel};
pub use rule::{Column, RuleRow, MAX_FIELDS};
pub use store::{PgStore, RelationalStore, SqlFragment, Statement};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_rows_come_back_as_model_rules() {
        let mut model = MemoryModel::new();
        let rows = [
            RuleRow::new("p", &["alice", "data1", "read"]),
            RuleRow::new("p", &["bob", "", "write"]),
        ];
        for row in &rows {
            model.load_rule(codec::decode(row)).expect("load");
        }

        assert!(model.has_rule("p", &["alice", "data1", "read"]));
        assert!(model.has_rule("p", &["bob"]));
    }
}
