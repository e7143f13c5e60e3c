use async_trait::async_trait;
use pgrule_core::{DatabasePool, Result};
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryAs};
use sqlx::Postgres;
use tracing::debug;

use crate::rule::RuleRow;

/// Parameterized SQL piece: text with `$n` placeholders and the values bound to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<String>,
}

/// A complete statement ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Statement without bound values, used for DDL.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// Renders the `n`th positional placeholder.
pub(crate) fn placeholder(n: usize) -> String {
    format!("${n}")
}

/// Relational backend consumed by the adapter.
///
/// Every value travels in `Statement::args`; implementations must bind them
/// positionally and never splice them into the SQL text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Runs a `SELECT` returning rule rows.
    async fn query(&self, statement: &Statement) -> Result<Vec<RuleRow>>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Runs all statements in one transaction; either all apply or none do.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<()>;

    /// Releases the underlying connections. Must tolerate repeated calls.
    async fn close(&self);
}

/// `RelationalStore` backed by a sqlx Postgres pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: DatabasePool,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

fn bind_query<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [String],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = query.bind(arg.as_str());
    }
    query
}

fn bind_query_as<'q>(
    mut query: QueryAs<'q, Postgres, RuleRow, PgArguments>,
    args: &'q [String],
) -> QueryAs<'q, Postgres, RuleRow, PgArguments> {
    for arg in args {
        query = query.bind(arg.as_str());
    }
    query
}

#[async_trait]
impl RelationalStore for PgStore {
    async fn query(&self, statement: &Statement) -> Result<Vec<RuleRow>> {
        debug!(sql = %statement.sql, args = statement.args.len(), "query");
        let rows = bind_query_as(sqlx::query_as::<_, RuleRow>(&statement.sql), &statement.args)
            .fetch_all(self.pool.inner())
            .await?;
        Ok(rows)
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, args = statement.args.len(), "execute");
        let result = bind_query(sqlx::query(&statement.sql), &statement.args)
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<()> {
        let mut tx = self.pool.inner().begin().await?;
        for statement in statements {
            debug!(sql = %statement.sql, args = statement.args.len(), "execute in transaction");
            bind_query(sqlx::query(&statement.sql), &statement.args)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
