//! pgrule: Postgres persistence for authorization policy rules.
//!
//! The workspace is split in two crates:
//!
//! * `pgrule-core`: errors, configuration, connection pool, identifier checks and logging
//! * `pgrule-adapter`: row codec, query builders and the [`PgAdapter`] itself
//!
//! ```no_run
//! use pgrule::{Adapter, AdapterConfig, Driver, MemoryModel, PgAdapter};
//!
//! # async fn run() -> pgrule::Result<()> {
//! let config = AdapterConfig::new(Driver::Postgres, "postgres://localhost/authz");
//! let adapter = PgAdapter::connect(&config).await?;
//!
//! let mut model = MemoryModel::new();
//! adapter.load_policy(&mut model).await?;
//! adapter.close().await;
//! # Ok(())
//! # }
//! ```

pub use pgrule_adapter::{
    codec, in_clause, matcher, schema, section_of, select_statement, Adapter, Column, Filter,
    MemoryModel, PgAdapter, PgStore, PolicyModel, RelationalStore, RuleRow, SqlFragment,
    Statement, MAX_FIELDS,
};
pub use pgrule_core::config::DEFAULT_DATABASE_NAME;
pub use pgrule_core::ident::DEFAULT_TABLE_NAME;
pub use pgrule_core::logging::init_tracing;
pub use pgrule_core::{AdapterConfig, ConfigError, Driver, PolicyError, Result, TableName};

/// Opens an adapter from environment configuration (`DATABASE_URL`, `POLICY_*`).
pub async fn connect_from_env() -> Result<PgAdapter> {
    connect_from_env_with_prefix("").await
}

/// Same as [`connect_from_env`], reading `{prefix}DATABASE_URL`, `{prefix}POLICY_*`.
pub async fn connect_from_env_with_prefix(prefix: &str) -> Result<PgAdapter> {
    let config = AdapterConfig::from_env_with_prefix(prefix)?;
    tracing::debug!(?config, "opening policy adapter");
    PgAdapter::connect(&config).await
}
