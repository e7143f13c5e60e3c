use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use tracing::{debug, info};

use crate::config::AdapterConfig;
use crate::errors::{PolicyError, Result};
use crate::ident;

/// Wrapper around the Postgres connection pool backing an adapter.
#[derive(Clone, Debug)]
pub struct DatabasePool {
    pool: Pool<Postgres>,
}

impl DatabasePool {
    /// Opens the pool described by the configuration.
    ///
    /// When `database_exists` is false the target database is created first
    /// (if it is not already there) and the pool connects to it instead of the
    /// database named in the URL.
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        config.validate()?;

        let mut options = PgConnectOptions::from_str(&config.database_url)
            .map_err(PolicyError::connection)?;

        if !config.database_exists {
            let admin = Self::open(config, options.clone()).await?;
            admin.ensure_database(&config.database_name).await?;
            admin.close().await;
            options = options.database(&config.database_name);
        }

        Self::open(config, options).await
    }

    async fn open(config: &AdapterConfig, options: PgConnectOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(PolicyError::connection)?;

        Ok(Self { pool })
    }

    /// Wraps a pool the caller already opened.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Creates `name` unless `pg_database` already lists it.
    pub async fn ensure_database(&self, name: &str) -> Result<()> {
        ident::validate_database_name(name)?;

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(PolicyError::connection)?;

        if exists.is_some() {
            debug!(database = name, "policy database already present");
            return Ok(());
        }

        let ddl = format!("CREATE DATABASE {}", ident::quote(name));
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(PolicyError::schema)?;
        info!(database = name, "created policy database");
        Ok(())
    }

    pub fn inner(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Closes every connection. Calling it again is a no-op.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
