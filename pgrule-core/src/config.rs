use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::ident::{self, TableName, DEFAULT_TABLE_NAME};

/// Database created when the adapter is asked to provision one.
pub const DEFAULT_DATABASE_NAME: &str = "casbin";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Relational backend the adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    #[default]
    Postgres,
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            _ => Err(ConfigError::UnsupportedDriver(value.to_string())),
        }
    }
}

/// Connection and table settings for the policy adapter.
#[derive(Clone)]
pub struct AdapterConfig {
    pub driver: Driver,
    pub database_url: String,
    /// Target database, used only when `database_exists` is false.
    pub database_name: String,
    pub table_name: String,
    pub table_prefix: Option<String>,
    /// When false the adapter creates `database_name` if needed and connects to it.
    pub database_exists: bool,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

// Keeps credentials embedded in the URL out of logs.
impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("driver", &self.driver)
            .field("database_url", &"[REDACTED]")
            .field("database_name", &self.database_name)
            .field("table_name", &self.table_name)
            .field("table_prefix", &self.table_prefix)
            .field("database_exists", &self.database_exists)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl AdapterConfig {
    /// Configuration with every optional setting at its default.
    pub fn new(driver: Driver, database_url: impl Into<String>) -> Self {
        Self {
            driver,
            database_url: database_url.into(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            table_prefix: None,
            database_exists: true,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Parses the driver identifier before building the configuration.
    pub fn for_driver(driver: &str, database_url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self::new(driver.parse()?, database_url))
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Asks the adapter to create the target database when it is missing.
    pub fn create_database(mut self) -> Self {
        self.database_exists = false;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix("")
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `AUTHZ_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let db_key = key("DATABASE_URL");
        let database_url =
            env::var(&db_key).map_err(|_| ConfigError::MissingEnvVar(db_key.clone()))?;

        let driver = match env::var(key("POLICY_DRIVER")) {
            Ok(raw) => raw.parse()?,
            Err(_) => Driver::default(),
        };

        let mut config = Self::new(driver, database_url);

        if let Ok(name) = env::var(key("POLICY_DATABASE")) {
            config.database_name = name;
        }
        if let Ok(table) = env::var(key("POLICY_TABLE")) {
            config.table_name = table;
        }
        config.table_prefix = env::var(key("POLICY_TABLE_PREFIX")).ok();

        let create_key = key("POLICY_CREATE_DATABASE");
        if let Ok(raw) = env::var(&create_key) {
            config.database_exists = !parse_bool(&create_key, &raw)?;
        }

        let pool_key = key("POLICY_MAX_CONNECTIONS");
        if let Ok(raw) = env::var(&pool_key) {
            config.max_connections =
                raw.trim()
                    .parse()
                    .map_err(|err: std::num::ParseIntError| ConfigError::InvalidEnvVar {
                        key: pool_key.clone(),
                        message: err.to_string(),
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations the adapter cannot act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database_url",
                message: "must not be empty".into(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections",
                message: "must be at least 1".into(),
            });
        }
        if !self.database_exists {
            ident::validate_database_name(&self.database_name)?;
        }
        self.table()?;
        Ok(())
    }

    /// Resolves the prefixed, validated table name.
    pub fn table(&self) -> Result<TableName, ConfigError> {
        TableName::new(self.table_prefix.as_deref(), &self.table_name)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
