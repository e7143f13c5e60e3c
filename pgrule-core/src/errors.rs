use thiserror::Error;

/// Result type used across the pgrule crates.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Canonical error representation shared by the adapter and its helpers.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot reach policy store: {0}")]
    Connection(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("rule already stored: {0}")]
    DuplicateRule(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("policy model rejected rule: {0}")]
    Model(String),

    #[error("adapter is closed")]
    Closed,
}

impl PolicyError {
    /// Wraps a driver error raised while opening or provisioning the store.
    pub fn connection(err: impl std::fmt::Display) -> Self {
        PolicyError::Connection(err.to_string())
    }

    /// Wraps a driver error raised by DDL.
    pub fn schema(err: impl std::fmt::Display) -> Self {
        PolicyError::Schema(err.to_string())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PolicyError::DuplicateRule(_))
    }
}

impl From<sqlx::Error> for PolicyError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PolicyError::DuplicateRule(db_err.message().to_string())
            }
            _ => PolicyError::Query(err),
        }
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable missing: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {key}: {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
