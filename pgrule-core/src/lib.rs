//! Shared primitives for the pgrule workspace.
//!
//! This crate holds what every other crate leans on: the canonical error
//! types, adapter configuration loading, the Postgres pool and database
//! provisioning helpers, identifier validation and logging setup.

pub mod config;
pub mod db;
pub mod errors;
pub mod ident;
pub mod logging;

pub use config::{AdapterConfig, Driver};
pub use db::DatabasePool;
pub use errors::{ConfigError, PolicyError, Result};
pub use ident::TableName;
