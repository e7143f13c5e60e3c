use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::errors::{ConfigError, Result};

const ADAPTER_TARGETS: [&str; 3] = ["pgrule", "pgrule_core", "pgrule_adapter"];

/// Directives used when `RUST_LOG` is unset: the adapter crates log at
/// `level`, everything else (sqlx included) at `warn`.
fn default_directives(level: LevelFilter) -> String {
    let level = level.to_string().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(ADAPTER_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Installs a fmt subscriber writing to stderr for processes embedding the adapter.
///
/// `RUST_LOG` wins over `level`; `level` defaults to `info` and accepts
/// `off`, `error`, `warn`, `info`, `debug` or `trace`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let level: LevelFilter = level
        .unwrap_or("info")
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            field: "log level",
            message: format!("unknown level {:?}", level.unwrap_or_default()),
        })?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(level)).map_err(|err| {
            ConfigError::InvalidValue {
                field: "log level",
                message: err.to_string(),
            }
        })?,
    };

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init()
        .map_err(|err| ConfigError::InvalidValue {
            field: "tracing subscriber",
            message: err.to_string(),
        })?;

    Ok(())
}
