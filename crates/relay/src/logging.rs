use relay_core::LogConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, Result};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub(crate) fn init(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|source| CliError::LogFilter {
            filter: config.filter.clone(),
            source,
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::Logger(err.to_string()))
}
