use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error")]
    Config(#[from] relay_core::CoreError),

    #[error("failed to render configuration")]
    Render(#[from] toml::ser::Error),

    #[error("invalid log filter '{filter}'")]
    LogFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to install logger: {0}")]
    Logger(String),

    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),

    #[error("failed to listen for ctrl-c")]
    Signal(#[source] std::io::Error),

    #[error("saga registry error")]
    Saga(#[from] relay_saga::SagaError),

    #[error("transaction watcher is already running")]
    WatcherRunning,
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::CliError;

    #[test]
    fn config_error_converts_via_from() {
        let core_err = relay_core::CoreError::InvalidConfig {
            field: "hub.mailbox_capacity",
            reason: "must be at least 1",
        };

        let cli_err: CliError = core_err.into();

        assert!(matches!(cli_err, CliError::Config(_)));
    }

    #[test]
    fn log_filter_error_names_filter() {
        let source = "relay=notalevel"
            .parse::<tracing_subscriber::filter::Directive>()
            .expect_err("level is invalid");

        let err = CliError::LogFilter {
            filter: "relay=notalevel".to_string(),
            source,
        };

        assert!(err.to_string().contains("relay=notalevel"));
    }
}
