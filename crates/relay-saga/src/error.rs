use std::error::Error as StdError;

use thiserror::Error;

/// Error from saga registration or execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    #[error("no saga registered for transaction type '{0}'")]
    UnknownKind(String),

    #[error("saga '{0}' is already registered")]
    DuplicateKind(&'static str),

    #[error("saga '{kind}' has an invalid state sequence: {reason}")]
    InvalidDefinition {
        kind: &'static str,
        reason: &'static str,
    },

    #[error("transaction '{id}' is already done")]
    AlreadyDone { id: String },

    #[error("failed to decode '{kind}' payload")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("step '{state}' of saga '{kind}' failed")]
    Step {
        kind: &'static str,
        state: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl SagaError {
    /// Whether the failed step should be retried from the same state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Step { .. })
    }
}

/// Render an error and all of its sources on one line.
#[must_use]
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
