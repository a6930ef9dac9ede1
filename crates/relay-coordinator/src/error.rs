use relay_core::CoreError;
use relay_saga::SagaError;
use relay_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("transaction '{id}' failed: {reason}")]
    SagaFailed { id: String, reason: String },

    #[error("conversation '{name}' is not a direct conversation")]
    NotDirect { name: String },

    #[error("transaction feed closed before '{id}' finished")]
    FeedClosed { id: String },

    #[error("stopped while waiting for transaction '{id}'")]
    Cancelled { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
