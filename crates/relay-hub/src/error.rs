use relay_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub has stopped")]
    Stopped,

    #[error("failed to publish event")]
    Publish(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, HubError>;
