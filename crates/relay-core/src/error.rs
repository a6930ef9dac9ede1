use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid conversation '{id}': {reason}")]
    InvalidConversation { id: String, reason: &'static str },

    #[error("invalid membership of '{user_id}' in '{conversation_id}': {reason}")]
    InvalidMembership {
        conversation_id: String,
        user_id: String,
        reason: &'static str,
    },

    #[error("failed to encode transaction payload")]
    Payload(#[from] serde_json::Error),

    #[error("failed to read configuration file '{path}'")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration")]
    ConfigParse(#[source] toml::de::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
