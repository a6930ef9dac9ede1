use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no row '{id}' in table '{table}'")]
    NotFound { table: &'static str, id: String },

    #[error("row '{id}' already exists in table '{table}'")]
    Duplicate { table: &'static str, id: String },

    #[error("row in table '{table}' has no id")]
    MissingId { table: &'static str },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("change feed for table '{table}' closed")]
    FeedClosed { table: &'static str },

    #[error("change feed for table '{table}' fell behind by {skipped} change(s)")]
    FeedLagged { table: &'static str, skipped: u64 },

    #[error("invalid document")]
    Invalid(#[from] relay_core::CoreError),
}

impl StoreError {
    /// Whether retrying the same request later can succeed.
    ///
    /// Transient errors only delay progress; every other error is final for
    /// the request that produced it.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::FeedClosed { .. } | Self::FeedLagged { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_are_transient() {
        assert!(StoreError::Unavailable("timeout".to_string()).is_transient());
        assert!(StoreError::FeedClosed { table: "Transactions" }.is_transient());
        assert!(
            StoreError::FeedLagged {
                table: "Transactions",
                skipped: 3
            }
            .is_transient()
        );
    }

    #[test]
    fn contract_errors_are_not_transient() {
        let not_found = StoreError::NotFound {
            table: "Transactions",
            id: "abc".to_string(),
        };

        assert!(!not_found.is_transient());
        assert!(not_found.to_string().contains("abc"));
        assert!(!StoreError::MissingId { table: "Events" }.is_transient());
    }
}
