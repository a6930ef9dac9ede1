use futures::stream::BoxStream;

use crate::error::StoreError;

/// One committed change to a table row.
///
/// An insert has no `old_val`, a delete has no `new_val`, an update has both.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub old_val: Option<T>,
    pub new_val: Option<T>,
}

impl<T> Change<T> {
    #[must_use]
    pub fn inserted(row: T) -> Self {
        Self {
            old_val: None,
            new_val: Some(row),
        }
    }

    #[must_use]
    pub fn updated(old: T, new: T) -> Self {
        Self {
            old_val: Some(old),
            new_val: Some(new),
        }
    }

    #[must_use]
    pub fn deleted(row: T) -> Self {
        Self {
            old_val: Some(row),
            new_val: None,
        }
    }

    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.old_val.is_none() && self.new_val.is_some()
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.old_val.is_some() && self.new_val.is_none()
    }
}

/// Stream of committed changes in commit order. Ends when the feed closes.
pub type ChangeFeed<T> = BoxStream<'static, Result<Change<T>, StoreError>>;
