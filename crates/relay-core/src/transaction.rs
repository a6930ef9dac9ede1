use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::id::new_id;

/// Position of a transaction in its saga's state sequence.
///
/// Every sequence starts at [`TransactionState::NEW`] and ends at
/// [`TransactionState::DONE`]; the names in between belong to the saga.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionState(String);

impl TransactionState {
    pub const NEW: &'static str = "new";
    pub const DONE: &'static str = "done";

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn initial() -> Self {
        Self::named(Self::NEW)
    }

    #[must_use]
    pub fn done() -> Self {
        Self::named(Self::DONE)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0 == Self::NEW
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.0 == Self::DONE
    }
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionState {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// A row of the transaction log.
///
/// Created by the initiating writer in state `new`, advanced only by the saga
/// executor, deleted on success and left in `done` with `error_str` set on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub state: TransactionState,
    #[serde(default)]
    pub error_str: String,
    #[serde(default)]
    pub model: Value,
}

impl Transaction {
    #[must_use]
    pub fn new(kind: impl Into<String>, model: Value) -> Self {
        Self {
            id: String::new(),
            kind: kind.into(),
            state: TransactionState::initial(),
            error_str: String::new(),
            model,
        }
    }

    /// Build a transaction whose model is the serialized `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn with_payload<T: Serialize>(kind: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Assign an id if the transaction does not have one yet.
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error_str = reason.into();
        self.state = TransactionState::done();
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        if self.error_str.is_empty() {
            None
        } else {
            Some(&self.error_str)
        }
    }
}
