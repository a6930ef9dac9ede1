use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{Conversation, Event, Membership, Transaction};

use crate::Result;
use crate::feed::ChangeFeed;

/// Result of a create that detects conflicts instead of failing on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A row with the same identity already exists; `existing_id` is its id.
    AlreadyExists { existing_id: String },
}

/// The durable table of saga transactions.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the transaction has no id or the id is taken.
    async fn insert(&self, transaction: &Transaction) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn get(&self, id: &str) -> Result<Option<Transaction>>;

    /// Replace the stored row with `transaction`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the row was removed.
    async fn update(&self, transaction: &Transaction) -> Result<()>;

    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the row is already gone.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Transactions that have not reached `done`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn pending(&self) -> Result<Vec<Transaction>>;

    /// Subscribe to every change committed after this call returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened.
    async fn changes(&self) -> Result<ChangeFeed<Transaction>>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Create the conversation unless one with the same id, or the same name
    /// within the same team, already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation is invalid or the store fails.
    async fn create_if_absent(&self, conversation: &Conversation) -> Result<CreateOutcome>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Create the membership; an existing membership for the same
    /// conversation and user is reported, not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the membership is invalid or the store fails.
    async fn create_member(&self, membership: &Membership) -> Result<CreateOutcome>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn members_of(&self, conversation_id: &str) -> Result<Vec<Membership>>;
}

/// The durable table of published hub events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the event has no id or the store fails.
    async fn append(&self, event: &Event) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened.
    async fn changes(&self) -> Result<ChangeFeed<Event>>;
}

/// Access to every table the coordinator and hub use.
pub trait Store: Send + Sync + 'static {
    fn transactions(&self) -> &dyn TransactionLog;
    fn conversations(&self) -> &dyn ConversationRepository;
    fn memberships(&self) -> &dyn MembershipRepository;
    fn events(&self) -> &dyn EventLog;
}

pub type SharedStore = Arc<dyn Store>;
