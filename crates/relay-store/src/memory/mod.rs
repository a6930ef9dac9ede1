//! In-process document store.
//!
//! Each table keeps its rows in memory and publishes committed changes on a
//! broadcast feed. Failures can be injected per table to exercise retry paths.

mod table;

use async_trait::async_trait;
use relay_core::{Conversation, Event, Membership, Transaction};
use tracing::trace;

use self::table::Table;
use crate::Result;
use crate::feed::ChangeFeed;
use crate::traits::{
    ConversationRepository, CreateOutcome, EventLog, MembershipRepository, Store, TransactionLog,
};

pub const TRANSACTIONS_TABLE: &str = "Transactions";
pub const CONVERSATIONS_TABLE: &str = "Channels";
pub const MEMBERSHIPS_TABLE: &str = "ChannelMembers";
pub const EVENTS_TABLE: &str = "Hub";

pub struct MemoryTransactionLog {
    table: Table<Transaction>,
}

#[async_trait]
impl TransactionLog for MemoryTransactionLog {
    async fn insert(&self, transaction: &Transaction) -> Result<()> {
        self.table.insert(&transaction.id, transaction.clone())?;
        trace!(table = self.table.name(), id = %transaction.id, "inserted transaction");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self.table.get(id))
    }

    async fn update(&self, transaction: &Transaction) -> Result<()> {
        self.table.replace(&transaction.id, transaction.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.table.remove(id).map(|_| ())
    }

    async fn pending(&self) -> Result<Vec<Transaction>> {
        Ok(self.table.scan(|transaction| !transaction.is_done()))
    }

    async fn changes(&self) -> Result<ChangeFeed<Transaction>> {
        self.table.subscribe()
    }
}

pub struct MemoryConversations {
    table: Table<Conversation>,
}

#[async_trait]
impl ConversationRepository for MemoryConversations {
    async fn create_if_absent(&self, conversation: &Conversation) -> Result<CreateOutcome> {
        conversation.validate()?;
        self.table
            .insert_if_absent(&conversation.id, conversation.clone(), |existing| {
                existing.team_id == conversation.team_id && existing.name == conversation.name
            })
    }

    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.table.get(id))
    }
}

pub struct MemoryMemberships {
    table: Table<Membership>,
}

fn membership_key(membership: &Membership) -> String {
    format!("{}:{}", membership.conversation_id, membership.user_id)
}

#[async_trait]
impl MembershipRepository for MemoryMemberships {
    async fn create_member(&self, membership: &Membership) -> Result<CreateOutcome> {
        membership.validate()?;
        self.table
            .insert_if_absent(&membership_key(membership), membership.clone(), |_| false)
    }

    async fn members_of(&self, conversation_id: &str) -> Result<Vec<Membership>> {
        Ok(self
            .table
            .scan(|membership| membership.conversation_id == conversation_id))
    }
}

pub struct MemoryEvents {
    table: Table<Event>,
}

#[async_trait]
impl EventLog for MemoryEvents {
    async fn append(&self, event: &Event) -> Result<()> {
        self.table.insert(&event.id, event.clone())
    }

    async fn changes(&self) -> Result<ChangeFeed<Event>> {
        self.table.subscribe()
    }
}

/// All tables of the in-process store.
pub struct MemoryStore {
    transactions: MemoryTransactionLog,
    conversations: MemoryConversations,
    memberships: MemoryMemberships,
    events: MemoryEvents,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transactions: MemoryTransactionLog {
                table: Table::new(TRANSACTIONS_TABLE),
            },
            conversations: MemoryConversations {
                table: Table::new(CONVERSATIONS_TABLE),
            },
            memberships: MemoryMemberships {
                table: Table::new(MEMBERSHIPS_TABLE),
            },
            events: MemoryEvents {
                table: Table::new(EVENTS_TABLE),
            },
        }
    }

    /// Fail the next `count` transaction feed subscriptions.
    pub fn fail_next_transaction_feeds(&self, count: u32) {
        self.transactions.table.faults().fail_subscriptions(count);
    }

    /// Fail the next `count` transaction writes (insert, update or delete).
    pub fn fail_next_transaction_writes(&self, count: u32) {
        self.transactions.table.faults().fail_writes(count);
    }

    pub fn fail_next_conversation_writes(&self, count: u32) {
        self.conversations.table.faults().fail_writes(count);
    }

    pub fn fail_next_membership_writes(&self, count: u32) {
        self.memberships.table.faults().fail_writes(count);
    }

    pub fn fail_next_event_feeds(&self, count: u32) {
        self.events.table.faults().fail_subscriptions(count);
    }

    #[must_use]
    pub fn transaction_feed_attempts(&self) -> usize {
        self.transactions.table.subscribe_attempts()
    }

    #[must_use]
    pub fn event_feed_attempts(&self) -> usize {
        self.events.table.subscribe_attempts()
    }

    #[must_use]
    pub fn conversation_write_attempts(&self) -> usize {
        self.conversations.table.write_attempts()
    }

    #[must_use]
    pub fn membership_write_attempts(&self) -> usize {
        self.memberships.table.write_attempts()
    }

    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.table.len()
    }

    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations.table.len()
    }

    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.memberships.table.len()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.table.len()
    }
}

impl Store for MemoryStore {
    fn transactions(&self) -> &dyn TransactionLog {
        &self.transactions
    }

    fn conversations(&self) -> &dyn ConversationRepository {
        &self.conversations
    }

    fn memberships(&self) -> &dyn MembershipRepository {
        &self.memberships
    }

    fn events(&self) -> &dyn EventLog {
        &self.events
    }
}
