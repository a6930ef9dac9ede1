//! Data model shared by the relay coordinator and hub.
//!
//! A [`Transaction`] is a persisted, resumable record of a write that spans
//! several documents. Conversations and memberships are the documents the
//! bundled saga promotes, and [`Event`] is the payload the hub fans out.

mod backoff;
mod config;
mod conversation;
mod error;
mod event;
mod id;
mod shutdown;
mod transaction;

pub use backoff::{Backoff, BackoffConfig};
pub use config::{CoordinatorConfig, HubConfig, LogConfig, RelayConfig};
pub use conversation::{Conversation, ConversationKind, Membership};
pub use error::{CoreError, Result};
pub use event::{Action, Event};
pub use id::{ID_LENGTH, new_id};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use transaction::{Transaction, TransactionState};
