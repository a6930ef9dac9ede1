//! Interfaces to the document database and an in-memory implementation.
//!
//! The database offers single-document atomicity and a per-table change feed.
//! Everything the coordinator and hub need from it is expressed by the traits
//! in this crate; [`MemoryStore`] implements them in-process.

mod error;
mod feed;
pub mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use feed::{Change, ChangeFeed};
pub use memory::MemoryStore;
pub use traits::{
    ConversationRepository, CreateOutcome, EventLog, MembershipRepository, SharedStore, Store,
    TransactionLog,
};
