//! Saga coordination over the transaction change feed.
//!
//! Writers call [`TransactionClient`] to insert a transaction and wait for it
//! to finish. A single [`TransactionWatcher`] per process tails the
//! transaction log, hands every new transaction of a registered type to its
//! own runner, and the runner advances the saga one persisted step at a time
//! while this process holds the [`LeadershipLease`].

mod client;
mod direct_channel;
mod error;
mod lease;
mod runner;
mod watcher;

use relay_saga::{SagaError, SagaExecutor};
use relay_store::SharedStore;

pub use client::TransactionClient;
pub use direct_channel::{DIRECT_CHANNEL, DirectChannelPayload, DirectChannelSaga};
pub use error::{CoordinatorError, Result};
pub use lease::{LeadershipLease, LocalLease};
pub use runner::{RunOutcome, TransactionRunner};
pub use watcher::TransactionWatcher;

/// Executor with every saga type this crate knows how to run.
///
/// # Errors
///
/// Returns an error if a bundled saga has an invalid state sequence.
pub fn default_executor() -> std::result::Result<SagaExecutor<SharedStore>, SagaError> {
    SagaExecutor::new().with_step(DirectChannelSaga)
}
