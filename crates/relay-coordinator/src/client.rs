use futures::StreamExt;
use relay_core::{Conversation, Membership, ShutdownSignal, Transaction};
use relay_store::{SharedStore, StoreError};
use tracing::{debug, warn};

use crate::direct_channel::{DIRECT_CHANNEL, DirectChannelPayload};
use crate::error::{CoordinatorError, Result};

/// Writer side of the transaction log: submits sagas and waits for them.
#[derive(Clone)]
pub struct TransactionClient {
    store: SharedStore,
    shutdown: ShutdownSignal,
}

impl TransactionClient {
    #[must_use]
    pub fn new(store: SharedStore, shutdown: ShutdownSignal) -> Self {
        Self { store, shutdown }
    }

    /// Insert `transaction` and wait until its saga has finished.
    ///
    /// The feed is opened before the insert, so the terminal change cannot
    /// be missed. Removal of the row means success; the row reappearing with
    /// an error means the saga failed.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::SagaFailed` with the recorded error, or a
    /// store error if the transaction could not be submitted or watched.
    pub async fn submit_and_wait(&self, mut transaction: Transaction) -> Result<()> {
        transaction.pre_save();
        let id = transaction.id.clone();
        let log = self.store.transactions();

        let mut feed = log.changes().await?;
        log.insert(&transaction).await?;
        debug!(transaction = %id, kind = %transaction.kind, "submitted transaction");

        let mut shutdown = self.shutdown.clone();
        loop {
            let change = tokio::select! {
                biased;
                () = shutdown.triggered() => return Err(CoordinatorError::Cancelled { id }),
                change = feed.next() => change,
            };
            match change {
                Some(Ok(change)) => match (&change.old_val, &change.new_val) {
                    (_, Some(new)) if new.id == id => {
                        if let Some(reason) = new.error() {
                            return Err(CoordinatorError::SagaFailed {
                                id,
                                reason: reason.to_string(),
                            });
                        }
                    }
                    (Some(old), None) if old.id == id => return Ok(()),
                    _ => {}
                },
                Some(Err(StoreError::FeedLagged { skipped, .. })) => {
                    warn!(transaction = %id, skipped, "transaction feed lagged; checking row");
                    match log.get(&id).await? {
                        None => return Ok(()),
                        Some(row) => {
                            if let Some(reason) = row.error() {
                                return Err(CoordinatorError::SagaFailed {
                                    id,
                                    reason: reason.to_string(),
                                });
                            }
                        }
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => return Err(CoordinatorError::FeedClosed { id }),
            }
        }
    }

    /// Create a direct conversation and both memberships as one saga.
    ///
    /// The conversation loses any team id and receives a fresh id; both
    /// memberships are pointed at it before the transaction is written.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::NotDirect` for other conversation kinds,
    /// a validation error for malformed memberships, or the saga's error.
    pub async fn save_direct_conversation(
        &self,
        mut conversation: Conversation,
        mut first: Membership,
        mut second: Membership,
    ) -> Result<Conversation> {
        if !conversation.is_direct() {
            return Err(CoordinatorError::NotDirect {
                name: conversation.name,
            });
        }
        conversation.team_id = None;
        conversation.pre_save();
        conversation.validate()?;

        first.conversation_id.clone_from(&conversation.id);
        second.conversation_id.clone_from(&conversation.id);
        first.validate()?;
        second.validate()?;

        let payload = DirectChannelPayload {
            conversation: conversation.clone(),
            members: [first, second],
        };
        let transaction = Transaction::with_payload(DIRECT_CHANNEL, &payload)?;
        self.submit_and_wait(transaction).await?;
        Ok(conversation)
    }
}
