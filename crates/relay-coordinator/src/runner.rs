use std::sync::Arc;

use relay_core::{Backoff, BackoffConfig, ShutdownSignal, Transaction};
use relay_saga::{SagaAuditLog, SagaExecutor, error_chain};
use relay_store::{SharedStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::lease::{LeadershipLease, wait_for_leadership};

/// How a runner left a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step succeeded and the row was deleted.
    Completed,
    /// The saga recorded an error; the row stays in `done` for the writer.
    Failed(String),
    /// The row disappeared while the saga was running.
    Abandoned,
    /// A stop was requested before the saga finished.
    Cancelled,
}

/// Drives one transaction from its current state to `done`.
#[derive(Clone)]
pub struct TransactionRunner {
    store: SharedStore,
    executor: Arc<SagaExecutor<SharedStore>>,
    lease: Arc<dyn LeadershipLease>,
    backoff: BackoffConfig,
    shutdown: ShutdownSignal,
}

impl TransactionRunner {
    #[must_use]
    pub fn new(
        store: SharedStore,
        executor: Arc<SagaExecutor<SharedStore>>,
        lease: Arc<dyn LeadershipLease>,
        backoff: BackoffConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            executor,
            lease,
            backoff,
            shutdown,
        }
    }

    /// Advance `transaction` until it is done, persisting every step.
    ///
    /// The stored row is read first and wins over the given copy, so a stale
    /// copy from the feed never moves a finished transaction back. Transient
    /// failures are retried from the same state with backoff for as long as
    /// it takes. Before each step the runner waits until this process holds
    /// the leadership lease.
    pub async fn run(&self, transaction: Transaction) -> RunOutcome {
        let mut backoff = self.backoff.start();
        let mut shutdown = self.shutdown.clone();
        let mut leadership = self.lease.subscribe();
        let mut audit = SagaAuditLog::new();

        let mut transaction = match self
            .reload(&transaction.id, &mut backoff, &mut shutdown)
            .await
        {
            Ok(Some(current)) => current,
            Ok(None) => {
                debug!(transaction = %transaction.id, "transaction already removed");
                return RunOutcome::Abandoned;
            }
            Err(outcome) => return outcome,
        };

        let outcome = loop {
            if transaction.is_done() {
                break self.finish(&transaction, &mut backoff, &mut shutdown).await;
            }
            if !wait_for_leadership(&mut leadership, &mut shutdown).await {
                break RunOutcome::Cancelled;
            }

            audit.record_start(transaction.state.as_str());
            match self.executor.advance(&self.store, &mut transaction).await {
                Ok(transition) => {
                    match &transition.error {
                        Some(reason) => audit.record_failed(reason),
                        None => audit.record_advanced(transition.to.as_str()),
                    }
                    debug!(
                        transaction = %transaction.id,
                        from = %transition.from,
                        to = %transition.to,
                        "saga step finished"
                    );
                    if let Err(outcome) = self
                        .persist(&transaction, &mut backoff, &mut shutdown)
                        .await
                    {
                        break outcome;
                    }
                    backoff.reset();
                }
                Err(err) if err.is_transient() => {
                    let reason = error_chain(&err);
                    audit.record_retry(&reason);
                    let delay = backoff.record_failure();
                    warn!(
                        transaction = %transaction.id,
                        state = %transaction.state,
                        error = %reason,
                        retry_in = ?delay,
                        "saga step failed; retrying"
                    );
                    if !shutdown.sleep(delay).await {
                        break RunOutcome::Cancelled;
                    }
                }
                Err(err) => {
                    let reason = error_chain(&err);
                    audit.record_failed(&reason);
                    error!(transaction = %transaction.id, error = %reason, "cannot run saga");
                    break RunOutcome::Failed(reason);
                }
            }
        };

        debug!(
            transaction = %transaction.id,
            kind = %transaction.kind,
            steps = %audit.summary(),
            retries = audit.retries(),
            "saga run ended"
        );
        outcome
    }

    async fn reload(
        &self,
        id: &str,
        backoff: &mut Backoff,
        shutdown: &mut ShutdownSignal,
    ) -> Result<Option<Transaction>, RunOutcome> {
        loop {
            match self.store.transactions().get(id).await {
                Ok(current) => {
                    backoff.reset();
                    return Ok(current);
                }
                Err(err) if err.is_transient() => {
                    let delay = backoff.record_failure();
                    warn!(
                        transaction = %id,
                        error = %err,
                        retry_in = ?delay,
                        "failed to load transaction; retrying"
                    );
                    if !shutdown.sleep(delay).await {
                        return Err(RunOutcome::Cancelled);
                    }
                }
                Err(err) => {
                    let reason = error_chain(&err);
                    error!(transaction = %id, error = %reason, "failed to load transaction");
                    return Err(RunOutcome::Failed(reason));
                }
            }
        }
    }

    /// Write the transaction's new state back, retrying transient failures.
    async fn persist(
        &self,
        transaction: &Transaction,
        backoff: &mut Backoff,
        shutdown: &mut ShutdownSignal,
    ) -> Result<(), RunOutcome> {
        loop {
            match self.store.transactions().update(transaction).await {
                Ok(()) => return Ok(()),
                Err(StoreError::NotFound { .. }) => {
                    warn!(transaction = %transaction.id, "transaction row removed while running");
                    return Err(RunOutcome::Abandoned);
                }
                Err(err) if err.is_transient() => {
                    let delay = backoff.record_failure();
                    warn!(
                        transaction = %transaction.id,
                        error = %err,
                        retry_in = ?delay,
                        "failed to save transaction state; retrying"
                    );
                    if !shutdown.sleep(delay).await {
                        return Err(RunOutcome::Cancelled);
                    }
                }
                Err(err) => {
                    let reason = error_chain(&err);
                    error!(transaction = %transaction.id, error = %reason, "failed to save transaction state");
                    return Err(RunOutcome::Failed(reason));
                }
            }
        }
    }

    /// Delete a successful transaction; leave a failed one for its writer.
    async fn finish(
        &self,
        transaction: &Transaction,
        backoff: &mut Backoff,
        shutdown: &mut ShutdownSignal,
    ) -> RunOutcome {
        if let Some(reason) = transaction.error() {
            warn!(transaction = %transaction.id, error = %reason, "saga failed");
            return RunOutcome::Failed(reason.to_string());
        }
        loop {
            match self.store.transactions().delete(&transaction.id).await {
                Ok(()) => {
                    info!(transaction = %transaction.id, kind = %transaction.kind, "saga completed");
                    return RunOutcome::Completed;
                }
                Err(StoreError::NotFound { .. }) => {
                    debug!(transaction = %transaction.id, "completed transaction already removed");
                    return RunOutcome::Completed;
                }
                Err(err) if err.is_transient() => {
                    let delay = backoff.record_failure();
                    warn!(
                        transaction = %transaction.id,
                        error = %err,
                        retry_in = ?delay,
                        "failed to remove completed transaction; retrying"
                    );
                    if !shutdown.sleep(delay).await {
                        return RunOutcome::Cancelled;
                    }
                }
                Err(err) => {
                    let reason = error_chain(&err);
                    error!(transaction = %transaction.id, error = %reason, "failed to remove completed transaction");
                    return RunOutcome::Failed(reason);
                }
            }
        }
    }
}
