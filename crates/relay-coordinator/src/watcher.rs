use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use relay_core::{Backoff, BackoffConfig, ShutdownSignal, Transaction};
use relay_saga::SagaExecutor;
use relay_store::{Change, ChangeFeed, SharedStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::lease::LeadershipLease;
use crate::runner::{RunOutcome, TransactionRunner};

/// Tails the transaction log and starts a runner for every new transaction
/// of a registered type.
///
/// At most one watcher runs per guard; see [`TransactionWatcher::spawn`].
#[derive(Clone)]
pub struct TransactionWatcher {
    runner: TransactionRunner,
    store: SharedStore,
    executor: Arc<SagaExecutor<SharedStore>>,
    backoff: BackoffConfig,
    shutdown: ShutdownSignal,
    running: Arc<AtomicBool>,
}

impl TransactionWatcher {
    #[must_use]
    pub fn new(
        store: SharedStore,
        executor: Arc<SagaExecutor<SharedStore>>,
        lease: Arc<dyn LeadershipLease>,
        backoff: BackoffConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        let runner = TransactionRunner::new(
            Arc::clone(&store),
            Arc::clone(&executor),
            lease,
            backoff,
            shutdown.clone(),
        );
        Self {
            runner,
            store,
            executor,
            backoff,
            shutdown,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share the running flag with other watchers over the same store.
    #[must_use]
    pub fn with_guard(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching on a new task.
    ///
    /// Returns `None` if a watcher sharing this guard is already running.
    #[must_use]
    pub fn spawn(&self) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("transaction watcher already running");
            return None;
        }
        let watcher = self.clone();
        Some(tokio::spawn(async move {
            let _running = RunningGuard(Arc::clone(&watcher.running));
            watcher.watch().await;
        }))
    }

    async fn watch(self) {
        let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<String>();
        let mut in_flight = HashSet::new();
        let mut backoff = self.backoff.start();
        let mut shutdown = self.shutdown.clone();
        info!(kinds = ?self.executor.kinds().collect::<Vec<_>>(), "watching transactions");

        while let Some(mut feed) = self.connect(&mut backoff, &mut shutdown).await {
            self.recover(&mut in_flight, &finished_tx).await;

            let lost = loop {
                tokio::select! {
                    biased;
                    () = shutdown.triggered() => break None,
                    Some(id) = finished_rx.recv() => {
                        in_flight.remove(&id);
                    }
                    change = feed.next() => match change {
                        Some(Ok(change)) => self.on_change(change, &mut in_flight, &finished_tx),
                        Some(Err(err)) => break Some(err.to_string()),
                        None => break Some(String::from("feed ended")),
                    },
                }
            };
            let Some(reason) = lost else { break };
            warn!(reason = %reason, "lost transaction feed; reconnecting");
        }
        info!(in_flight = in_flight.len(), "stopped watching transactions");
    }

    /// Subscribe to the transaction feed, retrying with backoff until it
    /// succeeds. Returns `None` on stop.
    async fn connect(
        &self,
        backoff: &mut Backoff,
        shutdown: &mut ShutdownSignal,
    ) -> Option<ChangeFeed<Transaction>> {
        loop {
            if shutdown.is_triggered() {
                return None;
            }
            match self.store.transactions().changes().await {
                Ok(feed) => {
                    if backoff.failures() > 0 {
                        info!(attempts = backoff.failures() + 1, "transaction feed connected");
                    }
                    backoff.reset();
                    return Some(feed);
                }
                Err(err) => {
                    let delay = backoff.record_failure();
                    error!(
                        error = %err,
                        attempt = backoff.failures(),
                        retry_in = ?delay,
                        "failed to open transaction feed"
                    );
                    if !shutdown.sleep(delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Resume every unfinished transaction left by an earlier process or a
    /// feed outage.
    async fn recover(
        &self,
        in_flight: &mut HashSet<String>,
        finished: &mpsc::UnboundedSender<String>,
    ) {
        match self.store.transactions().pending().await {
            Ok(pending) => {
                for transaction in pending {
                    if self.executor.handles(&transaction.kind) {
                        self.dispatch(transaction, in_flight, finished);
                    }
                }
            }
            Err(err) => warn!(error = %err, "failed to list unfinished transactions"),
        }
    }

    fn on_change(
        &self,
        change: Change<Transaction>,
        in_flight: &mut HashSet<String>,
        finished: &mpsc::UnboundedSender<String>,
    ) {
        if !change.is_insert() {
            return;
        }
        let Some(transaction) = change.new_val else {
            return;
        };
        if !self.executor.handles(&transaction.kind) {
            trace!(transaction = %transaction.id, kind = %transaction.kind, "no saga for transaction type");
            return;
        }
        self.dispatch(transaction, in_flight, finished);
    }

    fn dispatch(
        &self,
        transaction: Transaction,
        in_flight: &mut HashSet<String>,
        finished: &mpsc::UnboundedSender<String>,
    ) {
        if !in_flight.insert(transaction.id.clone()) {
            trace!(transaction = %transaction.id, "transaction already running");
            return;
        }
        debug!(transaction = %transaction.id, kind = %transaction.kind, state = %transaction.state, "starting saga");
        let runner = self.runner.clone();
        let finished = finished.clone();
        tokio::spawn(async move {
            let id = transaction.id.clone();
            match runner.run(transaction).await {
                RunOutcome::Completed | RunOutcome::Failed(_) => {}
                RunOutcome::Abandoned => debug!(transaction = %id, "saga abandoned"),
                RunOutcome::Cancelled => debug!(transaction = %id, "saga interrupted by stop"),
            }
            let _ = finished.send(id);
        });
    }
}

/// Clears the running flag when the watch task ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
