use futures::StreamExt;
use relay_core::{Backoff, BackoffConfig, Event, ShutdownSignal};
use relay_store::{ChangeFeed, SharedStore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{HubError, Result};
use crate::hub::Hub;

/// Records events in the event log for delivery by a [`HubFeed`].
#[derive(Clone)]
pub struct Publisher {
    store: SharedStore,
}

impl Publisher {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Assign the event an id and append it to the event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log rejects the write.
    pub async fn publish(&self, mut event: Event) -> Result<Event> {
        event.pre_save();
        self.store.events().append(&event).await?;
        debug!(event = %event.id, action = ?event.action, "event published");
        Ok(event)
    }
}

/// Relays every event appended to the event log to a hub.
pub struct HubFeed {
    store: SharedStore,
    hub: Hub,
    backoff: BackoffConfig,
    shutdown: ShutdownSignal,
}

impl HubFeed {
    #[must_use]
    pub fn new(
        store: SharedStore,
        hub: Hub,
        backoff: BackoffConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            hub,
            backoff,
            shutdown,
        }
    }

    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Relay until a stop is requested or the hub ends. A lost feed is
    /// reopened with backoff.
    pub async fn run(self) {
        let mut backoff = self.backoff.start();
        let mut shutdown = self.shutdown.clone();

        while let Some(mut feed) = self.connect(&mut backoff, &mut shutdown).await {
            let lost = loop {
                let change = tokio::select! {
                    biased;
                    () = shutdown.triggered() => break None,
                    change = feed.next() => change,
                };
                match change {
                    Some(Ok(change)) if change.is_insert() => {
                        if let Err(HubError::Stopped) = self.hub.broadcast(change.new_val).await {
                            info!("hub stopped; no longer relaying events");
                            return;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break Some(err.to_string()),
                    None => break Some(String::from("feed ended")),
                }
            };
            let Some(reason) = lost else { break };
            warn!(reason = %reason, "lost event feed; reconnecting");
        }
        debug!("event relay stopped");
    }

    async fn connect(
        &self,
        backoff: &mut Backoff,
        shutdown: &mut ShutdownSignal,
    ) -> Option<ChangeFeed<Event>> {
        loop {
            if shutdown.is_triggered() {
                return None;
            }
            match self.store.events().changes().await {
                Ok(feed) => {
                    backoff.reset();
                    return Some(feed);
                }
                Err(err) => {
                    let delay = backoff.record_failure();
                    error!(
                        error = %err,
                        attempt = backoff.failures(),
                        retry_in = ?delay,
                        "failed to open event feed"
                    );
                    if !shutdown.sleep(delay).await {
                        return None;
                    }
                }
            }
        }
    }
}
