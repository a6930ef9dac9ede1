use std::sync::Arc;

use relay_coordinator::{LeadershipLease, LocalLease, TransactionWatcher, default_executor};
use relay_core::{RelayConfig, Shutdown};
use relay_hub::{Hub, HubFeed};
use relay_store::{MemoryStore, SharedStore};
use tracing::{info, warn};

use crate::error::{CliError, Result};
use crate::logging;

pub(crate) fn run(config: &RelayConfig) -> Result<()> {
    logging::init(&config.log)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(serve(config))
}

async fn serve(config: &RelayConfig) -> Result<()> {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let shutdown = Shutdown::new();
    let lease = Arc::new(LocalLease::leader());
    let backoff = config.coordinator.backoff;

    let watcher = TransactionWatcher::new(
        Arc::clone(&store),
        Arc::new(default_executor()?),
        lease.clone(),
        backoff,
        shutdown.signal(),
    );
    let watch_task = watcher.spawn().ok_or(CliError::WatcherRunning)?;
    let (hub, hub_task) = Hub::start(&config.hub);
    let relay_task = HubFeed::new(store, hub.clone(), backoff, shutdown.signal()).spawn();
    info!(
        mailbox = config.hub.mailbox_capacity,
        connection_buffer = config.hub.connection_buffer,
        "relay running; press ctrl-c to stop"
    );

    let interrupted = tokio::signal::ctrl_c().await;
    info!("stopping");
    shutdown.trigger();
    lease.release().await;
    if let Err(err) = hub.stop().await {
        warn!(error = %err, "hub already stopped");
    }
    let (watch_result, relay_result, hub_result) = tokio::join!(watch_task, relay_task, hub_task);
    for (task, result) in [
        ("watcher", watch_result),
        ("event relay", relay_result),
        ("hub", hub_result),
    ] {
        if let Err(err) = result {
            warn!(task, error = %err, "task ended abnormally");
        }
    }
    interrupted.map_err(CliError::Signal)
}
