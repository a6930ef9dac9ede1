use async_trait::async_trait;
use relay_core::ShutdownSignal;
use tokio::sync::watch;

/// Permission to drive sagas forward.
///
/// Only the holder of the lease advances transactions; other processes keep
/// watching so they can take over. Implementations backed by a coordination
/// service renew the lease in the background and publish changes through
/// [`LeadershipLease::subscribe`].
#[async_trait]
pub trait LeadershipLease: Send + Sync {
    /// Try to become leader. Returns whether the lease is now held.
    async fn acquire(&self) -> bool;

    /// Extend a held lease. Returns `false` if it was lost.
    async fn renew(&self) -> bool;

    async fn release(&self);

    /// Current and future leadership of this process.
    fn subscribe(&self) -> watch::Receiver<bool>;

    fn is_leader(&self) -> bool {
        *self.subscribe().borrow()
    }
}

/// Lease for a single process that needs no coordination service.
#[derive(Debug)]
pub struct LocalLease {
    state: watch::Sender<bool>,
}

impl LocalLease {
    /// A lease that is already held.
    #[must_use]
    pub fn leader() -> Self {
        Self::with_state(true)
    }

    /// A lease that waits for [`LeadershipLease::acquire`].
    #[must_use]
    pub fn follower() -> Self {
        Self::with_state(false)
    }

    fn with_state(leader: bool) -> Self {
        let (state, _) = watch::channel(leader);
        Self { state }
    }
}

#[async_trait]
impl LeadershipLease for LocalLease {
    async fn acquire(&self) -> bool {
        self.state.send_replace(true);
        true
    }

    async fn renew(&self) -> bool {
        *self.state.borrow()
    }

    async fn release(&self) {
        self.state.send_replace(false);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Wait until this process leads or a stop is requested.
///
/// Returns `false` on stop, or when the lease is dropped without ever
/// becoming leader.
pub(crate) async fn wait_for_leadership(
    leadership: &mut watch::Receiver<bool>,
    shutdown: &mut ShutdownSignal,
) -> bool {
    if shutdown.is_triggered() {
        return false;
    }
    let leads = *leadership.borrow();
    if leads {
        return true;
    }
    tokio::select! {
        biased;
        () = shutdown.triggered() => false,
        leads = async { leadership.wait_for(|leader| *leader).await.is_ok() } => leads,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_core::Shutdown;

    use super::*;

    #[tokio::test]
    async fn follower_waits_for_acquire() {
        let lease = std::sync::Arc::new(LocalLease::follower());
        let shutdown = Shutdown::new();
        let mut leadership = lease.subscribe();
        let mut signal = shutdown.signal();

        let waiter =
            tokio::spawn(async move { wait_for_leadership(&mut leadership, &mut signal).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        assert!(lease.acquire().await);
        assert!(waiter.await.expect("waiter task"));
        assert!(lease.is_leader());
    }

    #[tokio::test]
    async fn shutdown_stops_waiting() {
        let lease = LocalLease::follower();
        let shutdown = Shutdown::new();
        let mut leadership = lease.subscribe();
        let mut signal = shutdown.signal();

        shutdown.trigger();

        assert!(!wait_for_leadership(&mut leadership, &mut signal).await);
    }

    #[tokio::test]
    async fn release_gives_up_leadership() {
        let lease = LocalLease::leader();

        assert!(lease.renew().await);
        lease.release().await;

        assert!(!lease.renew().await);
        assert!(!lease.is_leader());
    }
}
