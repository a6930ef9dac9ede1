use std::time::Duration;

use tokio::sync::watch;

/// Owner side of a process-wide stop request.
///
/// Dropping the handle counts as a stop request, so loops never outlive the
/// component that started them.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Listener side of [`Shutdown`], cloned into every long-running loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Resolve once a stop has been requested.
    pub async fn triggered(&mut self) {
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `false` if the sleep was cut short.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.triggered() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn trigger_interrupts_sleep() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        let started = Instant::now();

        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(30)).await });
        shutdown.trigger();
        let completed = sleeper.await.expect("sleeper task");

        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn short_sleep_completes() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();

        assert!(signal.sleep(Duration::from_millis(1)).await);
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_stop() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();

        drop(shutdown);
        signal.triggered().await;

        assert!(signal.is_triggered());
    }
}
