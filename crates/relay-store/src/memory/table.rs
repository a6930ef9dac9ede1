use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{Result, StoreError};
use crate::feed::{Change, ChangeFeed};
use crate::traits::CreateOutcome;

const FEED_CAPACITY: usize = 1024;

/// Injected failures, consumed one per matching request.
#[derive(Debug, Default)]
pub(crate) struct Faults {
    writes: AtomicU32,
    subscriptions: AtomicU32,
}

impl Faults {
    pub(crate) fn fail_writes(&self, count: u32) {
        self.writes.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_subscriptions(&self, count: u32) {
        self.subscriptions.fetch_add(count, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// A keyed set of rows with a change feed.
///
/// Each mutation publishes its change while the row lock is held, so feed
/// order matches commit order.
pub(crate) struct Table<T> {
    name: &'static str,
    rows: Mutex<BTreeMap<String, T>>,
    feed: broadcast::Sender<Change<T>>,
    faults: Faults,
    write_attempts: AtomicUsize,
    subscribe_attempts: AtomicUsize,
}

impl<T> Table<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: &'static str) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            name,
            rows: Mutex::new(BTreeMap::new()),
            feed,
            faults: Faults::default(),
            write_attempts: AtomicUsize::new(0),
            subscribe_attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn faults(&self) -> &Faults {
        &self.faults
    }

    pub(crate) fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe_attempts(&self) -> usize {
        self.subscribe_attempts.load(Ordering::SeqCst)
    }

    fn begin_write(&self) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if Faults::take(&self.faults.writes) {
            return Err(StoreError::Unavailable(format!(
                "injected write failure on '{}'",
                self.name
            )));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, T>> {
        self.rows.lock().expect("table lock poisoned")
    }

    fn publish(&self, change: Change<T>) {
        // No subscribers is not an error.
        let _ = self.feed.send(change);
    }

    fn require_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(StoreError::MissingId { table: self.name });
        }
        Ok(())
    }

    pub(crate) fn insert(&self, id: &str, row: T) -> Result<()> {
        self.begin_write()?;
        self.require_id(id)?;
        let mut rows = self.lock();
        if rows.contains_key(id) {
            return Err(StoreError::Duplicate {
                table: self.name,
                id: id.to_string(),
            });
        }
        rows.insert(id.to_string(), row.clone());
        self.publish(Change::inserted(row));
        Ok(())
    }

    /// Insert unless a row with the same id, or any row matching `conflicts`,
    /// is present.
    pub(crate) fn insert_if_absent(
        &self,
        id: &str,
        row: T,
        conflicts: impl Fn(&T) -> bool,
    ) -> Result<CreateOutcome> {
        self.begin_write()?;
        self.require_id(id)?;
        let mut rows = self.lock();
        if rows.contains_key(id) {
            return Ok(CreateOutcome::AlreadyExists {
                existing_id: id.to_string(),
            });
        }
        if let Some((existing_id, _)) = rows.iter().find(|(_, existing)| conflicts(existing)) {
            return Ok(CreateOutcome::AlreadyExists {
                existing_id: existing_id.clone(),
            });
        }
        rows.insert(id.to_string(), row.clone());
        self.publish(Change::inserted(row));
        Ok(CreateOutcome::Created)
    }

    pub(crate) fn replace(&self, id: &str, row: T) -> Result<()> {
        self.begin_write()?;
        let mut rows = self.lock();
        let Some(slot) = rows.get_mut(id) else {
            return Err(StoreError::NotFound {
                table: self.name,
                id: id.to_string(),
            });
        };
        let old = std::mem::replace(slot, row.clone());
        self.publish(Change::updated(old, row));
        Ok(())
    }

    pub(crate) fn remove(&self, id: &str) -> Result<T> {
        self.begin_write()?;
        let mut rows = self.lock();
        let Some(old) = rows.remove(id) else {
            return Err(StoreError::NotFound {
                table: self.name,
                id: id.to_string(),
            });
        };
        self.publish(Change::deleted(old.clone()));
        Ok(old)
    }

    pub(crate) fn get(&self, id: &str) -> Option<T> {
        self.lock().get(id).cloned()
    }

    pub(crate) fn scan(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.lock()
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn subscribe(&self) -> Result<ChangeFeed<T>> {
        self.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
        if Faults::take(&self.faults.subscriptions) {
            return Err(StoreError::Unavailable(format!(
                "injected subscription failure on '{}'",
                self.name
            )));
        }
        let table = self.name;
        let receiver = self.feed.subscribe();
        let feed = futures::stream::unfold(receiver, move |mut receiver| async move {
            match receiver.recv().await {
                Ok(change) => Some((Ok(change), receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    Some((Err(StoreError::FeedLagged { table, skipped }), receiver))
                }
                Err(RecvError::Closed) => None,
            }
        });
        Ok(feed.boxed())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn feed_reports_mutations_in_order() -> anyhow::Result<()> {
        let table: Table<u32> = Table::new("Numbers");
        let mut feed = table.subscribe()?;

        table.insert("a", 1)?;
        table.replace("a", 2)?;
        table.remove("a")?;

        let first = feed.next().await.expect("insert")?;
        let second = feed.next().await.expect("update")?;
        let third = feed.next().await.expect("delete")?;
        assert_eq!(first, Change::inserted(1));
        assert_eq!(second, Change::updated(1, 2));
        assert_eq!(third, Change::deleted(2));
        Ok(())
    }

    #[test]
    fn missing_rows_are_not_found() {
        let table: Table<u32> = Table::new("Numbers");

        assert!(matches!(
            table.replace("x", 1),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(table.remove("x"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn insert_if_absent_reports_conflicting_row() -> anyhow::Result<()> {
        let table: Table<u32> = Table::new("Numbers");
        table.insert("a", 7)?;

        let outcome = table.insert_if_absent("b", 7, |existing| *existing == 7)?;

        assert_eq!(
            outcome,
            CreateOutcome::AlreadyExists {
                existing_id: "a".to_string()
            }
        );
        assert_eq!(table.len(), 1);
        Ok(())
    }

    #[test]
    fn injected_write_failures_are_consumed() -> anyhow::Result<()> {
        let table: Table<u32> = Table::new("Numbers");
        table.faults().fail_writes(1);

        let first = table.insert("a", 1);
        table.insert("a", 1)?;

        assert!(matches!(first, Err(StoreError::Unavailable(_))));
        assert_eq!(table.write_attempts(), 2);
        Ok(())
    }

    #[test]
    fn injected_subscription_failures_are_consumed() {
        let table: Table<u32> = Table::new("Numbers");
        table.faults().fail_subscriptions(2);

        assert!(table.subscribe().is_err());
        assert!(table.subscribe().is_err());
        assert!(table.subscribe().is_ok());
        assert_eq!(table.subscribe_attempts(), 3);
    }
}
