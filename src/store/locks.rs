use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Held for as long as the aggregate must stay locked.
pub type LockGuard = OwnedMutexGuard<()>;

/// Per-aggregate async locks.
///
/// A command holds the guard of its aggregate root (supplier, RFQ, purchase order
/// or invoice) across its whole read-validate-commit sequence, so two commands on
/// the same aggregate run one after the other.
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, aggregate_id: Uuid) -> LockGuard {
        let lock = self
            .locks
            .entry(aggregate_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("locks", &self.locks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_aggregate_is_serialized() {
        let registry = LockRegistry::new();
        let id = Uuid::new_v4();

        let guard = registry.acquire(id).await;
        let contender = registry.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(id).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_aggregates_do_not_block() {
        let registry = LockRegistry::new();
        let _a = registry.acquire(Uuid::new_v4()).await;
        let _b = registry.acquire(Uuid::new_v4()).await;
        assert_eq!(registry.len(), 2);

        drop(_a);
        registry.prune();
        assert_eq!(registry.len(), 1);
    }
}
