//! One exclusive async lock per user id.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide registry of per-user locks.
///
/// Locks are created on first access and live for the rest of the process.
#[derive(Default)]
pub struct SessionLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `user_id`, created atomically if absent.
    pub fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(user_id) {
            return Arc::clone(lock.value());
        }
        // `entry` holds the shard write lock, so racing first calls agree.
        Arc::clone(
            self.locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Wait for exclusive access to the user's session.
    ///
    /// The guard releases the lock when dropped, on every exit path.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(user_id).lock_owned().await
    }

    /// Number of users that have a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn same_user_gets_same_lock() {
        let registry = SessionLockRegistry::new();
        let a = registry.lock_for("1");
        let b = registry.lock_for("1");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.lock_for("2")));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_creates_one_lock() {
        let registry = Arc::new(SessionLockRegistry::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.lock_for("new-user") })
            })
            .collect();

        let locks = futures::future::join_all(handles).await;
        let first = locks[0].as_ref().unwrap();
        for lock in &locks {
            assert!(Arc::ptr_eq(first, lock.as_ref().unwrap()));
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn acquire_is_exclusive_per_user() {
        let registry = SessionLockRegistry::new();
        let guard = registry.acquire("1").await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), registry.acquire("1")).await;
        assert!(blocked.is_err());

        // Other users are unaffected.
        let _other = registry.acquire("2").await;

        drop(guard);
        let _again = registry.acquire("1").await;
    }
}
