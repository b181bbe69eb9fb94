//! Per-session mutual exclusion
//!
//! Uploads for the same session key run their check-resolve-mutate sequence
//! one at a time; different keys proceed in parallel. Entries are dropped from
//! the registry as soon as no task holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::SessionKey;

type Registry = HashMap<SessionKey, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct SessionLocks {
    registry: Arc<Mutex<Registry>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &SessionKey) -> SessionGuard {
        let slot = {
            let mut registry = self.registry();
            Arc::clone(registry.entry(key.clone()).or_default())
        };

        let guard = slot.lock_owned().await;

        SessionGuard {
            guard: Some(guard),
            key: key.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Number of keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        self.registry().len()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The map is only touched in short non-panicking sections
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive access to one session key; released on drop
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: SessionKey,
    registry: Arc<Mutex<Registry>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the registry's own reference left: nobody holds or waits
        if registry
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            registry.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(session: &str) -> SessionKey {
        SessionKey::new("amy", session).unwrap()
    }

    #[tokio::test]
    async fn test_registry_empties_after_release() {
        let locks = SessionLocks::new();

        let guard = locks.lock(&key("s1")).await;
        assert_eq!(locks.active_keys(), 1);

        drop(guard);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = SessionLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.spawn(async move {
                let _guard = locks.lock(&key("s1")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("Task panicked");
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = SessionLocks::new();

        let _first = locks.lock(&key("s1")).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(&key("s2"))).await;

        assert!(second.is_ok(), "Lock on a different key should not wait");
    }
}
