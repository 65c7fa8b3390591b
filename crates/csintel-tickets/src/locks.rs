use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

/// Per-`clinic_key` advisory locks backed by a `DashMap`-keyed registry of
/// async mutexes, one per key, created lazily on first use.
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_returns_same_lock() {
        let reg = LockRegistry::new();
        let a = reg.lock_for("room-1");
        let b = reg.lock_for("room-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let reg = LockRegistry::new();
        let a = reg.lock_for("room-1");
        let b = reg.lock_for("room-2");
        let _guard_a = a.lock().await;
        // Must not deadlock: distinct keys use distinct mutexes.
        let _guard_b = b.lock().await;
    }
}
