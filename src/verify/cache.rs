//! Process-lifetime idempotence cache for confirmed settlements.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::Mutex;

use super::VerificationResult;

/// Keyed by transaction identifier. Confirmed results are cached so a
/// repeat verify call returns the original result instead of
/// resubmitting; failures are not cached, leaving the retry decision to
/// the caller.
pub(crate) struct SettlementCache {
    confirmed: RwLock<HashMap<String, VerificationResult>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SettlementCache {
    pub(crate) fn new() -> Self {
        SettlementCache {
            confirmed: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, transaction_id: &str) -> Option<VerificationResult> {
        self.confirmed
            .read()
            .expect("settlement cache poisoned")
            .get(transaction_id)
            .cloned()
    }

    /// Record a confirmed settlement and drop its key lock; later calls
    /// hit the cache before they would contend for the lock.
    pub(crate) async fn insert(&self, transaction_id: String, result: VerificationResult) {
        self.confirmed
            .write()
            .expect("settlement cache poisoned")
            .insert(transaction_id.clone(), result);
        self.locks.lock().await.remove(&transaction_id);
    }

    /// Per-transaction lock serializing settlement attempts, so two
    /// concurrent proofs for the same transaction submit at most once.
    pub(crate) async fn key_lock(&self, transaction_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(transaction_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirmed_insert_releases_the_key_lock() {
        let cache = SettlementCache::new();
        let lock = cache.key_lock("0xabc").await;
        drop(lock);
        assert_eq!(cache.locks.lock().await.len(), 1);

        let result = VerificationResult::confirmed("0xabc");
        cache.insert("0xabc".to_string(), result.clone()).await;

        // The settled entry answers from the cache; its lock slot is gone.
        assert_eq!(cache.get("0xabc"), Some(result));
        assert!(cache.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn waiters_on_a_released_lock_still_proceed() {
        let cache = SettlementCache::new();
        let lock = cache.key_lock("0xdef").await;
        let guard = lock.lock().await;
        cache
            .insert("0xdef".to_string(), VerificationResult::confirmed("0xdef"))
            .await;
        drop(guard);

        // A clone of the removed Arc remains lockable.
        let _reacquired = lock.lock().await;
        assert!(cache.get("0xdef").is_some());
    }
}
