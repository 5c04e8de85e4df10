//! Key/value capability behind the session and persistent tiers.
//!
//! [`CacheStore`](super::CacheStore) only talks to slower tiers through
//! [`KvStore`], so the backing technology (in-process map, file system,
//! distributed cache, relational table) can be swapped without touching the
//! orchestrator. Values are opaque strings (serialized cache entries);
//! expiry is enforced by the cache on read, so a store may treat `ttl` as a
//! hint.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;

use crate::StoreError;

/// Minimal async key/value contract for a cache tier.
///
/// Writes must be idempotent: writing the same key twice with equivalent
/// content succeeds both times.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    /// Read a value. `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// Returns [`StoreError::QuotaExceeded`] when the store is full.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently held (expired or not).
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every value.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Default session-tier quota: 5 MiB, the usual browser session-storage size.
pub const DEFAULT_SESSION_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Clone)]
struct StoredValue {
    data: Arc<str>,
    ttl: Duration,
}

/// Per-entry time-to-live taken from the write.
struct WriteTtl;

impl Expiry<String, StoredValue> for WriteTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

fn weight(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// In-process session tier with a byte quota.
///
/// Backed by moka with per-entry expiry. Unlike a plain LRU it never evicts
/// to make room: a write that would push the total size of keys and values
/// past the quota fails with [`StoreError::QuotaExceeded`], mirroring
/// browser session storage. Lives as long as the process.
pub struct EphemeralStore {
    entries: Cache<String, StoredValue>,
    quota_bytes: u64,
    /// Serializes the quota check with the insert it guards.
    write_lock: Mutex<()>,
}

impl EphemeralStore {
    /// Create a store with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_SESSION_QUOTA_BYTES)
    }

    /// Create a store holding at most `quota_bytes` of keys plus values.
    pub fn with_quota(quota_bytes: u64) -> Self {
        let entries = Cache::builder()
            .weigher(|k: &String, v: &StoredValue| {
                u32::try_from(weight(k, &v.data)).unwrap_or(u32::MAX)
            })
            .expire_after(WriteTtl)
            .build();
        Self {
            entries,
            quota_bytes,
            write_lock: Mutex::new(()),
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.weighted_size()
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for EphemeralStore {
    fn name(&self) -> &str {
        "ephemeral"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.data.to_string()))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let incoming = weight(key, &value);
        let replaced = self
            .entries
            .get(key)
            .map(|v| weight(key, &v.data))
            .unwrap_or(0);
        let used = self.used_bytes().saturating_sub(replaced);
        if used + incoming > self.quota_bytes {
            return Err(StoreError::QuotaExceeded);
        }
        self.entries.insert(
            key.to_owned(),
            StoredValue {
                data: Arc::from(value),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.invalidate(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.iter().map(|(k, _)| k.as_ref().clone()).collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn put_then_get() {
        let store = EphemeralStore::new();
        store.put("k", "v".into(), HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn repeated_put_is_idempotent() {
        let store = EphemeralStore::with_quota(64);
        store.put("k", "same".into(), HOUR).await.unwrap();
        store.put("k", "same".into(), HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("same"));
    }

    #[tokio::test]
    async fn oversized_write_exceeds_quota() {
        let store = EphemeralStore::with_quota(10);
        let err = store.put("k", "x".repeat(100), HOUR).await.unwrap_err();
        assert_eq!(err, StoreError::QuotaExceeded);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_respect_quota() {
        // Each write weighs 3 + 10 bytes, so exactly four fit in 64.
        let store = Arc::new(EphemeralStore::with_quota(64));
        let writes = (0..16).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put(&format!("k{i:02}"), "x".repeat(10), HOUR).await })
        });
        let results = futures_util::future::join_all(writes).await;
        let accepted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(()))))
            .count();
        assert_eq!(accepted, 4);
        assert!(store.used_bytes() <= store.quota_bytes());
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = EphemeralStore::new();
        store.put("a", "1".into(), HOUR).await.unwrap();
        store.put("b", "2".into(), HOUR).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.delete("never-written").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), None);
    }
}
