//! Capacity-bounded in-process tier.
//!
//! Holds at most `capacity` entries. Inserting a new key into a full tier
//! evicts exactly one entry: the oldest inserted under
//! [`EvictionPolicy::Fifo`], the least recently read or written under
//! [`EvictionPolicy::Lru`]. Overwriting an existing key never evicts.
//!
//! Not synchronized on its own; [`CacheStore`](super::CacheStore) wraps it
//! in a mutex that is never held across an await point.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Deserialize;

use super::CacheEntry;

/// Memory-tier eviction order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict the earliest-inserted entry. Reads do not affect order.
    #[default]
    Fifo,
    /// Evict the least recently used entry. Reads move an entry to the back.
    Lru,
}

/// Both policies share one [`LruCache`]. Under FIFO, reads use `peek` and
/// overwrites use `peek_mut`, so recency only ever reflects insertion.
pub(crate) struct MemoryTier {
    policy: EvictionPolicy,
    entries: LruCache<String, CacheEntry>,
}

impl MemoryTier {
    pub(crate) fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            policy,
            entries: LruCache::new(capacity),
        }
    }

    /// Look up an entry, regardless of expiry.
    pub(crate) fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        match self.policy {
            EvictionPolicy::Fifo => self.entries.peek(key),
            EvictionPolicy::Lru => self.entries.get(key),
        }
    }

    /// Insert or overwrite. Returns the evicted entry, if any.
    pub(crate) fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        if self.policy == EvictionPolicy::Fifo
            && let Some(slot) = self.entries.peek_mut(entry.key.as_str())
        {
            *slot = entry;
            return None;
        }

        let key = entry.key.as_str().to_owned();
        let (old_key, old) = self.entries.push(key, entry)?;
        // `push` also hands back the previous value of an overwritten key.
        (!self.entries.contains(&old_key)).then_some(old)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    /// Drop every entry expired at `now`. Returns how many were dropped.
    pub(crate) fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }
}
