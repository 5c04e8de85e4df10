//! Three-tier artifact cache.
//!
//! [`CacheStore`] keeps narratives and container content in three tiers,
//! fastest first:
//!
//! - **memory**: capacity-bounded map inside the process
//!   ([`EvictionPolicy`], FIFO by default). Serialized behind a mutex that is
//!   never held across an await point.
//! - **session**: a [`KvStore`], by default an [`EphemeralStore`] with a
//!   byte quota. Written synchronously on every put.
//! - **persistent**: an optional [`KvStore`] such as [`FileStore`]. Written
//!   fire-and-forget; reads and writes are best-effort.
//!
//! # Reads
//!
//! Tiers are checked in order. A hit in a slower tier is promoted into every
//! faster tier before it is returned, so the next read for the same key is
//! served from memory. An entry is only a hit while `now < expires_at`;
//! expired entries are treated as absent and deleted lazily when seen.
//!
//! # Failures
//!
//! Session and persistent failures never reach the caller. They are logged,
//! counted, and degrade to a miss (reads) or a dropped write. A session write
//! rejected with [`StoreError::QuotaExceeded`](crate::StoreError::QuotaExceeded)
//! triggers one sweep of expired session entries and a single retry.

mod entry;
mod file;
mod key;
mod memory;
mod store;

pub use entry::{CacheEntry, CachedArtifact, Tier};
pub use file::FileStore;
pub use key::{CacheKey, ContentKey, NarrativeKey};
pub use memory::EvictionPolicy;
pub use store::{DEFAULT_SESSION_QUOTA_BYTES, EphemeralStore, KvStore};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::{self, Clock, SystemClock};
use crate::error::kind_mismatch;
use crate::telemetry;
use crate::types::{ArtifactKind, ContainerContent, Narrative};
use crate::{Result, SkaldError, StoreError};

use memory::MemoryTier;

const DAY: u64 = 24 * 3600;

/// Configuration for [`CacheStore`].
///
/// ```rust
/// # use skald::{CacheConfig, EvictionPolicy};
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .memory_capacity(500)
///     .content_ttl(Duration::from_secs(3 * 24 * 3600))
///     .eviction(EvictionPolicy::Lru);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum entries in the memory tier. Default: 100.
    pub memory_capacity: usize,
    /// Lifetime of a cached narrative. Default: 30 days.
    pub narrative_ttl: Duration,
    /// Lifetime of cached container content. Default: 7 days.
    pub content_ttl: Duration,
    /// Memory-tier eviction order. Default: FIFO.
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 100,
            narrative_ttl: Duration::from_secs(30 * DAY),
            content_ttl: Duration::from_secs(7 * DAY),
            eviction: EvictionPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory-tier capacity.
    pub fn memory_capacity(mut self, n: usize) -> Self {
        self.memory_capacity = n;
        self
    }

    /// Set the narrative time-to-live.
    pub fn narrative_ttl(mut self, ttl: Duration) -> Self {
        self.narrative_ttl = ttl;
        self
    }

    /// Set the container content time-to-live.
    pub fn content_ttl(mut self, ttl: Duration) -> Self {
        self.content_ttl = ttl;
        self
    }

    /// Set the memory-tier eviction policy.
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// TTL for artifacts of `kind`.
    pub fn ttl_for(&self, kind: ArtifactKind) -> Duration {
        match kind {
            ArtifactKind::Narrative => self.narrative_ttl,
            ArtifactKind::Content => self.content_ttl,
        }
    }

    /// Capacity must be non-zero and narratives must outlive content.
    pub fn validate(&self) -> Result<()> {
        if self.memory_capacity == 0 {
            return Err(SkaldError::Configuration(
                "cache.memory_capacity must be at least 1".into(),
            ));
        }
        if self.content_ttl.is_zero() {
            return Err(SkaldError::Configuration(
                "cache.content_ttl must be positive".into(),
            ));
        }
        if self.narrative_ttl <= self.content_ttl {
            return Err(SkaldError::Configuration(format!(
                "cache.narrative_ttl ({:?}) must be longer than cache.content_ttl ({:?})",
                self.narrative_ttl, self.content_ttl
            )));
        }
        Ok(())
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_hits: u64,
    pub session_hits: u64,
    pub persistent_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub promotions: u64,
    pub store_errors: u64,
    /// Session writes dropped after the quota retry failed.
    pub dropped_writes: u64,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    session_hits: AtomicU64,
    persistent_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    promotions: AtomicU64,
    store_errors: AtomicU64,
    dropped_writes: AtomicU64,
}

impl Counters {
    fn hit(&self, tier: Tier) -> &AtomicU64 {
        match tier {
            Tier::Memory => &self.memory_hits,
            Tier::Session => &self.session_hits,
            Tier::Persistent => &self.persistent_hits,
        }
    }
}

/// Three-tier cache for narratives and container content.
///
/// Construct one per hosting application and share it by `Arc`; there is no
/// global instance.
pub struct CacheStore {
    config: CacheConfig,
    memory: Mutex<MemoryTier>,
    session: Option<Arc<dyn KvStore>>,
    persistent: Option<Arc<dyn KvStore>>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheStore {
    /// Create a cache with a memory tier and an [`EphemeralStore`] session
    /// tier. Add a persistent tier with [`with_persistent`](Self::with_persistent).
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memory: Mutex::new(MemoryTier::new(config.memory_capacity, config.eviction)),
            config,
            session: Some(Arc::new(EphemeralStore::new())),
            persistent: None,
            clock: Arc::new(SystemClock),
            counters: Arc::default(),
            pending_writes: Mutex::new(Vec::new()),
        })
    }

    /// Replace the session tier store.
    pub fn with_session(mut self, store: Arc<dyn KvStore>) -> Self {
        self.session = Some(store);
        self
    }

    /// Run without a session tier.
    pub fn without_session(mut self) -> Self {
        self.session = None;
        self
    }

    /// Add a persistent tier.
    pub fn with_persistent(mut self, store: Arc<dyn KvStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up a live entry, checking memory, session, then persistent.
    ///
    /// A session or persistent hit is copied into every faster tier before
    /// it is returned. The returned entry's `tier` names the tier it was
    /// found in.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let kind = key.kind().as_str();
        let now = self.clock.now();

        let cached = {
            let mut memory = self.memory();
            let found = memory.get(key.as_str()).cloned();
            if let Some(entry) = &found
                && !entry.is_live(now)
            {
                memory.remove(key.as_str());
            }
            found
        };
        match cached {
            Some(entry) if entry.is_live(now) => {
                self.record_hit(Tier::Memory, kind);
                return Some(entry.found_in(Tier::Memory));
            }
            Some(_) => debug!(key = %key, tier = "memory", "dropped expired entry"),
            None => {}
        }

        for (tier, store) in self.slow_tiers() {
            let Some(entry) = self.read_tier(tier, store, key).await else {
                continue;
            };
            if !entry.is_live(now) {
                self.delete_from(tier, store, key.as_str()).await;
                debug!(key = %key, tier = tier.as_str(), "dropped expired entry");
                continue;
            }
            self.promote(&entry, tier).await;
            self.record_hit(tier, kind);
            return Some(entry.found_in(tier));
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "kind" => kind).increment(1);
        None
    }

    /// Typed lookup for a narrative.
    pub async fn get_narrative(&self, key: &NarrativeKey) -> Option<Narrative> {
        self.get(&CacheKey::Narrative(key.clone()))
            .await
            .and_then(|e| e.payload.into_narrative())
    }

    /// Typed lookup for container content.
    pub async fn get_content(&self, key: &ContentKey) -> Option<ContainerContent> {
        self.get(&CacheKey::Content(key.clone()))
            .await
            .and_then(|e| e.payload.into_content())
    }

    /// Whether `key` is physically present in the memory tier, live or not.
    pub fn in_memory(&self, key: &CacheKey) -> bool {
        self.memory().contains(key.as_str())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store `payload` under `key` for `ttl`.
    ///
    /// Memory and session writes complete before this returns; the
    /// persistent write runs in the background (see [`flush`](Self::flush)).
    /// Fails only on caller mistakes: a payload of the wrong kind for the
    /// key, or a zero TTL.
    pub async fn put(&self, key: CacheKey, payload: CachedArtifact, ttl: Duration) -> Result<()> {
        if key.kind() != payload.kind() {
            return Err(kind_mismatch(key.kind(), payload.kind()));
        }
        if ttl.is_zero() {
            return Err(SkaldError::InvalidInput("cache ttl must be positive".into()));
        }
        let now = self.clock.now();
        let entry = CacheEntry {
            key,
            payload,
            tier: Tier::Memory,
            created_at: now,
            expires_at: clock::add_duration(now, ttl),
        };
        let encoded = serde_json::to_string(&entry)?;

        self.insert_memory(entry.clone());
        if let Some(session) = &self.session {
            self.write_session(session, entry.key.as_str(), encoded.clone(), ttl)
                .await;
        }
        if let Some(persistent) = &self.persistent {
            self.write_persistent(persistent, entry.key.as_str(), encoded, ttl);
        }
        Ok(())
    }

    /// Cache a narrative for the configured narrative TTL.
    pub async fn put_narrative(&self, narrative: &Narrative) -> Result<()> {
        self.put(
            CacheKey::Narrative(narrative.key.clone()),
            CachedArtifact::Narrative(narrative.clone()),
            self.config.narrative_ttl,
        )
        .await
    }

    /// Cache container content for the configured content TTL.
    pub async fn put_content(&self, content: &ContainerContent) -> Result<()> {
        self.put(
            CacheKey::Content(content.key.clone()),
            CachedArtifact::Content(content.clone()),
            self.config.content_ttl,
        )
        .await
    }

    /// Wait for background persistent writes issued so far.
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending());
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Remove `key` from every tier.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.memory().remove(key.as_str());
        for (tier, store) in self.slow_tiers() {
            self.delete_from(tier, store, key.as_str()).await;
        }
    }

    /// Remove every entry from every tier.
    pub async fn clear(&self) {
        self.flush().await;
        self.memory().clear();
        for (tier, store) in self.slow_tiers() {
            if let Err(e) = store.clear().await {
                self.store_error(tier, "clear", &e);
            }
        }
    }

    /// Delete expired entries from all tiers. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = self.memory().prune_expired(now);
        for (tier, store) in self.slow_tiers() {
            removed += self.sweep_store(tier, store).await;
        }
        removed
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            memory_entries: self.memory().len(),
            memory_hits: c.memory_hits.load(Ordering::Relaxed),
            session_hits: c.session_hits.load(Ordering::Relaxed),
            persistent_hits: c.persistent_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            promotions: c.promotions.load(Ordering::Relaxed),
            store_errors: c.store_errors.load(Ordering::Relaxed),
            dropped_writes: c.dropped_writes.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Tier helpers
    // ========================================================================

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending_writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slow_tiers(&self) -> impl Iterator<Item = (Tier, &Arc<dyn KvStore>)> {
        [
            (Tier::Session, self.session.as_ref()),
            (Tier::Persistent, self.persistent.as_ref()),
        ]
        .into_iter()
        .filter_map(|(tier, store)| store.map(|s| (tier, s)))
    }

    fn insert_memory(&self, entry: CacheEntry) {
        let evicted = self.memory().insert(entry);
        self.note_eviction(evicted);
    }

    /// Insert unless the key is already held, so a `put` racing a slow-tier
    /// read is never replaced by the older promoted copy.
    fn promote_to_memory(&self, entry: CacheEntry) -> bool {
        let evicted = {
            let mut memory = self.memory();
            if memory.contains(entry.key.as_str()) {
                return false;
            }
            memory.insert(entry)
        };
        self.note_eviction(evicted);
        true
    }

    fn note_eviction(&self, evicted: Option<CacheEntry>) {
        if let Some(evicted) = evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            debug!(key = %evicted.key, "evicted from memory tier");
        }
    }

    async fn read_tier(
        &self,
        tier: Tier,
        store: &Arc<dyn KvStore>,
        key: &CacheKey,
    ) -> Option<CacheEntry> {
        let raw = match store.get(key.as_str()).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.store_error(tier, "read", &e);
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == *key => Some(entry),
            Ok(entry) => {
                warn!(
                    tier = tier.as_str(),
                    expected = %key,
                    found = %entry.key,
                    "stored entry key mismatch, ignoring"
                );
                None
            }
            Err(e) => {
                self.store_error(tier, "decode", &StoreError::Codec(e.to_string()));
                self.delete_from(tier, store, key.as_str()).await;
                None
            }
        }
    }

    /// Copy an entry found in `found_in` into every faster tier.
    async fn promote(&self, entry: &CacheEntry, found_in: Tier) {
        let now = self.clock.now();
        let ttl = clock::remaining(now, entry.expires_at);

        if found_in == Tier::Persistent
            && let Some(session) = &self.session
        {
            match serde_json::to_string(&entry.clone().found_in(Tier::Session)) {
                Ok(encoded) => {
                    self.write_session(session, entry.key.as_str(), encoded, ttl)
                        .await
                }
                Err(e) => warn!(key = %entry.key, error = %e, "failed to encode for promotion"),
            }
        }
        if !self.promote_to_memory(entry.clone().found_in(Tier::Memory)) {
            debug!(key = %entry.key, "newer entry already in memory, promotion skipped");
            return;
        }

        self.counters.promotions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_PROMOTIONS_TOTAL, "from" => found_in.as_str())
            .increment(1);
        debug!(key = %entry.key, from = found_in.as_str(), "promoted cache entry");
    }

    async fn write_session(&self, store: &Arc<dyn KvStore>, key: &str, value: String, ttl: Duration) {
        let err = match store.put(key, value.clone(), ttl).await {
            Ok(()) => return,
            Err(e) => e,
        };
        if err != StoreError::QuotaExceeded {
            self.store_error(Tier::Session, "write", &err);
            return;
        }

        let swept = self.sweep_store(Tier::Session, store).await;
        debug!(key, swept, "session quota exceeded, retrying after sweep");
        if let Err(e) = store.put(key, value, ttl).await {
            self.store_error(Tier::Session, "write", &e);
            self.counters.dropped_writes.fetch_add(1, Ordering::Relaxed);
            warn!(key, "dropping session write; entry kept in memory only");
        }
    }

    fn write_persistent(&self, store: &Arc<dyn KvStore>, key: &str, value: String, ttl: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key, "no tokio runtime, persistent write skipped");
            return;
        };
        let store = Arc::clone(store);
        let counters = Arc::clone(&self.counters);
        let key = key.to_owned();
        let task = runtime.spawn(async move {
            if let Err(e) = store.put(&key, value, ttl).await {
                counters.store_errors.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::STORE_ERRORS_TOTAL,
                    "tier" => Tier::Persistent.as_str(),
                    "op" => "write",
                )
                .increment(1);
                warn!(key, store = store.name(), error = %e, "persistent write failed");
            }
        });

        let mut pending = self.pending();
        pending.retain(|h| !h.is_finished());
        pending.push(task);
    }

    async fn delete_from(&self, tier: Tier, store: &Arc<dyn KvStore>, key: &str) {
        if let Err(e) = store.delete(key).await {
            self.store_error(tier, "delete", &e);
        }
    }

    /// Delete expired or undecodable entries from a slow tier.
    async fn sweep_store(&self, tier: Tier, store: &Arc<dyn KvStore>) -> usize {
        let keys = match store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                self.store_error(tier, "sweep", &e);
                return 0;
            }
        };
        let now = self.clock.now();
        let mut removed = 0;
        for key in keys {
            let stale = match store.get(&key).await {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry>(&raw)
                    .map(|e| !e.is_live(now))
                    .unwrap_or(true),
                Ok(None) => false,
                Err(e) => {
                    self.store_error(tier, "sweep", &e);
                    false
                }
            };
            if stale {
                self.delete_from(tier, store, &key).await;
                removed += 1;
            }
        }
        removed
    }

    fn record_hit(&self, tier: Tier, kind: &'static str) {
        self.counters.hit(tier).fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => tier.as_str(), "kind" => kind)
            .increment(1);
    }

    fn store_error(&self, tier: Tier, op: &'static str, err: &StoreError) {
        self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::STORE_ERRORS_TOTAL, "tier" => tier.as_str(), "op" => op)
            .increment(1);
        warn!(tier = tier.as_str(), op, error = %err, "cache tier error, degrading");
    }
}
