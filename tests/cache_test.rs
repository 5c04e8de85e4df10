use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use skald::{
    ArtifactMeta, CacheConfig, CacheKey, CacheStore, CachedArtifact, ContainerContent,
    ContainerType, ContentKey, ContentSpec, EphemeralStore, EvictionPolicy, FileStore, KvStore,
    ManualClock, Narrative, NarrativeKey, NarrativeSpec, PlaceholderGenerator, SkaldError,
    StoreError, Tier,
};

const HOUR: Duration = Duration::from_secs(3600);

// ============================================================================
// Fixtures
// ============================================================================

fn narrative(learner: &str) -> Narrative {
    let spec = NarrativeSpec::new(learner, "3", "finn", "vet", ["math"]).unwrap();
    let mut n = PlaceholderGenerator::new().narrative(&spec, "fixture");
    n.meta = ArtifactMeta::live(0.02, None, Utc::now());
    n
}

fn content(learner: &str, container: ContainerType) -> ContainerContent {
    let n = narrative(learner);
    let spec = ContentSpec::new(learner, "3", "finn", "vet", "math", "math.3.add", container)
        .unwrap();
    let mut c = PlaceholderGenerator::new().content(&spec, &n, "fixture");
    c.meta = ArtifactMeta::live(0.005, None, Utc::now());
    c
}

fn narrative_key(n: &Narrative) -> CacheKey {
    CacheKey::Narrative(n.key.clone())
}

// ============================================================================
// Mock stores
// ============================================================================

/// Session store that rejects the first `rejections` writes with
/// `QuotaExceeded`, counting writes and sweeps.
struct QuotaStore {
    inner: EphemeralStore,
    rejections: AtomicU32,
    puts: AtomicU32,
    sweeps: AtomicU32,
}

impl QuotaStore {
    fn new(rejections: u32) -> Self {
        Self {
            inner: EphemeralStore::new(),
            rejections: AtomicU32::new(rejections),
            puts: AtomicU32::new(0),
            sweeps: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl KvStore for QuotaStore {
    fn name(&self) -> &str {
        "quota"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::QuotaExceeded);
        }
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        self.inner.keys().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

/// Store where every operation fails.
struct DownStore;

#[async_trait]
impl KvStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Session store whose reads pause after fetching, until released.
struct GatedStore {
    inner: EphemeralStore,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: EphemeralStore::new(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl KvStore for GatedStore {
    fn name(&self) -> &str {
        "gated"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.inner.get(key).await;
        self.entered.notify_one();
        self.release.notified().await;
        value
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

// ============================================================================
// Put / get
// ============================================================================

#[tokio::test]
async fn put_then_get_returns_same_artifact() {
    let cache = CacheStore::new(CacheConfig::default()).unwrap();
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();

    let entry = cache.get(&narrative_key(&n)).await.unwrap();
    assert_eq!(entry.tier, Tier::Memory);
    assert_eq!(entry.payload, CachedArtifact::Narrative(n.clone()));
    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
}

#[tokio::test]
async fn miss_on_unknown_key() {
    let cache = CacheStore::new(CacheConfig::default()).unwrap();
    let c = content("L1", ContainerType::Practice);
    assert!(cache.get_content(&c.key).await.is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn narrative_and_content_keys_never_collide() {
    let cache = CacheStore::new(CacheConfig::default()).unwrap();
    let n = narrative("L1");
    let c = content("L1", ContainerType::Instructional);
    cache.put_narrative(&n).await.unwrap();
    cache.put_content(&c).await.unwrap();

    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
    assert_eq!(cache.get_content(&c.key).await, Some(c));
}

#[tokio::test]
async fn put_rejects_payload_of_wrong_kind() {
    let cache = CacheStore::new(CacheConfig::default()).unwrap();
    let n = narrative("L1");
    let c = content("L1", ContainerType::Practice);
    let err = cache
        .put(CacheKey::Narrative(n.key.clone()), CachedArtifact::Content(c), HOUR)
        .await
        .unwrap_err();
    assert!(matches!(err, SkaldError::InvalidInput(_)));
}

#[tokio::test]
async fn put_rejects_zero_ttl() {
    let cache = CacheStore::new(CacheConfig::default()).unwrap();
    let n = narrative("L1");
    let err = cache
        .put(narrative_key(&n), CachedArtifact::Narrative(n), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SkaldError::InvalidInput(_)));
}

#[test]
fn invalid_config_is_rejected() {
    assert!(CacheStore::new(CacheConfig::new().memory_capacity(0)).is_err());
    assert!(
        CacheStore::new(
            CacheConfig::new()
                .narrative_ttl(HOUR)
                .content_ttl(HOUR * 2)
        )
        .is_err()
    );
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn expired_entry_is_a_miss_while_still_present() {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .without_session()
        .with_clock(clock.clone());
    let n = narrative("L1");
    let key = narrative_key(&n);
    cache
        .put(key.clone(), CachedArtifact::Narrative(n), HOUR)
        .await
        .unwrap();

    clock.advance(HOUR - Duration::from_secs(1));
    assert!(cache.get(&key).await.is_some());

    clock.advance(Duration::from_secs(1));
    // Physically present but past its deadline.
    assert!(cache.in_memory(&key));
    assert!(cache.get(&key).await.is_none());
    // Dropped lazily on the read that saw it expired.
    assert!(!cache.in_memory(&key));
}

#[tokio::test]
async fn content_expires_before_its_narrative() {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .without_session()
        .with_clock(clock.clone());
    let n = narrative("L1");
    let c = content("L1", ContainerType::Experience);
    cache.put_narrative(&n).await.unwrap();
    cache.put_content(&c).await.unwrap();

    clock.advance(Duration::from_secs(8 * 24 * 3600));
    assert!(cache.get_content(&c.key).await.is_none());
    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
}

#[tokio::test]
async fn sweep_removes_only_expired_entries() {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_clock(clock.clone());
    let n = narrative("L1");
    let short = narrative("L2");
    cache
        .put(narrative_key(&n), CachedArtifact::Narrative(n.clone()), HOUR * 2)
        .await
        .unwrap();
    cache
        .put(narrative_key(&short), CachedArtifact::Narrative(short.clone()), HOUR)
        .await
        .unwrap();

    clock.advance(HOUR + Duration::from_secs(1));
    // One from memory, one from the session tier.
    assert_eq!(cache.sweep_expired().await, 2);
    assert!(!cache.in_memory(&narrative_key(&short)));
    assert!(cache.in_memory(&narrative_key(&n)));
}

// ============================================================================
// Promotion
// ============================================================================

#[tokio::test]
async fn persistent_hit_is_promoted_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let persistent: Arc<dyn KvStore> = Arc::new(FileStore::new(dir.path()));
    let n = narrative("L1");
    let key = narrative_key(&n);

    let writer = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_persistent(Arc::clone(&persistent));
    writer.put_narrative(&n).await.unwrap();
    writer.flush().await;

    // A fresh process: empty memory and session tiers.
    let reader = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_persistent(persistent);
    assert!(!reader.in_memory(&key));

    let first = reader.get(&key).await.unwrap();
    assert_eq!(first.tier, Tier::Persistent);
    assert!(reader.in_memory(&key));

    let second = reader.get(&key).await.unwrap();
    assert_eq!(second.tier, Tier::Memory);
    assert_eq!(second.payload, CachedArtifact::Narrative(n));

    let stats = reader.stats();
    assert_eq!(stats.persistent_hits, 1);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.promotions, 1);
}

#[tokio::test]
async fn persistent_hit_is_promoted_to_session() {
    let persistent: Arc<dyn KvStore> = Arc::new(EphemeralStore::new());
    let session = Arc::new(EphemeralStore::new());
    let n = narrative("L1");
    let key = narrative_key(&n);

    let writer = CacheStore::new(CacheConfig::default())
        .unwrap()
        .without_session()
        .with_persistent(Arc::clone(&persistent));
    writer.put_narrative(&n).await.unwrap();
    writer.flush().await;

    let reader = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(session.clone())
        .with_persistent(persistent);
    assert_eq!(reader.get(&key).await.unwrap().tier, Tier::Persistent);
    assert!(session.get(key.as_str()).await.unwrap().is_some());
}

#[tokio::test]
async fn session_hit_after_memory_eviction() {
    let cache = CacheStore::new(CacheConfig::new().memory_capacity(1)).unwrap();
    let a = narrative("A");
    let b = narrative("B");
    cache.put_narrative(&a).await.unwrap();
    cache.put_narrative(&b).await.unwrap();
    assert!(!cache.in_memory(&narrative_key(&a)));

    let entry = cache.get(&narrative_key(&a)).await.unwrap();
    assert_eq!(entry.tier, Tier::Session);
    assert!(cache.in_memory(&narrative_key(&a)));
}

#[tokio::test]
async fn promotion_never_replaces_a_newer_write() {
    let session = Arc::new(GatedStore::new());
    let cache = Arc::new(
        CacheStore::new(CacheConfig::new().memory_capacity(1))
            .unwrap()
            .with_session(session.clone()),
    );
    let old = narrative("L1");
    let key = narrative_key(&old);
    cache.put_narrative(&old).await.unwrap();
    cache.put_narrative(&narrative("L2")).await.unwrap();
    assert!(!cache.in_memory(&key));

    // Read the old copy from the session tier, then write a newer one
    // before the read gets to promote it.
    let reader = {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        tokio::spawn(async move { cache.get(&key).await })
    };
    session.entered.notified().await;
    let mut newer = old.clone();
    newer.body.mission = "newer mission".into();
    cache.put_narrative(&newer).await.unwrap();
    session.release.notify_one();

    let stale = reader.await.unwrap().unwrap();
    assert_eq!(stale.tier, Tier::Session);
    assert_eq!(stale.payload, CachedArtifact::Narrative(old.clone()));

    let current = cache.get_narrative(&old.key).await.unwrap();
    assert_eq!(current.body.mission, "newer mission");
    assert_eq!(cache.stats().promotions, 0);
}

// ============================================================================
// Eviction
// ============================================================================

#[tokio::test]
async fn capacity_plus_one_evicts_exactly_the_earliest() {
    let cache = CacheStore::new(CacheConfig::new().memory_capacity(3))
        .unwrap()
        .without_session();
    let narratives: Vec<_> = ["A", "B", "C", "D"].iter().map(|l| narrative(l)).collect();
    for n in &narratives[..3] {
        cache.put_narrative(n).await.unwrap();
    }
    // Reads do not change FIFO order.
    assert!(cache.get(&narrative_key(&narratives[0])).await.is_some());
    cache.put_narrative(&narratives[3]).await.unwrap();

    assert!(!cache.in_memory(&narrative_key(&narratives[0])));
    for n in &narratives[1..] {
        assert!(cache.in_memory(&narrative_key(n)));
    }
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.memory_entries, 3);
}

#[tokio::test]
async fn lru_policy_keeps_recently_read_entries() {
    let cache = CacheStore::new(
        CacheConfig::new()
            .memory_capacity(2)
            .eviction(EvictionPolicy::Lru),
    )
    .unwrap()
    .without_session();
    let a = narrative("A");
    let b = narrative("B");
    let c = narrative("C");
    cache.put_narrative(&a).await.unwrap();
    cache.put_narrative(&b).await.unwrap();
    assert!(cache.get(&narrative_key(&a)).await.is_some());
    cache.put_narrative(&c).await.unwrap();

    assert!(cache.in_memory(&narrative_key(&a)));
    assert!(!cache.in_memory(&narrative_key(&b)));
}

// ============================================================================
// Session quota
// ============================================================================

#[tokio::test]
async fn quota_exceeded_sweeps_then_retries_once() {
    let session = Arc::new(QuotaStore::new(1));
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(session.clone());
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();

    assert_eq!(session.puts.load(Ordering::SeqCst), 2);
    assert_eq!(session.sweeps.load(Ordering::SeqCst), 1);
    assert!(session.get(n.key.as_str()).await.unwrap().is_some());
    assert_eq!(cache.stats().dropped_writes, 0);
}

#[tokio::test]
async fn second_quota_failure_drops_write_but_keeps_memory() {
    let session = Arc::new(QuotaStore::new(2));
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(session.clone());
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();

    assert_eq!(session.puts.load(Ordering::SeqCst), 2);
    assert!(session.get(n.key.as_str()).await.unwrap().is_none());
    assert_eq!(cache.stats().dropped_writes, 1);
    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
}

#[tokio::test]
async fn real_quota_overflow_degrades_to_memory() {
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(Arc::new(EphemeralStore::with_quota(64)));
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();
    assert_eq!(cache.stats().dropped_writes, 1);
    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
}

// ============================================================================
// Degraded tiers
// ============================================================================

#[tokio::test]
async fn failing_persistent_tier_never_reaches_caller() {
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .without_session()
        .with_persistent(Arc::new(DownStore));
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();
    cache.flush().await;

    assert_eq!(cache.get_narrative(&n.key).await, Some(n));
    let other = NarrativeKey::derive(&NarrativeSpec::new("L2", "3", "finn", "vet", ["math"]).unwrap());
    assert!(cache.get_narrative(&other).await.is_none());

    // One failed background write, one failed read.
    assert_eq!(cache.stats().store_errors, 2);
}

#[tokio::test]
async fn failing_session_tier_degrades_to_memory() {
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(Arc::new(DownStore));
    let c = content("L1", ContainerType::Discover);
    cache.put_content(&c).await.unwrap();
    assert_eq!(cache.get_content(&c.key).await, Some(c));
}

#[tokio::test]
async fn corrupt_persistent_entry_is_a_miss_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let spec = ContentSpec::new(
        "L1",
        "3",
        "finn",
        "vet",
        "math",
        "math.3.add",
        ContainerType::Practice,
    )
    .unwrap();
    let key = ContentKey::derive(&spec);
    store
        .put(key.as_str(), "{not json".to_string(), HOUR)
        .await
        .unwrap();

    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_persistent(store.clone());
    assert!(cache.get_content(&key).await.is_none());
    assert!(store.get(key.as_str()).await.unwrap().is_none());
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn invalidate_removes_from_every_tier() {
    let session = Arc::new(EphemeralStore::new());
    let persistent = Arc::new(EphemeralStore::new());
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_session(session.clone())
        .with_persistent(persistent.clone());
    let n = narrative("L1");
    cache.put_narrative(&n).await.unwrap();
    cache.flush().await;

    cache.invalidate(&narrative_key(&n)).await;
    assert!(!cache.in_memory(&narrative_key(&n)));
    assert!(session.get(n.key.as_str()).await.unwrap().is_none());
    assert!(persistent.get(n.key.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn clear_empties_all_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(CacheConfig::default())
        .unwrap()
        .with_persistent(Arc::new(FileStore::new(dir.path())));
    let n = narrative("L1");
    let c = content("L1", ContainerType::Instructional);
    cache.put_narrative(&n).await.unwrap();
    cache.put_content(&c).await.unwrap();

    cache.clear().await;
    assert_eq!(cache.stats().memory_entries, 0);
    assert!(cache.get_narrative(&n.key).await.is_none());
    assert!(cache.get_content(&c.key).await.is_none());
}
