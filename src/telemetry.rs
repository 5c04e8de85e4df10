//! Telemetry metric name constants.
//!
//! Centralised metric names for skald operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `skald_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `kind`: artifact kind: "narrative" or "content"
//! - `container`: container type (e.g. "learn", "practice")
//! - `tier`: cache tier: "memory", "session" or "persistent"
//! - `status`: outcome: "ok" or "error"

/// Total generation calls issued to a generator.
///
/// Labels: `generator`, `kind`, `status` ("ok" | "error").
pub const GENERATIONS_TOTAL: &str = "skald_generations_total";

/// Generation call duration in seconds.
///
/// Labels: `generator`, `kind`.
pub const GENERATION_DURATION_SECONDS: &str = "skald_generation_duration_seconds";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `generator`, `kind`.
pub const RETRIES_TOTAL: &str = "skald_retries_total";

/// Total placeholder artifacts served in place of a failed generation.
///
/// Labels: `kind`.
pub const FALLBACKS_TOTAL: &str = "skald_fallbacks_total";

/// Total cache hits.
///
/// Labels: `tier`, `kind`.
pub const CACHE_HITS_TOTAL: &str = "skald_cache_hits_total";

/// Total cache misses (no live entry in any tier).
///
/// Labels: `kind`.
pub const CACHE_MISSES_TOTAL: &str = "skald_cache_misses_total";

/// Total memory-tier evictions.
pub const CACHE_EVICTIONS_TOTAL: &str = "skald_cache_evictions_total";

/// Total promotions of a slower-tier hit into faster tiers.
///
/// Labels: `from` (tier the entry was found in).
pub const CACHE_PROMOTIONS_TOTAL: &str = "skald_cache_promotions_total";

/// Total session/persistent tier failures absorbed by the cache.
///
/// Labels: `tier`, `op` ("read" | "write" | "delete" | "decode" | "sweep" | "clear").
pub const STORE_ERRORS_TOTAL: &str = "skald_store_errors_total";

/// Total journey batches completed.
///
/// Labels: `status` ("ok" | "partial" | "failed").
pub const BATCHES_TOTAL: &str = "skald_batches_total";

/// Generation spend per batch.
pub const BATCH_COST: &str = "skald_batch_cost";

/// Savings per batch relative to the uncached baseline.
pub const BATCH_SAVINGS: &str = "skald_batch_savings";

/// Batch duration in seconds.
pub const BATCH_DURATION_SECONDS: &str = "skald_batch_duration_seconds";
