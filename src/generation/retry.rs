//! Retry configuration, delay calculation, and generator decorators.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and
//! `Retrying*Generator` decorators that wrap the generator traits with
//! automatic retry on transient errors.
//!
//! Both decorators delegate to the shared `with_retry()` helper, keeping
//! retry logic in a single place. Retrying is safe because generators are
//! idempotent with respect to their input.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::traits::{ContentGenerator, NarrativeGenerator};
use crate::telemetry;
use crate::types::{ContainerContent, ContentSpec, Narrative, NarrativeSpec};
use crate::GenerationResult;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff without jitter:
///
/// ```rust
/// # use skald::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial call).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    #[serde(rename = "initial_delay_ms", deserialize_with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    #[serde(rename = "max_delay_ms", deserialize_with = "millis")]
    pub max_delay: Duration,
}

fn millis<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial call).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, respecting backend `retry_after` hints.
    ///
    /// If a `retry_after` duration is provided (from a `RateLimited` error),
    /// it takes precedence over the calculated backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

// ============================================================================
// Shared retry helper
// ============================================================================

/// Execute an async generation with retry logic.
///
/// Retries on transient errors (as classified by
/// [`GenerationError::is_transient()`](crate::GenerationError::is_transient))
/// up to `config.max_attempts`, using exponential backoff and respecting
/// `retry_after` hints.
///
/// Permanent errors are returned immediately without retry.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    generator: &str,
    kind: &'static str,
    f: F,
) -> GenerationResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = GenerationResult<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e), // permanent error, no retry
        };
        attempt += 1;
        if attempt >= attempts {
            return Err(err);
        }

        metrics::counter!(telemetry::RETRIES_TOTAL,
            "generator" => generator.to_owned(),
            "kind" => kind,
        )
        .increment(1);
        let delay = config.effective_delay(attempt - 1, err.retry_after());
        warn!(
            generator,
            kind,
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}

// ============================================================================
// RetryingNarrativeGenerator
// ============================================================================

/// Decorator that wraps a [`NarrativeGenerator`] with retry logic.
///
/// On transient errors, retries with exponential backoff up to
/// `config.max_attempts`. Schema, authentication and other permanent errors
/// are returned immediately.
pub struct RetryingNarrativeGenerator {
    inner: Arc<dyn NarrativeGenerator>,
    config: RetryConfig,
}

impl RetryingNarrativeGenerator {
    /// Wrap a narrative generator with retry logic.
    pub fn new(inner: Arc<dyn NarrativeGenerator>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl NarrativeGenerator for RetryingNarrativeGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        with_retry(&self.config, self.inner.name(), "narrative", || {
            self.inner.generate_narrative(spec)
        })
        .await
    }
}

// ============================================================================
// RetryingContentGenerator
// ============================================================================

/// Decorator that wraps a [`ContentGenerator`] with retry logic.
///
/// Same semantics as [`RetryingNarrativeGenerator`].
pub struct RetryingContentGenerator {
    inner: Arc<dyn ContentGenerator>,
    config: RetryConfig,
}

impl RetryingContentGenerator {
    /// Wrap a content generator with retry logic.
    pub fn new(inner: Arc<dyn ContentGenerator>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ContentGenerator for RetryingContentGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        with_retry(&self.config, self.inner.name(), "content", || {
            self.inner.generate_content(spec, narrative)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationError;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(350));
    }

    #[test]
    fn retry_after_takes_precedence() {
        let config = RetryConfig::new();
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn deserializes_millis() {
        let config: RetryConfig =
            toml::from_str("max_attempts = 4\ninitial_delay_ms = 250").unwrap();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: GenerationResult<()> =
            with_retry(&RetryConfig::new().max_attempts(0), "g", "narrative", || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(GenerationError::Http("down".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
