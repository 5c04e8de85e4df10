//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::{DEFAULT_MAX_CONCURRENCY, Orchestrator};
use crate::cache::{CacheConfig, CacheStore, EphemeralStore, FileStore, KvStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::generation::{
    ContainerAdapter, ContentGenerator, DEFAULT_GENERATION_TIMEOUT, GenerationBackend,
    GeneratorRegistry, NarrativeAdapter, NarrativeGenerator, PlaceholderGenerator, RetryConfig,
};
use crate::types::{ContainerType, Pricing};
use crate::{Result, SkaldError};

/// Builder for [`Orchestrator`].
///
/// Generators come either from a [`GenerationBackend`] (adapted for the
/// narrative and every container type) or are registered directly;
/// directly registered generators take precedence over the backend.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use skald::{Orchestrator, HttpBackend, RetryConfig};
/// # fn main() -> skald::Result<()> {
/// let orchestrator = Orchestrator::builder()
///     .backend(Arc::new(HttpBackend::new("http://localhost:8080")?))
///     .retry(RetryConfig::new())
///     .max_concurrency(8)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    cache: Option<Arc<CacheStore>>,
    cache_config: CacheConfig,
    session: Option<Option<Arc<dyn KvStore>>>,
    persistent: Option<Arc<dyn KvStore>>,
    clock: Arc<dyn Clock>,
    backend: Option<Arc<dyn GenerationBackend>>,
    narrative: Option<Arc<dyn NarrativeGenerator>>,
    content_all: Option<Arc<dyn ContentGenerator>>,
    content: Vec<(ContainerType, Arc<dyn ContentGenerator>)>,
    generation_timeout: Duration,
    retry: Option<RetryConfig>,
    fallback: bool,
    pricing: Pricing,
    max_concurrency: usize,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            cache: None,
            cache_config: CacheConfig::default(),
            session: None,
            persistent: None,
            clock: Arc::new(SystemClock),
            backend: None,
            narrative: None,
            content_all: None,
            content: Vec::new(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            retry: None,
            fallback: false,
            pricing: Pricing::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Builder pre-populated from a loaded [`Config`].
    ///
    /// Adds a [`FileStore`] persistent tier when `cache.persistent_dir` is
    /// set and an HTTP backend when `[backend]` is present.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::new()
            .cache_config(config.cache.cache_config())
            .pricing(config.pricing.clone())
            .max_concurrency(config.generation.max_concurrency)
            .generation_timeout(config.generation.timeout())
            .fallback(config.generation.fallback);

        builder = if config.cache.session {
            builder.session_store(Arc::new(EphemeralStore::with_quota(
                config.cache.session_quota_bytes,
            )))
        } else {
            builder.without_session()
        };
        if let Some(dir) = &config.cache.persistent_dir {
            builder = builder.persistent_store(Arc::new(FileStore::new(dir)));
        }
        if let Some(retry) = &config.generation.retry {
            builder = builder.retry(retry.clone());
        }
        if let Some(backend) = &config.backend {
            builder = builder.backend(http_backend(backend, config.generation.timeout())?);
        }
        Ok(builder)
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Use an existing cache. The cache-related builder settings below are
    /// then ignored.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure the cache this builder creates.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Replace the default [`EphemeralStore`] session tier.
    pub fn session_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.session = Some(Some(store));
        self
    }

    /// Run the created cache without a session tier.
    pub fn without_session(mut self) -> Self {
        self.session = Some(None);
        self
    }

    /// Add a persistent tier to the created cache.
    pub fn persistent_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Time source for the created cache, the adapters and the ledger.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generate through `backend`, adapted for narratives and every
    /// container type.
    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register the narrative generator.
    pub fn narrative_generator(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(generator);
        self
    }

    /// Register one content generator for every container type.
    pub fn content_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.content_all = Some(generator);
        self
    }

    /// Register the content generator for one container type.
    pub fn content_generator_for(
        mut self,
        container: ContainerType,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        self.content.push((container, generator));
        self
    }

    /// Timeout applied by backend adapters (default: 60s).
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Retry transient generation errors.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Serve placeholders instead of reporting generation failures.
    pub fn fallback(mut self, enabled: bool) -> Self {
        self.fallback = enabled;
        self
    }

    // ========================================================================
    // Accounting & limits
    // ========================================================================

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Maximum concurrent container generations (default: 4).
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator> {
        self.pricing.validate()?;
        if self.max_concurrency == 0 {
            return Err(SkaldError::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(SkaldError::Configuration(
                "generation timeout must be positive".into(),
            ));
        }
        if self.narrative.is_none() && self.backend.is_none() && !self.fallback {
            return Err(SkaldError::Configuration(
                "no narrative generator: set a backend, a narrative generator, or fallback mode"
                    .into(),
            ));
        }

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                let mut cache = CacheStore::new(self.cache_config)?.with_clock(Arc::clone(&self.clock));
                match self.session {
                    Some(Some(store)) => cache = cache.with_session(store),
                    Some(None) => cache = cache.without_session(),
                    None => {}
                }
                if let Some(store) = self.persistent {
                    cache = cache.with_persistent(store);
                }
                Arc::new(cache)
            }
        };

        let mut registry = GeneratorRegistry::new();
        if let Some(config) = self.retry {
            registry.set_retry_config(config);
        }
        if self.fallback {
            registry.enable_fallback(Arc::new(
                PlaceholderGenerator::new().with_clock(Arc::clone(&self.clock)),
            ));
        }

        if let Some(backend) = &self.backend {
            registry.set_narrative(Arc::new(
                NarrativeAdapter::new(Arc::clone(backend), &self.pricing)
                    .timeout(self.generation_timeout)
                    .with_clock(Arc::clone(&self.clock)),
            ));
            registry.set_content_all(Arc::new(
                ContainerAdapter::new(Arc::clone(backend), &self.pricing)
                    .timeout(self.generation_timeout)
                    .with_clock(Arc::clone(&self.clock)),
            ));
        }
        if let Some(generator) = self.narrative {
            registry.set_narrative(generator);
        }
        if let Some(generator) = self.content_all {
            registry.set_content_all(generator);
        }
        for (container, generator) in self.content {
            registry.set_content(container, generator);
        }

        Ok(Orchestrator {
            cache,
            generators: Arc::new(registry),
            pricing: self.pricing,
            limiter: Arc::new(Semaphore::new(self.max_concurrency)),
            max_concurrency: self.max_concurrency,
        })
    }
}

#[cfg(feature = "http")]
fn http_backend(
    section: &crate::config::BackendSection,
    timeout: Duration,
) -> Result<Arc<dyn GenerationBackend>> {
    let mut backend = crate::generation::HttpBackend::with_timeout(&section.url, timeout)?;
    if let Some(key) = section.api_key() {
        backend = backend.api_key(key);
    }
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "http"))]
fn http_backend(
    _section: &crate::config::BackendSection,
    _timeout: Duration,
) -> Result<Arc<dyn GenerationBackend>> {
    Err(SkaldError::Configuration(
        "[backend] requires the `http` feature".into(),
    ))
}
