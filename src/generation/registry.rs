//! Generator registry: one narrative generator plus one content generator
//! per container type.
//!
//! # Decorator wrapping
//!
//! When a [`RetryConfig`] is set, generators registered afterwards are
//! wrapped in `Retrying*Generator` decorators. When fallback mode is enabled,
//! they are additionally wrapped in `Fallback*Generator` decorators
//! (outermost), and container types with no registered generator are served
//! by the [`PlaceholderGenerator`] instead of failing with
//! [`GenerationError::Unsupported`].
//!
//! ```text
//! registry.generate_content(spec, narrative)
//!                 │ look up spec.container_type
//!                 ▼
//!     ┌───────────────────────────┐
//!     │ FallbackContentGenerator  │ ──► error: placeholder, cost 0
//!     └───────────┬───────────────┘
//!                 ▼
//!     ┌───────────────────────────┐
//!     │ RetryingContentGenerator  │ ──► transient: back off, retry
//!     └───────────┬───────────────┘
//!                 ▼
//!     ┌───────────────────────────┐
//!     │ ContainerAdapter          │ ──► timeout, schema validation
//!     └───────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::fallback::{FallbackContentGenerator, FallbackNarrativeGenerator, PlaceholderGenerator};
use super::retry::{RetryConfig, RetryingContentGenerator, RetryingNarrativeGenerator};
use super::traits::{ContentGenerator, NarrativeGenerator};
use crate::telemetry;
use crate::types::{ContainerContent, ContainerType, ContentSpec, Narrative, NarrativeSpec};
use crate::{GenerationError, GenerationResult};

/// Registry of generators keyed by artifact kind and container type.
#[derive(Default)]
pub struct GeneratorRegistry {
    narrative: Option<Arc<dyn NarrativeGenerator>>,
    content: HashMap<ContainerType, Arc<dyn ContentGenerator>>,
    retry_config: Option<RetryConfig>,
    placeholder: Option<Arc<PlaceholderGenerator>>,
}

impl GeneratorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry configuration.
    ///
    /// Generators registered after this call are wrapped in
    /// `Retrying*Generator` decorators.
    pub fn set_retry_config(&mut self, config: RetryConfig) {
        self.retry_config = Some(config);
    }

    /// Enable fallback mode.
    ///
    /// Generators registered after this call never fail: their errors are
    /// masked with placeholders from `placeholder`. Container types without
    /// a generator are served placeholders too.
    pub fn enable_fallback(&mut self, placeholder: Arc<PlaceholderGenerator>) {
        self.placeholder = Some(placeholder);
    }

    pub fn fallback_enabled(&self) -> bool {
        self.placeholder.is_some()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Set the narrative generator, replacing any previous one.
    pub fn set_narrative(&mut self, generator: Arc<dyn NarrativeGenerator>) {
        self.narrative = Some(self.wrap_narrative(generator));
    }

    /// Set the content generator for one container type.
    pub fn set_content(&mut self, container: ContainerType, generator: Arc<dyn ContentGenerator>) {
        self.content.insert(container, self.wrap_content(generator));
    }

    /// Use one content generator for every container type.
    pub fn set_content_all(&mut self, generator: Arc<dyn ContentGenerator>) {
        let wrapped = self.wrap_content(generator);
        for container in ContainerType::ALL {
            self.content.insert(container, Arc::clone(&wrapped));
        }
    }

    /// Whether a narrative generator is registered.
    pub fn has_narrative(&self) -> bool {
        self.narrative.is_some()
    }

    /// Container types with a registered generator.
    pub fn content_types(&self) -> Vec<ContainerType> {
        let mut types: Vec<_> = self.content.keys().copied().collect();
        types.sort();
        types
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Generate a narrative with the registered generator.
    pub async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        let generator: &dyn NarrativeGenerator = match (&self.narrative, &self.placeholder) {
            (Some(g), _) => &**g,
            (None, Some(p)) => &**p,
            (None, None) => {
                return Err(GenerationError::Backend(
                    "no narrative generator registered".into(),
                ));
            }
        };
        let start = Instant::now();
        let result = generator.generate_narrative(spec).await;
        Self::record_generation("narrative", generator.name(), start, result.is_ok());
        result
    }

    /// Generate content with the generator registered for
    /// `spec.container_type`.
    pub async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        let generator: &dyn ContentGenerator =
            match (self.content.get(&spec.container_type), &self.placeholder) {
                (Some(g), _) => &**g,
                (None, Some(p)) => &**p,
                (None, None) => return Err(GenerationError::Unsupported(spec.container_type)),
            };
        let start = Instant::now();
        let result = generator.generate_content(spec, narrative).await;
        Self::record_generation("content", generator.name(), start, result.is_ok());
        result
    }

    // ========================================================================
    // Metrics recording
    // ========================================================================

    /// Record generation outcome metrics (counter + histogram).
    fn record_generation(kind: &'static str, generator: &str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::GENERATIONS_TOTAL,
            "generator" => generator.to_owned(),
            "kind" => kind,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS,
            "generator" => generator.to_owned(),
            "kind" => kind,
        )
        .record(start.elapsed().as_secs_f64());
    }

    // ========================================================================
    // Decorator wrapping helpers
    // ========================================================================

    fn wrap_narrative(&self, generator: Arc<dyn NarrativeGenerator>) -> Arc<dyn NarrativeGenerator> {
        let generator: Arc<dyn NarrativeGenerator> = match &self.retry_config {
            Some(config) => Arc::new(RetryingNarrativeGenerator::new(generator, config.clone())),
            None => generator,
        };
        match &self.placeholder {
            Some(p) => Arc::new(FallbackNarrativeGenerator::new(generator, Arc::clone(p))),
            None => generator,
        }
    }

    fn wrap_content(&self, generator: Arc<dyn ContentGenerator>) -> Arc<dyn ContentGenerator> {
        let generator: Arc<dyn ContentGenerator> = match &self.retry_config {
            Some(config) => Arc::new(RetryingContentGenerator::new(generator, config.clone())),
            None => generator,
        };
        match &self.placeholder {
            Some(p) => Arc::new(FallbackContentGenerator::new(generator, Arc::clone(p))),
            None => generator,
        }
    }
}
