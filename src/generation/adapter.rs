//! Adapters from a raw [`GenerationBackend`] to the typed generator traits.
//!
//! Each adapter bounds the backend call with a timeout, validates the
//! returned payload against the schema for its kind and prices the result.
//! A payload that does not match its schema becomes
//! [`GenerationError::Schema`]; nothing unvalidated reaches the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{BackendResponse, Descriptor, GenerationBackend};
use super::traits::{ContentGenerator, NarrativeGenerator};
use crate::clock::{Clock, SystemClock};
use crate::types::{
    ArtifactMeta, ContainerBody, ContainerContent, ContentSpec, Narrative, NarrativeBody,
    NarrativeSpec, Pricing,
};
use crate::{GenerationError, GenerationResult};

/// Default bound on a single backend call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Call the backend under `timeout` and reject empty payloads.
async fn call_backend(
    backend: &dyn GenerationBackend,
    descriptor: &Descriptor,
    timeout: Duration,
) -> GenerationResult<BackendResponse> {
    let response = tokio::time::timeout(timeout, backend.generate(descriptor))
        .await
        .map_err(|_| GenerationError::Timeout(timeout))??;
    if response.artifact.is_null() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(response)
}

/// Backend-reported cost when it is a sane number, otherwise `configured`.
fn effective_cost(reported: Option<f64>, configured: f64) -> f64 {
    reported
        .filter(|c| c.is_finite() && *c >= 0.0)
        .unwrap_or(configured)
}

/// [`NarrativeGenerator`] over a [`GenerationBackend`].
pub struct NarrativeAdapter {
    backend: Arc<dyn GenerationBackend>,
    cost: f64,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl NarrativeAdapter {
    /// Adapt `backend`, pricing narratives at `pricing.narrative_cost`.
    pub fn new(backend: Arc<dyn GenerationBackend>, pricing: &Pricing) -> Self {
        Self {
            backend,
            cost: pricing.narrative_cost,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the time source used for `generated_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl NarrativeGenerator for NarrativeAdapter {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        let descriptor = Descriptor::narrative(spec);
        let response = call_backend(self.backend.as_ref(), &descriptor, self.timeout).await?;
        let body = NarrativeBody::from_value(response.artifact)?;
        let cost = effective_cost(response.cost, self.cost);
        debug!(backend = self.backend.name(), cost, "narrative generated");
        Ok(Narrative::new(
            spec,
            body,
            ArtifactMeta::live(cost, response.model, self.clock.now()),
        ))
    }
}

/// [`ContentGenerator`] over a [`GenerationBackend`], for every container
/// type.
///
/// The payload is validated against the schema of the requested container
/// type; a body shaped for another type is a schema error.
pub struct ContainerAdapter {
    backend: Arc<dyn GenerationBackend>,
    cost: f64,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ContainerAdapter {
    /// Adapt `backend`, pricing content at `pricing.container_cost`.
    pub fn new(backend: Arc<dyn GenerationBackend>, pricing: &Pricing) -> Self {
        Self {
            backend,
            cost: pricing.container_cost,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the time source used for `generated_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl ContentGenerator for ContainerAdapter {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        let descriptor = Descriptor::content(spec, narrative);
        let response = call_backend(self.backend.as_ref(), &descriptor, self.timeout).await?;
        let body = ContainerBody::from_value(spec.container_type, response.artifact)?;
        let cost = effective_cost(response.cost, self.cost);
        debug!(
            backend = self.backend.name(),
            container = spec.container_type.as_str(),
            cost,
            "container content generated"
        );
        Ok(ContainerContent::new(
            spec,
            narrative.key.clone(),
            body,
            ArtifactMeta::live(cost, response.model, self.clock.now()),
        ))
    }
}
