//! Cache-first generation of learning journeys.
//!
//! Per artifact the flow is: check the cache; on a hit return it; on a miss
//! generate, store in every tier, return.
//!
//! A journey over subjects S and container types C:
//!
//! 1. Resolve exactly one narrative for (learner, grade, companion, career,
//!    subject set), fully awaited before any container work starts.
//! 2. Resolve content for every cell of S×C from that shared narrative,
//!    with at most `max_concurrency` generations in flight.
//! 3. Account cost per item into a [`CostLedger`].
//!
//! A failing cell is recorded against that cell only. A narrative failure
//! ends the journey immediately with only the narrative-level error.
//!
//! Generation calls run as spawned tasks: once issued, a call runs to
//! completion and its result is cached even if the caller stops waiting.

mod builder;
mod result;

pub use builder::OrchestratorBuilder;
pub use result::{Cell, Coordinate, GenerationFailure, JourneyResult};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStore, ContentKey, NarrativeKey};
use crate::generation::GeneratorRegistry;
use crate::telemetry;
use crate::types::{
    ArtifactSource, ContainerContent, ContentSpec, CostLedger, GenerationRequest, ItemOrigin, JourneyRequest,
    LedgerAccumulator, Narrative, NarrativeSpec, Pricing,
};
use crate::{GenerationError, GenerationResult, Result, SkaldError};

/// Default bound on concurrent container generations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Fallback reason attached to content generated against a placeholder narrative.
const DERIVED_FROM_PLACEHOLDER: &str = "derived from placeholder narrative";

/// Coordinates cache lookups, generation and cost accounting.
///
/// Cheap to clone; clones share the cache, the generators and the
/// concurrency limit.
#[derive(Clone)]
pub struct Orchestrator {
    cache: Arc<CacheStore>,
    generators: Arc<GeneratorRegistry>,
    pricing: Pricing,
    limiter: Arc<Semaphore>,
    max_concurrency: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pricing", &self.pricing)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Remove every cached artifact from every tier.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    // ========================================================================
    // Journeys
    // ========================================================================

    /// Generate a learning journey: one shared narrative and content for
    /// every (subject, container type) cell.
    ///
    /// Returns `Err` only for an invalid request. Generation failures are
    /// reported per coordinate in the [`JourneyResult`].
    #[instrument(
        skip(self, request),
        fields(
            learner = %request.learner_id,
            subjects = request.subjects.len(),
            containers = request.containers.len(),
        )
    )]
    pub async fn generate_journey(&self, request: &JourneyRequest) -> Result<JourneyResult> {
        let narrative_spec = request.narrative_spec()?;
        let cells = request.cell_specs()?;
        let start = Instant::now();
        let mut ledger = LedgerAccumulator::default();

        let narrative = match self.spawn_narrative(narrative_spec).await {
            Ok((narrative, origin)) => {
                ledger.record_narrative(origin, narrative.meta.cost, narrative.meta.is_authoritative());
                Arc::new(narrative)
            }
            Err(error) => {
                warn!(error = %error, "narrative generation failed, aborting journey");
                let ledger = self.finish_ledger(LedgerAccumulator::default(), start, "failed");
                return Ok(JourneyResult::narrative_failed(error, ledger));
            }
        };

        let tasks = cells.into_iter().map(|spec| {
            let cell = Cell::of(&spec);
            let task = self.spawn_content(spec, Arc::clone(&narrative));
            async move { (cell, task.await) }
        });
        let outcomes = join_all(tasks).await;

        let mut contents = HashMap::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (cell, outcome) in outcomes {
            match outcome {
                Ok((content, origin)) => {
                    ledger.record_cell(origin, content.meta.cost, content.meta.is_authoritative());
                    contents.insert(cell, content);
                }
                Err(error) => {
                    warn!(cell = %cell, error = %error, "container generation failed");
                    ledger.record_failure();
                    failures.push(GenerationFailure {
                        coordinate: Coordinate::Cell(cell),
                        error,
                    });
                }
            }
        }

        let status = if failures.is_empty() { "ok" } else { "partial" };
        let ledger = self.finish_ledger(ledger, start, status);
        Ok(JourneyResult {
            narrative: Some(Arc::unwrap_or_clone(narrative)),
            contents,
            failures,
            ledger,
        })
    }

    // ========================================================================
    // Single artifacts
    // ========================================================================

    /// Return the cached narrative for `request`, generating it on a miss.
    ///
    /// The subject set is the request's single subject, if any.
    #[instrument(skip(self, request), fields(learner = %request.learner_id))]
    pub async fn resolve_narrative(&self, request: &GenerationRequest) -> Result<Narrative> {
        let spec = request.narrative_spec()?;
        let (narrative, _) = self.spawn_narrative(spec).await?;
        Ok(narrative)
    }

    /// Return the cached content for `request`, generating it from
    /// `narrative` on a miss.
    ///
    /// `request` must name a subject, skill and container type, and belong
    /// to the same learner as `narrative`.
    #[instrument(
        skip(self, request, narrative),
        fields(learner = %request.learner_id, container = ?request.container_type)
    )]
    pub async fn resolve_content(
        &self,
        request: &GenerationRequest,
        narrative: &Narrative,
    ) -> Result<ContainerContent> {
        let spec = request.content_spec()?;
        if narrative.learner_id != spec.learner_id {
            return Err(SkaldError::InvalidInput(format!(
                "narrative belongs to learner {}, request is for {}",
                narrative.learner_id, spec.learner_id
            )));
        }
        let (content, _) = self
            .spawn_content(spec, Arc::new(narrative.clone()))
            .await?;
        Ok(content)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a narrative on a detached task.
    async fn spawn_narrative(
        &self,
        spec: NarrativeSpec,
    ) -> GenerationResult<(Narrative, ItemOrigin)> {
        let this = self.clone();
        tokio::spawn(async move { this.resolve_narrative_spec(&spec).await })
            .await
            .unwrap_or_else(|e| Err(GenerationError::TaskFailed(e.to_string())))
    }

    /// Resolve one cell on a detached task, holding a concurrency permit
    /// while it runs.
    async fn spawn_content(
        &self,
        spec: ContentSpec,
        narrative: Arc<Narrative>,
    ) -> GenerationResult<(ContainerContent, ItemOrigin)> {
        let this = self.clone();
        tokio::spawn(async move {
            let _permit = Arc::clone(&this.limiter)
                .acquire_owned()
                .await
                .map_err(|e| GenerationError::TaskFailed(e.to_string()))?;
            this.resolve_content_spec(&spec, &narrative).await
        })
        .await
        .unwrap_or_else(|e| Err(GenerationError::TaskFailed(e.to_string())))
    }

    async fn resolve_narrative_spec(
        &self,
        spec: &NarrativeSpec,
    ) -> GenerationResult<(Narrative, ItemOrigin)> {
        let key = NarrativeKey::derive(spec);
        if let Some(narrative) = self.cache.get_narrative(&key).await {
            debug!(key = %key, "narrative cache hit");
            return Ok((narrative, ItemOrigin::Cached));
        }

        let narrative = self.generators.generate_narrative(spec).await?;
        if narrative.meta.is_authoritative() {
            if let Err(e) = self.cache.put_narrative(&narrative).await {
                warn!(key = %key, error = %e, "failed to cache narrative");
            }
        } else {
            debug!(key = %key, "placeholder narrative not cached");
        }
        Ok((narrative, ItemOrigin::Generated))
    }

    async fn resolve_content_spec(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<(ContainerContent, ItemOrigin)> {
        let key = ContentKey::derive(spec);
        if let Some(content) = self.cache.get_content(&key).await {
            debug!(key = %key, "content cache hit");
            return Ok((content, ItemOrigin::Cached));
        }

        let mut content = self.generators.generate_content(spec, narrative).await?;
        // Content framed by a placeholder narrative is no more authoritative
        // than the narrative itself.
        if content.meta.is_authoritative() && !narrative.meta.is_authoritative() {
            content.meta.source = ArtifactSource::Fallback {
                reason: DERIVED_FROM_PLACEHOLDER.to_string(),
            };
        }
        if content.meta.is_authoritative() {
            if let Err(e) = self.cache.put_content(&content).await {
                warn!(key = %key, error = %e, "failed to cache content");
            }
        } else {
            debug!(key = %key, "non-authoritative content not cached");
        }
        Ok((content, ItemOrigin::Generated))
    }

    // ========================================================================
    // Accounting
    // ========================================================================

    fn finish_ledger(&self, acc: LedgerAccumulator, start: Instant, status: &'static str) -> CostLedger {
        let elapsed = start.elapsed();
        let ledger = acc.finish(&self.pricing, elapsed, self.cache.clock().now());
        metrics::counter!(telemetry::BATCHES_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::BATCH_COST).record(ledger.total_cost);
        metrics::histogram!(telemetry::BATCH_SAVINGS).record(ledger.cost_savings);
        metrics::histogram!(telemetry::BATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(
            status,
            total_cost = ledger.total_cost,
            cost_savings = ledger.cost_savings,
            generated = ledger.generated,
            cached = ledger.cached,
            failed = ledger.failed,
            duration_ms = ledger.generation_time_ms,
            "journey finished"
        );
        ledger
    }
}
