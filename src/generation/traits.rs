//! Generator traits, one per artifact family.
//!
//! The orchestrator only talks to [`NarrativeGenerator`] and
//! [`ContentGenerator`]. Adapters over a [`GenerationBackend`](super::GenerationBackend),
//! retry decorators and fallback decorators all implement the same traits,
//! so they stack freely:
//!
//! ```text
//! FallbackContentGenerator
//!     └── RetryingContentGenerator
//!             └── ContainerAdapter
//!                     └── HttpBackend
//! ```
//!
//! # Contract
//!
//! A generator must be safe to call again with the same input: the
//! orchestrator may retry it, and a call that outlives its caller still runs
//! to completion. Returned artifacts have already passed schema validation.

use async_trait::async_trait;

use crate::GenerationResult;
use crate::types::{ContainerContent, ContentSpec, Narrative, NarrativeSpec};

/// Produces the shared narrative for a learner session.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Generator name for logging/metrics.
    fn name(&self) -> &str;

    /// Generate a narrative for `spec`.
    async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative>;
}

/// Produces container content for one (subject, container) cell.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generator name for logging/metrics.
    fn name(&self) -> &str;

    /// Generate content for `spec`, framed by `narrative`.
    async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent>;
}
