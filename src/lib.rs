//! Skald - narrative-cached content generation for learning journeys
//!
//! A learning journey is a set of container content items (instructional,
//! practice, assessment, experience, discover) for several subjects, all
//! framed by one shared narrative: a companion character, a career setting
//! and a mission. The narrative is the expensive artifact; container content
//! is cheap once the narrative exists.
//!
//! Skald generates the narrative once, fans out the container generations
//! with bounded concurrency, caches every authoritative artifact in a
//! three-tier [`CacheStore`], and reports spend against an uncached baseline
//! in a [`CostLedger`].
//!
//! # Journey Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skald::{ContainerType, HttpBackend, JourneyRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> skald::Result<()> {
//!     let orchestrator = Orchestrator::builder()
//!         .backend(Arc::new(HttpBackend::new("http://localhost:8080")?))
//!         .build()?;
//!
//!     let journey = JourneyRequest::new("L1", "3", "finn", "vet")
//!         .subject("math", "math.3.add")
//!         .subject("ela", "ela.3.read")
//!         .containers([ContainerType::Instructional, ContainerType::Experience]);
//!
//!     let result = orchestrator.generate_journey(&journey).await?;
//!     for failure in &result.failures {
//!         eprintln!("{failure}");
//!     }
//!     println!(
//!         "spent {:.3}, saved {:.3}",
//!         result.ledger.total_cost, result.ledger.cost_savings
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Example
//!
//! ```rust,no_run
//! use skald::{Config, OrchestratorBuilder};
//!
//! # fn main() -> skald::Result<()> {
//! let config = Config::load(None)?;
//! let orchestrator = OrchestratorBuilder::from_config(&config)?.build()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{
    GenerationError, GenerationResult, Result, SchemaError, SchemaKind, SkaldError, StoreError,
};
pub use orchestrator::{
    Cell, Coordinate, GenerationFailure, JourneyResult, Orchestrator, OrchestratorBuilder,
};

pub use cache::{
    CacheConfig, CacheEntry, CacheKey, CacheStats, CacheStore, CachedArtifact, ContentKey,
    EphemeralStore, EvictionPolicy, FileStore, KvStore, NarrativeKey, Tier,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
#[cfg(feature = "http")]
pub use generation::HttpBackend;
pub use generation::{
    BackendResponse, ContainerAdapter, ContentGenerator, Descriptor, GenerationBackend,
    GeneratorRegistry, NarrativeAdapter, NarrativeGenerator, PlaceholderGenerator, RetryConfig,
};

// Re-export all types
pub use types::{
    ArtifactKind, ArtifactMeta, ArtifactSource, AssessmentBody, AssessmentQuestion,
    CharacterProfile, ContainerBody, ContainerContent, ContainerType, ContentSpec, CostLedger,
    DiscoverBody, ExperienceBody, GenerationRequest, InstructionalBody, JourneyRequest, Narrative,
    NarrativeBody, NarrativeSpec, PracticeBody, PracticeProblem, Pricing, SubjectPlan,
};
