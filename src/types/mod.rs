//! Public types for the Skald API.

mod artifact;
mod content;
mod ledger;
mod narrative;
mod request;

pub use artifact::{ArtifactKind, ArtifactMeta, ArtifactSource};
pub use content::{
    AssessmentBody, AssessmentQuestion, ContainerBody, ContainerContent, DiscoverBody,
    ExperienceBody, InstructionalBody, PracticeBody, PracticeProblem,
};
pub use ledger::{CostLedger, Pricing};
pub(crate) use ledger::{ItemOrigin, LedgerAccumulator};
pub use narrative::{CharacterProfile, Narrative, NarrativeBody};
pub use request::{
    ContainerType, ContentSpec, GenerationRequest, JourneyRequest, NarrativeSpec, SubjectPlan,
};
