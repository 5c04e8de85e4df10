//! The external generation backend contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::GenerationResult;
use crate::cache::NarrativeKey;
use crate::types::{
    ArtifactKind, CharacterProfile, ContainerType, ContentSpec, Narrative, NarrativeSpec,
};

/// What the backend is asked to generate.
///
/// Sent as JSON by [`HttpBackend`](super::HttpBackend). Narrative requests
/// carry the subject set; container requests carry one subject, the skill
/// and the container type, plus the narrative they must stay consistent
/// with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub kind: ArtifactKind,
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<ContainerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeContext>,
}

/// The slice of a narrative a container generation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub key: NarrativeKey,
    pub character: CharacterProfile,
    pub setting: String,
    pub mission: String,
    /// Story hook for the cell's subject, if the narrative has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_hook: Option<String>,
}

impl Descriptor {
    /// Descriptor for the narrative of `spec`.
    pub fn narrative(spec: &NarrativeSpec) -> Self {
        Self {
            kind: ArtifactKind::Narrative,
            learner_id: spec.learner_id.clone(),
            grade_level: spec.grade_level.clone(),
            companion_id: spec.companion_id.clone(),
            career_id: spec.career_id.clone(),
            subjects: spec.subjects.iter().cloned().collect(),
            subject: None,
            skill_descriptor: None,
            container_type: None,
            narrative: None,
        }
    }

    /// Descriptor for one container cell framed by `narrative`.
    pub fn content(spec: &ContentSpec, narrative: &Narrative) -> Self {
        Self {
            kind: ArtifactKind::Content,
            learner_id: spec.learner_id.clone(),
            grade_level: spec.grade_level.clone(),
            companion_id: spec.companion_id.clone(),
            career_id: spec.career_id.clone(),
            subjects: Vec::new(),
            subject: Some(spec.subject.clone()),
            skill_descriptor: Some(spec.skill_id.clone()),
            container_type: Some(spec.container_type),
            narrative: Some(NarrativeContext {
                key: narrative.key.clone(),
                character: narrative.body.character.clone(),
                setting: narrative.body.setting.clone(),
                mission: narrative.body.mission.clone(),
                subject_hook: narrative.body.subject_hooks.get(&spec.subject).cloned(),
            }),
        }
    }
}

/// Raw backend answer, validated by the adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Artifact payload, checked against the schema for its kind.
    pub artifact: serde_json::Value,
    /// Actual cost of the call, when the backend reports one. Overrides the
    /// configured per-item price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl BackendResponse {
    pub fn new(artifact: serde_json::Value) -> Self {
        Self {
            artifact,
            cost: None,
            model: None,
        }
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// An external service that turns descriptors into raw artifacts.
///
/// Implementations report transport problems as transient
/// [`GenerationError`](crate::GenerationError)s so retry decorators can
/// act on them. They do not validate the artifact.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Generate one raw artifact.
    async fn generate(&self, descriptor: &Descriptor) -> GenerationResult<BackendResponse>;
}
