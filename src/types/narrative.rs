//! The shared narrative artifact and its schema.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cache::NarrativeKey;
use crate::error::{SchemaError, SchemaKind};
use crate::types::{ArtifactMeta, NarrativeSpec};

/// Companion character that carries the learner through a journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
}

/// Backend-generated narrative payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeBody {
    pub character: CharacterProfile,
    pub setting: String,
    pub mission: String,
    /// Optional per-subject story hooks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subject_hooks: BTreeMap<String, String>,
}

impl NarrativeBody {
    /// Parse and validate a raw backend payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let body: NarrativeBody = serde_json::from_value(value)
            .map_err(|e| SchemaError::new(SchemaKind::Narrative, e.to_string()))?;
        body.validate()?;
        Ok(body)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let fail = |reason: &str| Err(SchemaError::new(SchemaKind::Narrative, reason));
        if self.character.name.trim().is_empty() {
            return fail("character.name is empty");
        }
        if self.character.role.trim().is_empty() {
            return fail("character.role is empty");
        }
        if self.setting.trim().is_empty() {
            return fail("setting is empty");
        }
        if self.mission.trim().is_empty() {
            return fail("mission is empty");
        }
        Ok(())
    }
}

/// The expensive shared artifact for one learner session.
///
/// Immutable once created. Every [`ContainerContent`](crate::ContainerContent)
/// generated from it carries its key as a back-reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub key: NarrativeKey,
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    pub subjects: BTreeSet<String>,
    pub body: NarrativeBody,
    pub meta: ArtifactMeta,
}

impl Narrative {
    /// Assemble a narrative for `spec` from a validated body.
    pub fn new(spec: &NarrativeSpec, body: NarrativeBody, meta: ArtifactMeta) -> Self {
        Self {
            key: NarrativeKey::derive(spec),
            learner_id: spec.learner_id.clone(),
            grade_level: spec.grade_level.clone(),
            companion_id: spec.companion_id.clone(),
            career_id: spec.career_id.clone(),
            subjects: spec.subjects.clone(),
            body,
            meta,
        }
    }
}
