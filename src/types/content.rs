//! Container content: one typed, validated schema per container type.

use serde::{Deserialize, Serialize};

use crate::cache::{ContentKey, NarrativeKey};
use crate::error::{SchemaError, SchemaKind};
use crate::types::{ArtifactMeta, ContainerType, ContentSpec};

/// "learn" container: direct instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionalBody {
    pub title: String,
    pub introduction: String,
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worked_example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeProblem {
    pub prompt: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Practice container: problems with answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeBody {
    pub title: String,
    pub problems: Vec<PracticeProblem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

/// Assessment container: multiple-choice questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentBody {
    pub title: String,
    pub questions: Vec<AssessmentQuestion>,
}

/// Experience container: a career scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceBody {
    pub title: String,
    pub scenario: String,
    pub challenges: Vec<String>,
    pub career_connection: String,
}

/// Discover container: open-ended exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverBody {
    pub title: String,
    pub exploration: String,
    pub activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_prompt: Option<String>,
}

/// Container payload, tagged by container type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContainerBody {
    #[serde(rename = "learn")]
    Instructional(InstructionalBody),
    #[serde(rename = "practice")]
    Practice(PracticeBody),
    #[serde(rename = "assess")]
    Assessment(AssessmentBody),
    #[serde(rename = "experience")]
    Experience(ExperienceBody),
    #[serde(rename = "discover")]
    Discover(DiscoverBody),
}

impl ContainerBody {
    /// Parse an untagged backend payload against the schema for `kind`.
    pub fn from_value(kind: ContainerType, value: serde_json::Value) -> Result<Self, SchemaError> {
        let schema = SchemaKind::Container(kind);
        let err = |e: serde_json::Error| SchemaError::new(schema, e.to_string());
        let body = match kind {
            ContainerType::Instructional => {
                ContainerBody::Instructional(serde_json::from_value(value).map_err(err)?)
            }
            ContainerType::Practice => {
                ContainerBody::Practice(serde_json::from_value(value).map_err(err)?)
            }
            ContainerType::Assessment => {
                ContainerBody::Assessment(serde_json::from_value(value).map_err(err)?)
            }
            ContainerType::Experience => {
                ContainerBody::Experience(serde_json::from_value(value).map_err(err)?)
            }
            ContainerType::Discover => {
                ContainerBody::Discover(serde_json::from_value(value).map_err(err)?)
            }
        };
        body.validate()?;
        Ok(body)
    }

    /// Container type this body belongs to.
    pub fn container_type(&self) -> ContainerType {
        match self {
            ContainerBody::Instructional(_) => ContainerType::Instructional,
            ContainerBody::Practice(_) => ContainerType::Practice,
            ContainerBody::Assessment(_) => ContainerType::Assessment,
            ContainerBody::Experience(_) => ContainerType::Experience,
            ContainerBody::Discover(_) => ContainerType::Discover,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ContainerBody::Instructional(b) => &b.title,
            ContainerBody::Practice(b) => &b.title,
            ContainerBody::Assessment(b) => &b.title,
            ContainerBody::Experience(b) => &b.title,
            ContainerBody::Discover(b) => &b.title,
        }
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let schema = SchemaKind::Container(self.container_type());
        let fail = |reason: String| Err(SchemaError::new(schema, reason));

        if self.title().trim().is_empty() {
            return fail("title is empty".into());
        }
        match self {
            ContainerBody::Instructional(b) => {
                if b.introduction.trim().is_empty() {
                    return fail("introduction is empty".into());
                }
                if b.key_points.is_empty() {
                    return fail("key_points is empty".into());
                }
            }
            ContainerBody::Practice(b) => {
                if b.problems.is_empty() {
                    return fail("problems is empty".into());
                }
                if let Some(i) = b.problems.iter().position(|p| p.prompt.trim().is_empty()) {
                    return fail(format!("problems[{i}].prompt is empty"));
                }
            }
            ContainerBody::Assessment(b) => {
                if b.questions.is_empty() {
                    return fail("questions is empty".into());
                }
                for (i, q) in b.questions.iter().enumerate() {
                    if q.options.len() < 2 {
                        return fail(format!("questions[{i}] needs at least two options"));
                    }
                    if q.correct_index >= q.options.len() {
                        return fail(format!(
                            "questions[{i}].correct_index {} out of range",
                            q.correct_index
                        ));
                    }
                }
            }
            ContainerBody::Experience(b) => {
                if b.scenario.trim().is_empty() {
                    return fail("scenario is empty".into());
                }
                if b.challenges.is_empty() {
                    return fail("challenges is empty".into());
                }
            }
            ContainerBody::Discover(b) => {
                if b.exploration.trim().is_empty() {
                    return fail("exploration is empty".into());
                }
                if b.activities.is_empty() {
                    return fail("activities is empty".into());
                }
            }
        }
        Ok(())
    }
}

/// Cheap artifact derived from a narrative for one (subject, container) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerContent {
    pub key: ContentKey,
    /// Narrative this content was generated from. The narrative may expire
    /// from the cache before this content does.
    pub narrative_key: NarrativeKey,
    pub learner_id: String,
    pub grade_level: String,
    pub subject: String,
    pub skill_id: String,
    pub container_type: ContainerType,
    pub body: ContainerBody,
    pub meta: ArtifactMeta,
}

impl ContainerContent {
    /// Assemble content for `spec`, derived from the narrative at `narrative_key`.
    pub fn new(
        spec: &ContentSpec,
        narrative_key: NarrativeKey,
        body: ContainerBody,
        meta: ArtifactMeta,
    ) -> Self {
        Self {
            key: ContentKey::derive(spec),
            narrative_key,
            learner_id: spec.learner_id.clone(),
            grade_level: spec.grade_level.clone(),
            subject: spec.subject.clone(),
            skill_id: spec.skill_id.clone(),
            container_type: spec.container_type,
            body,
            meta,
        }
    }
}
