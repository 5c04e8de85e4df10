//! Request descriptors: single-artifact requests and learning journeys.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, SkaldError};

/// The five kinds of container content derived from a narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    /// Direct instruction ("learn" container).
    #[serde(rename = "learn", alias = "instructional")]
    Instructional,
    Practice,
    /// Assessment ("assess" container).
    #[serde(rename = "assess", alias = "assessment")]
    Assessment,
    Experience,
    Discover,
}

impl ContainerType {
    /// All container types, in journey order.
    pub const ALL: [ContainerType; 5] = [
        ContainerType::Instructional,
        ContainerType::Practice,
        ContainerType::Assessment,
        ContainerType::Experience,
        ContainerType::Discover,
    ];

    /// Stable identifier, used in cache keys, metric labels and descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Instructional => "learn",
            ContainerType::Practice => "practice",
            ContainerType::Assessment => "assess",
            ContainerType::Experience => "experience",
            ContainerType::Discover => "discover",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerType {
    type Err = SkaldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "learn" | "instructional" => Ok(ContainerType::Instructional),
            "practice" => Ok(ContainerType::Practice),
            "assess" | "assessment" => Ok(ContainerType::Assessment),
            "experience" => Ok(ContainerType::Experience),
            "discover" => Ok(ContainerType::Discover),
            other => Err(SkaldError::InvalidInput(format!(
                "unknown container type: {other}"
            ))),
        }
    }
}

/// Immutable descriptor for a single artifact request.
///
/// A narrative request needs only the learner context (plus an optional
/// subject). A container request additionally needs `subject`, `skill_id`
/// and `container_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<ContainerType>,
}

impl GenerationRequest {
    /// Create a request carrying only the learner context.
    pub fn new(
        learner_id: impl Into<String>,
        grade_level: impl Into<String>,
        companion_id: impl Into<String>,
        career_id: impl Into<String>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            grade_level: grade_level.into(),
            companion_id: companion_id.into(),
            career_id: career_id.into(),
            subject: None,
            skill_id: None,
            container_type: None,
        }
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the skill.
    pub fn skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    /// Set the container type.
    pub fn container(mut self, container_type: ContainerType) -> Self {
        self.container_type = Some(container_type);
        self
    }

    /// Narrative request for this descriptor. The subject set is the single
    /// subject if one is present, otherwise empty.
    pub fn narrative_spec(&self) -> Result<NarrativeSpec> {
        NarrativeSpec::new(
            &self.learner_id,
            &self.grade_level,
            &self.companion_id,
            &self.career_id,
            self.subject.iter().map(String::as_str),
        )
    }

    /// Container request for this descriptor.
    ///
    /// Fails with `InvalidInput` if subject, skill or container type is
    /// missing.
    pub fn content_spec(&self) -> Result<ContentSpec> {
        let missing = |field: &str| SkaldError::InvalidInput(format!("{field} is required"));
        let subject = self.subject.as_deref().ok_or_else(|| missing("subject"))?;
        let skill_id = self.skill_id.as_deref().ok_or_else(|| missing("skill_id"))?;
        let container_type = self.container_type.ok_or_else(|| missing("container_type"))?;
        ContentSpec::new(
            &self.learner_id,
            &self.grade_level,
            &self.companion_id,
            &self.career_id,
            subject,
            skill_id,
            container_type,
        )
    }
}

/// Fully-specified narrative request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSpec {
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    /// Subject set; ordering and duplicates in the input are irrelevant.
    pub subjects: BTreeSet<String>,
}

impl NarrativeSpec {
    pub fn new<'a>(
        learner_id: &str,
        grade_level: &str,
        companion_id: &str,
        career_id: &str,
        subjects: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        require("learner_id", learner_id)?;
        require("grade_level", grade_level)?;
        require("companion_id", companion_id)?;
        require("career_id", career_id)?;
        let subjects = subjects
            .into_iter()
            .map(|s| {
                require("subject", s)?;
                Ok(s.to_owned())
            })
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            learner_id: learner_id.to_owned(),
            grade_level: grade_level.to_owned(),
            companion_id: companion_id.to_owned(),
            career_id: career_id.to_owned(),
            subjects,
        })
    }
}

/// Fully-specified container request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpec {
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    pub subject: String,
    pub skill_id: String,
    pub container_type: ContainerType,
}

impl ContentSpec {
    pub fn new(
        learner_id: &str,
        grade_level: &str,
        companion_id: &str,
        career_id: &str,
        subject: &str,
        skill_id: &str,
        container_type: ContainerType,
    ) -> Result<Self> {
        require("learner_id", learner_id)?;
        require("grade_level", grade_level)?;
        require("companion_id", companion_id)?;
        require("career_id", career_id)?;
        require("subject", subject)?;
        require("skill_id", skill_id)?;
        Ok(Self {
            learner_id: learner_id.to_owned(),
            grade_level: grade_level.to_owned(),
            companion_id: companion_id.to_owned(),
            career_id: career_id.to_owned(),
            subject: subject.to_owned(),
            skill_id: skill_id.to_owned(),
            container_type,
        })
    }
}

/// One subject in a journey, with the skill its containers teach.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectPlan {
    pub subject: String,
    pub skill_id: String,
}

impl SubjectPlan {
    pub fn new(subject: impl Into<String>, skill_id: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            skill_id: skill_id.into(),
        }
    }
}

/// A learning journey: one learner, subjects × container types, sharing a
/// single narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyRequest {
    pub learner_id: String,
    pub grade_level: String,
    pub companion_id: String,
    pub career_id: String,
    pub subjects: Vec<SubjectPlan>,
    pub containers: Vec<ContainerType>,
}

impl JourneyRequest {
    pub fn new(
        learner_id: impl Into<String>,
        grade_level: impl Into<String>,
        companion_id: impl Into<String>,
        career_id: impl Into<String>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            grade_level: grade_level.into(),
            companion_id: companion_id.into(),
            career_id: career_id.into(),
            subjects: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Add a subject with the skill its containers target.
    pub fn subject(mut self, subject: impl Into<String>, skill_id: impl Into<String>) -> Self {
        self.subjects.push(SubjectPlan::new(subject, skill_id));
        self
    }

    /// Add a container type.
    pub fn container(mut self, container_type: ContainerType) -> Self {
        self.containers.push(container_type);
        self
    }

    /// Replace the container list.
    pub fn containers(mut self, containers: impl IntoIterator<Item = ContainerType>) -> Self {
        self.containers = containers.into_iter().collect();
        self
    }

    /// The shared narrative request for this journey.
    pub fn narrative_spec(&self) -> Result<NarrativeSpec> {
        NarrativeSpec::new(
            &self.learner_id,
            &self.grade_level,
            &self.companion_id,
            &self.career_id,
            self.subjects.iter().map(|s| s.subject.as_str()),
        )
    }

    /// Container requests for every (subject, container) cell.
    ///
    /// Rejects empty matrices and duplicate subjects, skills or container
    /// types, any of which would make two cells share one cache slot.
    pub fn cell_specs(&self) -> Result<Vec<ContentSpec>> {
        if self.subjects.is_empty() {
            return Err(SkaldError::InvalidInput(
                "journey needs at least one subject".into(),
            ));
        }
        if self.containers.is_empty() {
            return Err(SkaldError::InvalidInput(
                "journey needs at least one container type".into(),
            ));
        }
        ensure_unique("subject", self.subjects.iter().map(|s| s.subject.as_str()))?;
        ensure_unique("skill_id", self.subjects.iter().map(|s| s.skill_id.as_str()))?;
        ensure_unique("container type", self.containers.iter().map(|c| c.as_str()))?;

        let mut specs = Vec::with_capacity(self.subjects.len() * self.containers.len());
        for plan in &self.subjects {
            for container in &self.containers {
                specs.push(ContentSpec::new(
                    &self.learner_id,
                    &self.grade_level,
                    &self.companion_id,
                    &self.career_id,
                    &plan.subject,
                    &plan.skill_id,
                    *container,
                )?);
            }
        }
        Ok(specs)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SkaldError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn ensure_unique<'a>(what: &str, values: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for v in values {
        if !seen.insert(v) {
            return Err(SkaldError::InvalidInput(format!("duplicate {what}: {v}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journey() -> JourneyRequest {
        JourneyRequest::new("L1", "3", "finn", "vet")
            .subject("math", "math.3.add")
            .subject("ela", "ela.3.read")
            .container(ContainerType::Instructional)
            .container(ContainerType::Experience)
    }

    #[test]
    fn container_type_parses_aliases() {
        assert_eq!(
            "learn".parse::<ContainerType>().unwrap(),
            ContainerType::Instructional
        );
        assert_eq!(
            "Assessment".parse::<ContainerType>().unwrap(),
            ContainerType::Assessment
        );
        assert!("quiz".parse::<ContainerType>().is_err());
    }

    #[test]
    fn container_type_serde_uses_short_names() {
        let json = serde_json::to_string(&ContainerType::Instructional).unwrap();
        assert_eq!(json, "\"learn\"");
        let parsed: ContainerType = serde_json::from_str("\"instructional\"").unwrap();
        assert_eq!(parsed, ContainerType::Instructional);
    }

    #[test]
    fn journey_expands_full_matrix() {
        let cells = journey().cell_specs().unwrap();
        assert_eq!(cells.len(), 4);
        assert!(cells.iter().all(|c| c.learner_id == "L1"));
    }

    #[test]
    fn journey_rejects_empty_matrix() {
        let req = JourneyRequest::new("L1", "3", "finn", "vet").container(ContainerType::Practice);
        assert!(matches!(req.cell_specs(), Err(SkaldError::InvalidInput(_))));
    }

    #[test]
    fn journey_rejects_duplicate_skill() {
        let req = JourneyRequest::new("L1", "3", "finn", "vet")
            .subject("math", "shared")
            .subject("ela", "shared")
            .container(ContainerType::Practice);
        assert!(req.cell_specs().is_err());
    }

    #[test]
    fn narrative_spec_dedups_subjects() {
        let spec = NarrativeSpec::new("L1", "3", "finn", "vet", ["math", "ela", "math"]).unwrap();
        assert_eq!(spec.subjects.len(), 2);
    }

    #[test]
    fn content_spec_requires_fields() {
        let req = GenerationRequest::new("L1", "3", "finn", "vet").subject("math");
        assert!(req.content_spec().is_err());
        let req = req.skill("math.1").container(ContainerType::Discover);
        assert!(req.content_spec().is_ok());
    }

    #[test]
    fn blank_learner_rejected() {
        let req = GenerationRequest::new("  ", "3", "finn", "vet");
        assert!(req.narrative_spec().is_err());
    }
}
