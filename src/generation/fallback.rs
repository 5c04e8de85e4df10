//! Deterministic placeholder artifacts.
//!
//! [`PlaceholderGenerator`] builds schema-conforming artifacts from the
//! request alone, at zero cost, marked
//! [`ArtifactSource::Fallback`](crate::ArtifactSource::Fallback). The
//! `Fallback*Generator` decorators serve a placeholder whenever the wrapped
//! generator fails, so in fallback mode a journey never reports a
//! generation failure. Placeholders are not authoritative: the orchestrator
//! never caches them, nor content derived from a placeholder narrative.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::traits::{ContentGenerator, NarrativeGenerator};
use crate::clock::{Clock, SystemClock};
use crate::telemetry;
use crate::types::{
    ArtifactMeta, AssessmentBody, AssessmentQuestion, CharacterProfile, ContainerBody,
    ContainerContent, ContainerType, ContentSpec, DiscoverBody, ExperienceBody,
    InstructionalBody, Narrative, NarrativeBody, NarrativeSpec, PracticeBody, PracticeProblem,
};
use crate::{GenerationError, GenerationResult};

const NAME: &str = "placeholder";

/// Reason recorded when a placeholder is served without a prior failure.
const NO_GENERATOR: &str = "no generator configured";

/// Generator of deterministic placeholder artifacts.
///
/// The same request always yields the same body; only `generated_at`
/// varies.
pub struct PlaceholderGenerator {
    clock: Arc<dyn Clock>,
}

impl PlaceholderGenerator {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for `generated_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Placeholder narrative for `spec`.
    pub fn narrative(&self, spec: &NarrativeSpec, reason: &str) -> Narrative {
        let companion = title_case(&spec.companion_id);
        let career = spec.career_id.replace(['_', '-'], " ");
        let body = NarrativeBody {
            character: CharacterProfile {
                name: companion.clone(),
                role: career.clone(),
                personality: None,
            },
            setting: format!("A day in the life of a {career}"),
            mission: format!("Help {companion} with today's work as a {career}"),
            subject_hooks: spec
                .subjects
                .iter()
                .map(|s| (s.clone(), format!("{companion} needs your {s} skills")))
                .collect(),
        };
        Narrative::new(spec, body, ArtifactMeta::fallback(reason, self.clock.now()))
    }

    /// Placeholder content for `spec`, derived from `narrative`.
    pub fn content(&self, spec: &ContentSpec, narrative: &Narrative, reason: &str) -> ContainerContent {
        let body = placeholder_body(spec, narrative);
        ContainerContent::new(
            spec,
            narrative.key.clone(),
            body,
            ArtifactMeta::fallback(reason, self.clock.now()),
        )
    }
}

impl Default for PlaceholderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NarrativeGenerator for PlaceholderGenerator {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        Ok(self.narrative(spec, NO_GENERATOR))
    }
}

#[async_trait]
impl ContentGenerator for PlaceholderGenerator {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        Ok(self.content(spec, narrative, NO_GENERATOR))
    }
}

fn placeholder_body(spec: &ContentSpec, narrative: &Narrative) -> ContainerBody {
    let hero = &narrative.body.character.name;
    let subject = &spec.subject;
    let skill = &spec.skill_id;
    match spec.container_type {
        ContainerType::Instructional => ContainerBody::Instructional(InstructionalBody {
            title: format!("Learn {subject} with {hero}"),
            introduction: format!("{hero} will walk you through {skill}."),
            key_points: vec![format!("Practice {skill} step by step")],
            worked_example: None,
        }),
        ContainerType::Practice => ContainerBody::Practice(PracticeBody {
            title: format!("Practice {subject} with {hero}"),
            problems: vec![PracticeProblem {
                prompt: format!("Show {hero} one example of {skill}."),
                answer: "Answers will vary.".to_string(),
                hint: None,
            }],
        }),
        ContainerType::Assessment => ContainerBody::Assessment(AssessmentBody {
            title: format!("Check your {subject}"),
            questions: vec![AssessmentQuestion {
                prompt: format!("Are you ready to use {skill}?"),
                options: vec!["Yes".to_string(), "Not yet".to_string()],
                correct_index: 0,
            }],
        }),
        ContainerType::Experience => ContainerBody::Experience(ExperienceBody {
            title: format!("{subject} on the job"),
            scenario: narrative.body.setting.clone(),
            challenges: vec![format!("Use {skill} to help {hero}")],
            career_connection: format!(
                "A {} uses {subject} every day.",
                narrative.body.character.role
            ),
        }),
        ContainerType::Discover => ContainerBody::Discover(DiscoverBody {
            title: format!("Discover {subject}"),
            exploration: format!("Explore how {skill} shows up around you."),
            activities: vec![format!("Find one place {hero} would use {subject}")],
            reflection_prompt: None,
        }),
    }
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn record_fallback(kind: &'static str, generator: &str, err: &GenerationError) {
    metrics::counter!(telemetry::FALLBACKS_TOTAL, "kind" => kind).increment(1);
    warn!(generator, kind, error = %err, "generation failed, serving placeholder");
}

// ============================================================================
// Fallback decorators
// ============================================================================

/// Decorator that masks [`NarrativeGenerator`] failures with a placeholder.
pub struct FallbackNarrativeGenerator {
    inner: Arc<dyn NarrativeGenerator>,
    placeholder: Arc<PlaceholderGenerator>,
}

impl FallbackNarrativeGenerator {
    pub fn new(inner: Arc<dyn NarrativeGenerator>, placeholder: Arc<PlaceholderGenerator>) -> Self {
        Self { inner, placeholder }
    }
}

#[async_trait]
impl NarrativeGenerator for FallbackNarrativeGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_narrative(&self, spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        match self.inner.generate_narrative(spec).await {
            Ok(narrative) => Ok(narrative),
            Err(e) => {
                record_fallback("narrative", self.inner.name(), &e);
                Ok(self.placeholder.narrative(spec, &e.to_string()))
            }
        }
    }
}

/// Decorator that masks [`ContentGenerator`] failures with a placeholder.
pub struct FallbackContentGenerator {
    inner: Arc<dyn ContentGenerator>,
    placeholder: Arc<PlaceholderGenerator>,
}

impl FallbackContentGenerator {
    pub fn new(inner: Arc<dyn ContentGenerator>, placeholder: Arc<PlaceholderGenerator>) -> Self {
        Self { inner, placeholder }
    }
}

#[async_trait]
impl ContentGenerator for FallbackContentGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_content(
        &self,
        spec: &ContentSpec,
        narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        match self.inner.generate_content(spec, narrative).await {
            Ok(content) => Ok(content),
            Err(e) => {
                record_fallback("content", self.inner.name(), &e);
                Ok(self.placeholder.content(spec, narrative, &e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_pass_their_own_schema() {
        let placeholder = PlaceholderGenerator::new();
        let nspec = NarrativeSpec::new("L1", "3", "finn", "vet_tech", ["math"]).unwrap();
        let narrative = placeholder.narrative(&nspec, "test");
        narrative.body.validate().unwrap();
        assert_eq!(narrative.body.character.name, "Finn");
        assert_eq!(narrative.meta.cost, 0.0);
        assert!(!narrative.meta.is_authoritative());

        for container in ContainerType::ALL {
            let cspec =
                ContentSpec::new("L1", "3", "finn", "vet_tech", "math", "math.3.add", container)
                    .unwrap();
            let content = placeholder.content(&cspec, &narrative, "test");
            content.body.validate().unwrap();
            assert_eq!(content.body.container_type(), container);
            assert_eq!(content.narrative_key, narrative.key);
        }
    }

    #[test]
    fn placeholders_are_deterministic() {
        let placeholder = PlaceholderGenerator::new();
        let nspec = NarrativeSpec::new("L1", "3", "finn", "vet", ["math", "ela"]).unwrap();
        assert_eq!(placeholder.narrative(&nspec, "x").body, placeholder.narrative(&nspec, "x").body);
    }
}
