//! Fallback decorators and registry dispatch with placeholders.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use skald::generation::{
    ContentGenerator, FallbackContentGenerator, FallbackNarrativeGenerator, GeneratorRegistry,
    NarrativeGenerator, PlaceholderGenerator, RetryConfig,
};
use skald::{
    ArtifactSource, ContainerContent, ContainerType, ContentSpec, GenerationError,
    GenerationResult, Narrative, NarrativeSpec,
};

// ============================================================================
// Mock generators
// ============================================================================

/// Generator that always fails with `error`.
struct AlwaysFails {
    error: fn() -> GenerationError,
    calls: AtomicU32,
}

impl AlwaysFails {
    fn new(error: fn() -> GenerationError) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl NarrativeGenerator for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    async fn generate_narrative(&self, _spec: &NarrativeSpec) -> GenerationResult<Narrative> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }
}

#[async_trait]
impl ContentGenerator for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    async fn generate_content(
        &self,
        _spec: &ContentSpec,
        _narrative: &Narrative,
    ) -> GenerationResult<ContainerContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }
}

fn narrative_spec() -> NarrativeSpec {
    NarrativeSpec::new("L1", "3", "finn", "vet", ["math", "ela"]).unwrap()
}

fn content_spec(container: ContainerType) -> ContentSpec {
    ContentSpec::new("L1", "3", "finn", "vet", "math", "math.3.add", container).unwrap()
}

fn fallback_reason(source: &ArtifactSource) -> &str {
    match source {
        ArtifactSource::Fallback { reason } => reason.as_str(),
        ArtifactSource::Live => panic!("expected a fallback artifact"),
    }
}

// ============================================================================
// Decorators
// ============================================================================

#[tokio::test]
async fn narrative_failure_becomes_placeholder() {
    let inner = AlwaysFails::new(|| GenerationError::AuthenticationFailed);
    let generator =
        FallbackNarrativeGenerator::new(inner.clone(), Arc::new(PlaceholderGenerator::new()));

    let narrative = generator.generate_narrative(&narrative_spec()).await.unwrap();
    assert!(!narrative.meta.is_authoritative());
    assert_eq!(narrative.meta.cost, 0.0);
    assert!(fallback_reason(&narrative.meta.source).contains("authentication"));
    assert_eq!(narrative.subjects.len(), 2);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn content_failure_becomes_placeholder_of_requested_type() {
    let inner = AlwaysFails::new(|| GenerationError::EmptyResponse);
    let placeholder = Arc::new(PlaceholderGenerator::new());
    let generator = FallbackContentGenerator::new(inner, Arc::clone(&placeholder));
    let narrative = placeholder.narrative(&narrative_spec(), "fixture");

    for container in ContainerType::ALL {
        let content = generator
            .generate_content(&content_spec(container), &narrative)
            .await
            .unwrap();
        assert_eq!(content.container_type, container);
        assert_eq!(content.body.container_type(), container);
        assert_eq!(content.narrative_key, narrative.key);
        assert!(!content.meta.is_authoritative());
    }
}

#[test]
fn placeholders_are_deterministic() {
    let placeholder = PlaceholderGenerator::new();
    let a = placeholder.narrative(&narrative_spec(), "x");
    let b = placeholder.narrative(&narrative_spec(), "x");
    assert_eq!(a.key, b.key);
    assert_eq!(a.body, b.body);

    let ca = placeholder.content(&content_spec(ContainerType::Experience), &a, "x");
    let cb = placeholder.content(&content_spec(ContainerType::Experience), &b, "x");
    assert_eq!(ca.body, cb.body);
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn registry_without_fallback_reports_unsupported_type() {
    let mut registry = GeneratorRegistry::new();
    registry.set_content(ContainerType::Practice, Arc::new(PlaceholderGenerator::new()));
    let narrative = PlaceholderGenerator::new().narrative(&narrative_spec(), "fixture");

    let err = registry
        .generate_content(&content_spec(ContainerType::Discover), &narrative)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Unsupported(ContainerType::Discover)
    ));
    assert_eq!(registry.content_types(), vec![ContainerType::Practice]);
}

#[tokio::test]
async fn registry_without_narrative_generator_fails() {
    let registry = GeneratorRegistry::new();
    assert!(!registry.has_narrative());
    let err = registry
        .generate_narrative(&narrative_spec())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Backend(_)));
}

#[tokio::test]
async fn registry_with_fallback_serves_missing_types() {
    let mut registry = GeneratorRegistry::new();
    registry.enable_fallback(Arc::new(PlaceholderGenerator::new()));
    assert!(registry.fallback_enabled());

    let narrative = registry.generate_narrative(&narrative_spec()).await.unwrap();
    let content = registry
        .generate_content(&content_spec(ContainerType::Assessment), &narrative)
        .await
        .unwrap();
    assert_eq!(fallback_reason(&content.meta.source), "no generator configured");
}

#[tokio::test]
async fn registry_wraps_generators_registered_after_fallback() {
    let mut registry = GeneratorRegistry::new();
    registry.set_retry_config(RetryConfig::disabled());
    registry.enable_fallback(Arc::new(PlaceholderGenerator::new()));
    let failing = AlwaysFails::new(|| GenerationError::Http("refused".into()));
    registry.set_narrative(failing.clone());
    registry.set_content_all(failing.clone());

    let narrative = registry.generate_narrative(&narrative_spec()).await.unwrap();
    let content = registry
        .generate_content(&content_spec(ContainerType::Instructional), &narrative)
        .await
        .unwrap();
    assert!(!narrative.meta.is_authoritative());
    assert!(!content.meta.is_authoritative());
    assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    assert_eq!(registry.content_types().len(), 5);
}
