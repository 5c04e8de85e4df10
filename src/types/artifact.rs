//! Metadata shared by every generated artifact.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two cached artifact families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Narrative,
    Content,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Narrative => "narrative",
            ArtifactKind::Content => "content",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an artifact came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Produced by the live generation backend.
    Live,
    /// Deterministic placeholder. Not authoritative; never cached.
    Fallback { reason: String },
}

/// Provenance and pricing of a generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Cost of the generation call that produced this artifact.
    pub cost: f64,
    pub source: ArtifactSource,
    /// Backend model identifier, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ArtifactMeta {
    /// Metadata for a live backend artifact.
    pub fn live(cost: f64, model: Option<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            cost,
            source: ArtifactSource::Live,
            model,
            generated_at,
        }
    }

    /// Metadata for a zero-cost placeholder.
    pub fn fallback(reason: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            cost: 0.0,
            source: ArtifactSource::Fallback {
                reason: reason.into(),
            },
            model: None,
            generated_at,
        }
    }

    /// Whether this artifact came from the live backend.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.source, ArtifactSource::Live)
    }
}
