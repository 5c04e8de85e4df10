//! The unit stored and returned by [`CacheStore`](super::CacheStore).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CacheKey;
use crate::types::{ArtifactKind, ContainerContent, Narrative};

/// Cache tiers, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Session,
    Persistent,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Session => "session",
            Tier::Persistent => "persistent",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached payload of either artifact kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "artifact", rename_all = "lowercase")]
pub enum CachedArtifact {
    Narrative(Narrative),
    Content(ContainerContent),
}

impl CachedArtifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            CachedArtifact::Narrative(_) => ArtifactKind::Narrative,
            CachedArtifact::Content(_) => ArtifactKind::Content,
        }
    }

    pub fn into_narrative(self) -> Option<Narrative> {
        match self {
            CachedArtifact::Narrative(n) => Some(n),
            CachedArtifact::Content(_) => None,
        }
    }

    pub fn into_content(self) -> Option<ContainerContent> {
        match self {
            CachedArtifact::Content(c) => Some(c),
            CachedArtifact::Narrative(_) => None,
        }
    }
}

/// A cached artifact with its expiry window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: CachedArtifact,
    /// Tier the entry was found in on the read that returned it.
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may be served as a hit at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Same entry, relabelled with the tier it was read from.
    pub(crate) fn found_in(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }
}
