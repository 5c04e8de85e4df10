//! Cache key derivation.
//!
//! Keys are pure functions of their descriptor tuples:
//!
//! - narrative: `(learner, grade, companion, career, subject-set)`
//! - content: `(learner, grade, skill, container type)`
//!
//! Fields are length-prefixed before hashing, so no two distinct tuples
//! share an encoding (`("ab", "c")` and `("a", "bc")` differ). The digest is
//! SHA-256, which is stable across processes and therefore safe to use as a
//! persistent-store key. Keys carry a schema version so a change to the
//! artifact format can orphan old entries instead of misreading them.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ArtifactKind, ContentSpec, NarrativeSpec};

/// Bumped when the cached artifact layout changes.
const KEY_VERSION: &str = "v1";

/// Number of digest bytes kept in a key (128 bits).
const DIGEST_BYTES: usize = 16;

/// Key of a cached [`Narrative`](crate::Narrative).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NarrativeKey(String);

impl NarrativeKey {
    pub fn derive(spec: &NarrativeSpec) -> Self {
        let mut fields = vec![
            spec.learner_id.as_str(),
            spec.grade_level.as_str(),
            spec.companion_id.as_str(),
            spec.career_id.as_str(),
        ];
        // BTreeSet iteration is sorted, so subject order never matters.
        fields.extend(spec.subjects.iter().map(String::as_str));
        Self(format_key(ArtifactKind::Narrative, &fields))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NarrativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a cached [`ContainerContent`](crate::ContainerContent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn derive(spec: &ContentSpec) -> Self {
        let fields = [
            spec.learner_id.as_str(),
            spec.grade_level.as_str(),
            spec.skill_id.as_str(),
            spec.container_type.as_str(),
        ];
        Self(format_key(ArtifactKind::Content, &fields))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key of either artifact kind, as stored by [`CacheStore`](super::CacheStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum CacheKey {
    Narrative(NarrativeKey),
    Content(ContentKey),
}

impl CacheKey {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            CacheKey::Narrative(_) => ArtifactKind::Narrative,
            CacheKey::Content(_) => ArtifactKind::Content,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CacheKey::Narrative(k) => k.as_str(),
            CacheKey::Content(k) => k.as_str(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NarrativeKey> for CacheKey {
    fn from(key: NarrativeKey) -> Self {
        CacheKey::Narrative(key)
    }
}

impl From<ContentKey> for CacheKey {
    fn from(key: ContentKey) -> Self {
        CacheKey::Content(key)
    }
}

/// `"<kind>-<version>-<hex digest>"`.
///
/// Uses only `[a-z0-9-]` so the key is also a valid file name.
fn format_key(kind: ArtifactKind, fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    format!(
        "{}-{}-{}",
        kind.as_str(),
        KEY_VERSION,
        hex::encode(&digest[..DIGEST_BYTES])
    )
}
