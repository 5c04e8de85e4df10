//! Skald error types

use std::time::Duration;

use crate::types::{ArtifactKind, ContainerType};

/// Top-level error for caller mistakes: invalid requests, bad configuration,
/// mismatched cache writes.
///
/// Generation failures inside a journey are never returned through this type;
/// they are collected per coordinate in [`JourneyResult`](crate::JourneyResult).
#[derive(Debug, thiserror::Error)]
pub enum SkaldError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a single generation call.
///
/// Fatal for the artifact being generated. Only fatal for a whole journey
/// when raised while generating the shared narrative.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    // Backend/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("empty response from backend")]
    EmptyResponse,

    #[error("backend error: {0}")]
    Backend(String),

    // Configuration errors
    #[error("no generator registered for container type '{0}'")]
    Unsupported(ContainerType),

    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

impl GenerationError {
    /// Whether retrying the same call may succeed.
    ///
    /// Network failures, timeouts, rate limits and 5xx responses are
    /// transient. Schema violations and auth failures are not: the backend
    /// would answer the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Http(_)
            | GenerationError::RateLimited { .. }
            | GenerationError::Timeout(_) => true,
            GenerationError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Backend-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A generated artifact did not match the schema for its kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} artifact failed validation: {reason}")]
pub struct SchemaError {
    /// Which artifact schema was violated.
    pub kind: SchemaKind,
    /// Human-readable description of the violation.
    pub reason: String,
}

impl SchemaError {
    pub fn new(kind: SchemaKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Schema identity: the narrative schema or one container schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Narrative,
    Container(ContainerType),
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaKind::Narrative => f.write_str("narrative"),
            SchemaKind::Container(c) => write!(f, "{c} container"),
        }
    }
}

/// Failure of a session or persistent key/value tier.
///
/// Never surfaced from cache reads; the cache logs it and degrades to a
/// miss or a dropped write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Cache payload did not match the kind implied by its key.
pub(crate) fn kind_mismatch(expected: ArtifactKind, found: ArtifactKind) -> SkaldError {
    SkaldError::InvalidInput(format!(
        "cache key is for {expected} artifacts but payload is {found}"
    ))
}

/// Result type alias for Skald operations
pub type Result<T> = std::result::Result<T, SkaldError>;

/// Result type alias for a single generation call
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;
