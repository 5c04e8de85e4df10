//! Artifact generation: traits, backend adapters, and decorators.
//!
//! The orchestrator depends only on the [`NarrativeGenerator`] and
//! [`ContentGenerator`] traits, dispatched through a [`GeneratorRegistry`].
//! Generators for a remote service are built by adapting a
//! [`GenerationBackend`] (e.g. [`HttpBackend`]) with [`NarrativeAdapter`]
//! and [`ContainerAdapter`].

mod adapter;
mod backend;
mod fallback;
#[cfg(feature = "http")]
mod http;
mod registry;
mod retry;
mod traits;

pub use adapter::{ContainerAdapter, DEFAULT_GENERATION_TIMEOUT, NarrativeAdapter};
pub use backend::{BackendResponse, Descriptor, GenerationBackend, NarrativeContext};
pub use fallback::{FallbackContentGenerator, FallbackNarrativeGenerator, PlaceholderGenerator};
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use registry::GeneratorRegistry;
pub use retry::{RetryConfig, RetryingContentGenerator, RetryingNarrativeGenerator};
pub use traits::{ContentGenerator, NarrativeGenerator};
