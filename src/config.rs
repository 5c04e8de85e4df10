//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (if provided)
//! 2. `~/.skald/config.toml` (user)
//! 3. `/etc/skald/config.toml` (system)
//!
//! Every section is optional. A minimal file wiring an HTTP backend with a
//! persistent cache looks like:
//!
//! ```toml
//! [cache]
//! persistent_dir = "/var/cache/skald"
//!
//! [backend]
//! url = "https://generation.internal"
//! api_key_env = "SKALD_API_KEY"
//! ```
//!
//! The backend API key is never stored in the file; it is read from the
//! environment variable named by `backend.api_key_env`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_SESSION_QUOTA_BYTES, EvictionPolicy};
use crate::generation::RetryConfig;
use crate::types::Pricing;
use crate::{Result, SkaldError};

const DAY_SECS: u64 = 24 * 3600;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub backend: Option<BackendSection>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Memory-tier capacity in entries (default: 100).
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Narrative lifetime in seconds (default: 30 days).
    #[serde(default = "default_narrative_ttl")]
    pub narrative_ttl_secs: u64,
    /// Content lifetime in seconds (default: 7 days).
    #[serde(default = "default_content_ttl")]
    pub content_ttl_secs: u64,
    /// Memory-tier eviction: "fifo" or "lru" (default: "fifo").
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// Whether to run a session tier (default: true).
    #[serde(default = "default_true")]
    pub session: bool,
    /// Session-tier quota in bytes (default: 5 MiB).
    #[serde(default = "default_session_quota")]
    pub session_quota_bytes: u64,
    /// Directory for the file-backed persistent tier. No persistent tier
    /// when unset.
    #[serde(default)]
    pub persistent_dir: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
            narrative_ttl_secs: default_narrative_ttl(),
            content_ttl_secs: default_content_ttl(),
            eviction: EvictionPolicy::default(),
            session: true,
            session_quota_bytes: default_session_quota(),
            persistent_dir: None,
        }
    }
}

impl CacheSection {
    /// The programmatic cache configuration for this section.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .memory_capacity(self.memory_capacity)
            .narrative_ttl(Duration::from_secs(self.narrative_ttl_secs))
            .content_ttl(Duration::from_secs(self.content_ttl_secs))
            .eviction(self.eviction)
    }
}

fn default_memory_capacity() -> usize {
    100
}

fn default_narrative_ttl() -> u64 {
    30 * DAY_SECS
}

fn default_content_ttl() -> u64 {
    7 * DAY_SECS
}

fn default_session_quota() -> u64 {
    DEFAULT_SESSION_QUOTA_BYTES
}

fn default_true() -> bool {
    true
}

/// `[generation]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    /// Maximum concurrent container generations (default: 4).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-call timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Serve placeholders instead of failing (default: false).
    #[serde(default)]
    pub fallback: bool,
    /// `[generation.retry]`; no retries when absent.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout(),
            fallback: false,
            retry: None,
        }
    }
}

impl GenerationSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout() -> u64 {
    60
}

/// `[backend]` section: the HTTP generation service.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    /// Service base URL.
    pub url: String,
    /// Environment variable holding the bearer token (default: `SKALD_API_KEY`).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl BackendSection {
    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_api_key_env() -> String {
    "SKALD_API_KEY".to_string()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.skald/config.toml`
    /// 3. `/etc/skald/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            SkaldError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| SkaldError::Configuration(format!("In config file {path:?}: {e}")))
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| SkaldError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.cache.cache_config().validate()?;
        self.pricing.validate()?;
        if self.generation.max_concurrency == 0 {
            return Err(SkaldError::Configuration(
                "generation.max_concurrency must be at least 1".into(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(SkaldError::Configuration(
                "generation.timeout_secs must be positive".into(),
            ));
        }
        if let Some(backend) = &self.backend
            && backend.url.trim().is_empty()
        {
            return Err(SkaldError::Configuration("backend.url must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(SkaldError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".skald").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/skald/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(SkaldError::Configuration(
            "No config file found. Create ~/.skald/config.toml or /etc/skald/config.toml"
                .to_string(),
        ))
    }
}
