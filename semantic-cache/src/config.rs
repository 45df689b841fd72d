//! Configuration for the semantic cache client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default semantic cache service URL.
pub const DEFAULT_CACHE_URL: &str = "http://localhost:8081";

/// Configuration for the semantic cache tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether the tier participates in resolution.
    pub enabled: bool,

    /// Base URL of the cache service.
    pub url: String,

    /// Whether the service may answer from a near match.
    pub allow_fallback: bool,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after a failed request.
    pub max_retries: u32,
}

impl SemanticCacheConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_CACHE_URL.to_string(),
            allow_fallback: true,
            timeout_ms: 5_000,
            max_retries: 1,
        }
    }
}
