//! Configuration for semantic authentication.
//!
//! Configuration is resolved once at process start and handed to the
//! pipeline as an explicit value.

use std::path::PathBuf;
use std::time::Duration;

use semauth_embeddings::DEFAULT_MODEL;
use semauth_embeddings::provider::{DEFAULT_PROVIDER_TIMEOUT, OPENAI_BASE_URL};
use semauth_semantic_cache::SemanticCacheConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decision::Threshold;
use crate::error::{AuthError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Moderation service settings.
    pub moderation: ModerationConfig,

    /// Semantic cache tier settings.
    pub semantic_cache: SemanticCacheConfig,

    /// Embedding provider settings.
    pub provider: ProviderConfig,

    /// Decision settings.
    pub decision: DecisionConfig,

    /// Local storage settings.
    pub storage: StorageConfig,

    /// Background write-back settings.
    pub write_back: WriteBackConfig,
}

impl AuthConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unparseable flags and numbers are logged and left at their default;
    /// an out-of-range threshold is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.moderation.url = get("MODERATION_SERVICE_URL");
        if config.moderation.url.is_none() {
            warn!("MODERATION_SERVICE_URL environment variable not set");
        }

        if let Some(value) = get("SEMANTIC_CACHE_ENABLED") {
            config.semantic_cache.enabled = parse_or_default(
                "SEMANTIC_CACHE_ENABLED",
                &value,
                config.semantic_cache.enabled,
                parse_bool,
            );
        }
        if let Some(url) = get("SEMANTIC_CACHE_URL") {
            config.semantic_cache.url = url;
        }
        if let Some(value) = get("SEMANTIC_CACHE_ALLOW_FALLBACK") {
            config.semantic_cache.allow_fallback = parse_or_default(
                "SEMANTIC_CACHE_ALLOW_FALLBACK",
                &value,
                config.semantic_cache.allow_fallback,
                parse_bool,
            );
        }
        if let Some(value) = get("SEMANTIC_CACHE_THRESHOLD") {
            let threshold = parse_or_default(
                "SEMANTIC_CACHE_THRESHOLD",
                &value,
                config.decision.default_threshold,
                |v| v.trim().parse::<f32>().ok(),
            );
            Threshold::new(threshold).map_err(|_| {
                AuthError::Config(format!(
                    "SEMANTIC_CACHE_THRESHOLD must be within [0, 1], got {threshold}"
                ))
            })?;
            if threshold > 0.0 {
                config.decision.default_threshold = threshold;
            }
        }

        config.provider.api_key = get("OPENAI_KEY").or_else(|| get("OPENAI_API_KEY"));
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.provider.base_url = url;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            config.provider.model = model;
        }

        if let Some(dir) = get("SEMANTIC_AUTH_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Validated default threshold.
    pub fn default_threshold(&self) -> Result<Threshold> {
        Threshold::new(self.decision.default_threshold)
            .map_err(|e| AuthError::Config(e.to_string()))
    }
}

/// Moderation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Base URL of the moderation service.
    pub url: Option<String>,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ModerationConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 10_000,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bearer credential. Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// API base URL.
    pub base_url: String,

    /// Embedding model.
    pub model: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ProviderConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_PROVIDER_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Decision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Threshold used when a caller does not supply one.
    pub default_threshold: f32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            default_threshold: Threshold::DEFAULT.value(),
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for embeddings, users and the attempt log.
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Directory of the local embedding cache.
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }

    /// Directory of registered users.
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    /// Path of the login attempt log.
    pub fn attempts_path(&self) -> PathBuf {
        self.data_dir.join("login_attempts.jsonl")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Background write-back settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteBackConfig {
    /// Number of worker tasks.
    pub workers: usize,

    /// Maximum queued writes before new ones are dropped.
    pub capacity: usize,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 256,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_or_default<T: Copy + std::fmt::Display>(
    key: &str,
    value: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    parse(value).unwrap_or_else(|| {
        warn!("Invalid {key} value: {value}, defaulting to {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AuthConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert!(!config.semantic_cache.enabled);
        assert_eq!(config.semantic_cache.url, "http://localhost:8081");
        assert!(config.semantic_cache.allow_fallback);
        assert_eq!(config.decision.default_threshold, 0.88);
        assert_eq!(config.moderation.url, None);
        assert_eq!(config.provider.api_key, None);
        assert_eq!(config.provider.model, "text-embedding-3-small");
    }

    #[test]
    fn test_environment_overrides() {
        let config = config_from(&[
            ("MODERATION_SERVICE_URL", "http://moderation:9000"),
            ("SEMANTIC_CACHE_ENABLED", "true"),
            ("SEMANTIC_CACHE_URL", "http://cache:8081"),
            ("SEMANTIC_CACHE_THRESHOLD", "0.9"),
            ("SEMANTIC_CACHE_ALLOW_FALLBACK", "0"),
            ("OPENAI_KEY", "sk-test"),
            ("SEMANTIC_AUTH_DATA_DIR", "/var/lib/semauth"),
        ])
        .unwrap();

        assert_eq!(config.moderation.url.as_deref(), Some("http://moderation:9000"));
        assert!(config.semantic_cache.enabled);
        assert_eq!(config.semantic_cache.url, "http://cache:8081");
        assert!(!config.semantic_cache.allow_fallback);
        assert_eq!(config.decision.default_threshold, 0.9);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.storage.attempts_path(),
            PathBuf::from("/var/lib/semauth/login_attempts.jsonl")
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("SEMANTIC_CACHE_ENABLED", "yes please"),
            ("SEMANTIC_CACHE_THRESHOLD", "high"),
        ])
        .unwrap();

        assert!(!config.semantic_cache.enabled);
        assert_eq!(config.decision.default_threshold, 0.88);
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = config_from(&[("SEMANTIC_CACHE_THRESHOLD", "1.5")]).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_zero_threshold_keeps_default() {
        let config = config_from(&[("SEMANTIC_CACHE_THRESHOLD", "0")]).unwrap();
        assert_eq!(config.decision.default_threshold, 0.88);
    }

    #[test]
    fn test_api_key_fallback_variable() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-alt")]).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-alt"));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = AuthConfig::default();
        config.provider.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
