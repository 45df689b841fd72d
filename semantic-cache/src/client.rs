//! HTTP client for the semantic cache service.

use async_trait::async_trait;
use semauth_embeddings::{CacheError, CacheKey, CacheRecord, CacheTier, Embedding, TierPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SemanticCacheConfig;

/// Identifier sent with every cache request.
pub const SOURCE_SYSTEM: &str = "semanticAuth";

/// Request body for both lookups and stores.
#[derive(Debug, Clone, Serialize)]
pub struct CacheRequest<'a> {
    /// Canonical text.
    pub text: &'a str,

    /// Calling system.
    pub source_system: &'a str,

    /// Whether a near match may be returned.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_fallback: bool,

    /// JSON-encoded vector to store. Absent on lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Response body from the cache service.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheResponse {
    /// Whether an entry was found.
    pub cached: bool,

    /// JSON-encoded vector.
    #[serde(default)]
    pub response: Option<String>,

    /// Sector the entry was found in.
    #[serde(default)]
    pub sector_key: Option<String>,

    /// Similarity of the matched entry.
    #[serde(default)]
    pub similarity: Option<f64>,
}

/// Best-effort cache tier backed by the semantic cache service.
pub struct SemanticCacheClient {
    config: SemanticCacheConfig,
    base_url: String,
    client: reqwest::Client,
}

impl SemanticCacheClient {
    /// Create a new client.
    pub fn new(config: SemanticCacheConfig) -> Self {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        Self {
            config: SemanticCacheConfig {
                max_retries: config.max_retries.min(1),
                ..config
            },
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Check whether the service reports itself healthy.
    pub async fn health_check(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        match self
            .client
            .get(format!("{}/cache/health", self.base_url))
            .timeout(self.config.timeout())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Semantic cache health check failed: {e}");
                false
            }
        }
    }

    /// POST to `/cache`, retrying once on transport errors and 5xx answers.
    async fn post(&self, body: &CacheRequest<'_>) -> Result<reqwest::Response, CacheError> {
        let url = format!("{}/cache", self.base_url);
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .post(&url)
                .timeout(self.config.timeout())
                .json(body)
                .send()
                .await;

            match result {
                Ok(response)
                    if response.status().is_server_error()
                        && attempt < self.config.max_retries =>
                {
                    debug!("Semantic cache returned {}, retrying", response.status());
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_retries => {
                    debug!("Semantic cache request failed, retrying: {e}");
                }
                Err(e) => return Err(e.into()),
            }
            attempt += 1;
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CacheError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(CacheError::Unavailable(format!(
        "non-OK status {status}: {text}"
    )))
}

#[async_trait]
impl CacheTier for SemanticCacheClient {
    fn name(&self) -> &str {
        "semantic"
    }

    fn policy(&self) -> TierPolicy {
        TierPolicy::BestEffort
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Embedding>, CacheError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let response = self
            .post(&CacheRequest {
                text: key.text.as_str(),
                source_system: SOURCE_SYSTEM,
                allow_fallback: self.config.allow_fallback,
                response: None,
            })
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        let body: CacheResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Corrupt(format!("cache response: {e}")))?;

        if !body.cached {
            return Ok(None);
        }

        let encoded = body
            .response
            .ok_or_else(|| CacheError::Corrupt("cached entry without response".to_string()))?;
        let vector: Embedding = serde_json::from_str(&encoded)
            .map_err(|e| CacheError::Corrupt(format!("cached vector: {e}")))?;
        if vector.is_empty() {
            return Err(CacheError::Corrupt("cached vector is empty".to_string()));
        }

        debug!(
            sector = body.sector_key.as_deref().unwrap_or("-"),
            similarity = body.similarity.unwrap_or(1.0),
            "Semantic cache hit"
        );
        Ok(Some(vector))
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }

        let encoded = serde_json::to_string(&record.vector)?;
        let response = self
            .post(&CacheRequest {
                text: record.input.as_str(),
                source_system: SOURCE_SYSTEM,
                allow_fallback: false,
                response: Some(encoded),
            })
            .await?;
        ensure_success(response).await?;

        info!(hash = %record.hash, "Stored embedding in semantic cache");
        Ok(())
    }

    async fn probe_health(&self) -> bool {
        self.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use semauth_embeddings::NormalizedText;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SemanticCacheClient {
        SemanticCacheClient::new(SemanticCacheConfig {
            enabled: true,
            url: server.uri(),
            ..SemanticCacheConfig::default()
        })
    }

    fn key(text: &str) -> CacheKey {
        CacheKey::new(NormalizedText::new(text))
    }

    #[tokio::test]
    async fn test_hit_decodes_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .and(body_json(json!({
                "text": "secret1",
                "source_system": "semanticAuth",
                "allow_fallback": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cached": true,
                "response": "[0.5, -0.25, 1.0]",
                "sector_key": "auth",
                "similarity": 0.99
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client(&server).try_get(&key("Secret1")).await.unwrap();
        assert_eq!(vector, Some(vec![0.5, -0.25, 1.0]));
    }

    #[tokio::test]
    async fn test_not_cached_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cached": false})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).try_get(&key("hello")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_tier_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = SemanticCacheClient::new(SemanticCacheConfig {
            enabled: false,
            url: server.uri(),
            ..SemanticCacheConfig::default()
        });

        assert!(!client.is_enabled());
        assert_eq!(client.try_get(&key("hello")).await.unwrap(), None);
        client
            .put(&CacheRecord::new(&key("hello"), vec![1.0]))
            .await
            .unwrap();
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_server_error_retries_once_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let result = client(&server).try_get(&key("hello")).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_single_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cached": true,
                "response": "[1.0]"
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).try_get(&key("hello")).await.unwrap(),
            Some(vec![1.0])
        );
    }

    #[tokio::test]
    async fn test_retry_count_is_capped_at_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = SemanticCacheClient::new(SemanticCacheConfig {
            enabled: true,
            url: server.uri(),
            max_retries: 5,
            ..SemanticCacheConfig::default()
        });

        let result = client.try_get(&key("hello")).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_garbage_vector_is_corrupt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cached": true,
                "response": "not a vector"
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).try_get(&key("hello")).await,
            Err(CacheError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"cached": false}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = SemanticCacheClient::new(SemanticCacheConfig {
            enabled: true,
            url: server.uri(),
            timeout_ms: 50,
            ..SemanticCacheConfig::default()
        });
        assert!(matches!(
            client.try_get(&key("hello")).await,
            Err(CacheError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_put_sends_encoded_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cache"))
            .and(body_json(json!({
                "text": "secret1",
                "source_system": "semanticAuth",
                "response": "[0.5,1.0]"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .put(&CacheRecord::new(&key("Secret1"), vec![0.5, 1.0]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cache/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(client(&server).health_check().await);
    }
}
