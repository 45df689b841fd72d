//! Moderation service client.

use std::time::Duration;

use async_trait::async_trait;
use semauth_embeddings::NormalizedText;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ModerationError, Result};

/// Identifier sent with every moderation request.
pub const SENDING_SYSTEM: &str = "semantic-auth";

/// Default per-request timeout for moderation calls.
pub const DEFAULT_MODERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Message used when a rejection carries no explanation.
const DEFAULT_REJECTION_MESSAGE: &str = "content not allowed by moderation service";

/// Verdict returned by the moderation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Whether the content may be embedded.
    pub allowed: bool,

    /// Explanation, usually present on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Version of the moderation policy that produced the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModerationVerdict {
    /// An approving verdict.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
            version: None,
        }
    }

    /// A rejecting verdict with an explanation.
    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
            version: None,
        }
    }

    /// The message to surface when this verdict rejects content.
    pub fn rejection_message(&self) -> String {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => DEFAULT_REJECTION_MESSAGE.to_string(),
        }
    }
}

/// Result of the boot-time health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status reported by the service.
    pub status: String,

    /// Service version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Approves or rejects text before it is embedded.
#[async_trait]
pub trait ModerationGate: Send + Sync {
    /// Check canonical text. Called once per resolution, never cached.
    async fn check(&self, text: &NormalizedText) -> Result<ModerationVerdict>;

    /// Informational health probe. Never fails; `None` means degraded.
    async fn probe_health(&self) -> Option<HealthStatus> {
        None
    }
}

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    content: &'a str,
    sending_system: &'a str,
}

/// HTTP client for the moderation service.
pub struct ModerationClient {
    /// Base URL without trailing slash.
    base_url: Option<String>,

    /// HTTP client.
    client: reqwest::Client,

    /// Per-request timeout.
    timeout: Duration,
}

impl ModerationClient {
    /// Create a client. A missing URL is reported on first check.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            client: reqwest::Client::new(),
            timeout: DEFAULT_MODERATION_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a service URL is configured.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(ModerationError::NotConfigured)
    }
}

#[async_trait]
impl ModerationGate for ModerationClient {
    async fn check(&self, text: &NormalizedText) -> Result<ModerationVerdict> {
        let url = format!("{}/api/moderate", self.base_url()?);

        debug!(chars = text.char_count(), "Checking content with moderation service");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ModerationRequest {
                content: text.as_str(),
                sending_system: SENDING_SYSTEM,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModerationError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let verdict: ModerationVerdict = serde_json::from_slice(&bytes)
            .map_err(|e| ModerationError::InvalidResponse(e.to_string()))?;

        if !verdict.allowed {
            info!(
                version = verdict.version.as_deref().unwrap_or("unknown"),
                "Moderation service rejected content"
            );
        }

        Ok(verdict)
    }

    async fn probe_health(&self) -> Option<HealthStatus> {
        let Ok(base_url) = self.base_url() else {
            warn!("MODERATION_SERVICE_URL not set, moderation checks will fail");
            return None;
        };

        let response = match self
            .client
            .get(format!("{base_url}/api/health"))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Moderation service health check failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Moderation service health check returned status {}",
                response.status()
            );
            return None;
        }

        match response.json::<HealthStatus>().await {
            Ok(health) => {
                info!(
                    "Moderation service health check: status={}, version={}",
                    health.status,
                    health.version.as_deref().unwrap_or("unknown")
                );
                Some(health)
            }
            Err(e) => {
                warn!("Moderation service health response unreadable: {e}");
                None
            }
        }
    }
}
