//! Embedding resolution pipeline.
//!
//! ```text
//! raw ──► NormalizedText ──► moderation ──► tier 1 ──► tier 2 ──► provider
//!                               │ reject      │ hit       │ hit       │
//!                               ▼             ▼           ▼           ▼
//!                         ContentRejected   vector      vector   write-back
//! ```
//!
//! Tiers are consulted in registration order. A best-effort tier that fails
//! is skipped; an authoritative tier that fails aborts the resolution so an
//! outage of the durable store cannot turn into a flood of provider calls.

use std::future::Future;
use std::sync::Arc;

use semauth_embeddings::{
    CacheKey, CacheRecord, CacheTier, Embedding, EmbeddingProvider, EmbeddingRequest,
    NormalizedText, TierPolicy,
};
use semauth_moderation::ModerationGate;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result, StorageError};
use crate::writeback::WriteBackQueue;

/// Orchestrates moderation, cache tiers and the provider.
///
/// The resolver holds no per-request state; every collaborator is injected.
pub struct EmbeddingResolver {
    moderation: Arc<dyn ModerationGate>,
    tiers: Vec<Arc<dyn CacheTier>>,
    provider: Arc<dyn EmbeddingProvider>,
    write_back: Arc<WriteBackQueue>,
}

impl EmbeddingResolver {
    /// Create a resolver with no cache tiers.
    pub fn new(
        moderation: Arc<dyn ModerationGate>,
        provider: Arc<dyn EmbeddingProvider>,
        write_back: Arc<WriteBackQueue>,
    ) -> Self {
        Self {
            moderation,
            tiers: Vec::new(),
            provider,
            write_back,
        }
    }

    /// Append a cache tier. Tiers are consulted in the order they are added.
    pub fn with_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Queue used for best-effort write-back.
    pub fn write_back(&self) -> &Arc<WriteBackQueue> {
        &self.write_back
    }

    /// Resolve raw input to an embedding.
    pub async fn resolve(&self, raw: &str) -> Result<Embedding> {
        self.resolve_with_cancel(raw, &CancellationToken::new())
            .await
    }

    /// Resolve raw input, abandoning in-flight calls when `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<Embedding> {
        let key = CacheKey::new(NormalizedText::new(raw));

        let verdict = guarded(cancel, self.moderation.check(&key.text)).await??;
        if !verdict.allowed {
            info!(hash = %key.hash, "Input rejected by moderation");
            return Err(AuthError::ContentRejected {
                message: verdict.rejection_message(),
            });
        }

        for tier in self.enabled_tiers() {
            match guarded(cancel, tier.try_get(&key)).await? {
                Ok(Some(vector)) => {
                    debug!(tier = tier.name(), hash = %key.hash, "Cache hit");
                    return Ok(vector);
                }
                Ok(None) => debug!(tier = tier.name(), hash = %key.hash, "Cache miss"),
                Err(e) => match tier.policy() {
                    TierPolicy::BestEffort => {
                        warn!(tier = tier.name(), "Cache lookup failed, falling back: {e}");
                    }
                    TierPolicy::Authoritative => {
                        return Err(StorageError::Cache(e).into());
                    }
                },
            }
        }

        let request = EmbeddingRequest::new(key.text.clone());
        let response = guarded(cancel, self.provider.embed(request)).await??;
        info!(
            provider = self.provider.name(),
            hash = %key.hash,
            dimension = response.dimension,
            "Resolved embedding from provider"
        );

        let record = CacheRecord::new(&key, response.embedding);
        self.populate(&record).await;
        Ok(record.vector)
    }

    fn enabled_tiers(&self) -> impl Iterator<Item = &Arc<dyn CacheTier>> {
        self.tiers.iter().filter(|tier| tier.is_enabled())
    }

    /// Write a fresh record to every tier. Never fails.
    async fn populate(&self, record: &CacheRecord) {
        for tier in self.enabled_tiers() {
            match tier.policy() {
                TierPolicy::Authoritative => {
                    if let Err(e) = tier.put(record).await {
                        warn!(tier = tier.name(), hash = %record.hash, "Failed to cache embedding: {e}");
                    }
                }
                TierPolicy::BestEffort => {
                    self.write_back.submit(Arc::clone(tier), record.clone());
                }
            }
        }
    }

    /// Probe the moderation service and every enabled tier.
    ///
    /// Results are informational; an unhealthy service does not stop the
    /// resolver from trying it on the next request.
    pub async fn probe_services(&self) -> Vec<ServiceStatus> {
        let mut statuses = Vec::with_capacity(self.tiers.len() + 1);

        let moderation = self.moderation.probe_health().await;
        if moderation.is_none() {
            warn!("Moderation service is degraded; resolutions will fail until it recovers");
        }
        statuses.push(ServiceStatus {
            name: "moderation".to_string(),
            healthy: moderation.is_some(),
            detail: moderation.and_then(|health| health.version),
        });

        for tier in self.enabled_tiers() {
            let healthy = tier.probe_health().await;
            if healthy {
                info!(tier = tier.name(), "Cache tier is healthy");
            } else {
                warn!(
                    tier = tier.name(),
                    "Cache tier is not healthy, continuing with fallback"
                );
            }
            statuses.push(ServiceStatus {
                name: tier.name().to_string(),
                healthy,
                detail: None,
            });
        }

        statuses
    }
}

/// Health of one backing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Service or tier name.
    pub name: String,

    /// Whether the probe succeeded.
    pub healthy: bool,

    /// Version or other detail reported by the service.
    pub detail: Option<String>,
}

/// Run `fut` unless `cancel` fires first.
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        output = fut => Ok(output),
    }
}
