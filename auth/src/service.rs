//! Registration, login and attempt reporting on top of the resolver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use semauth_embeddings::{CacheTier, FileCache, NormalizedText, OpenAIProvider};
use semauth_moderation::ModerationClient;
use semauth_semantic_cache::SemanticCacheClient;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audit::{AuditLog, FileAuditLog};
use crate::config::AuthConfig;
use crate::decision::{AuthDecision, Threshold};
use crate::error::{AuthError, Result, StorageError};
use crate::resolver::{EmbeddingResolver, ServiceStatus};
use crate::users::{FileUserStore, UserRecord, UserStore};
use crate::writeback::{ShutdownMode, WriteBackQueue};

/// Maximum number of attempts returned by [`Authenticator::report`].
pub const REPORT_LIMIT: usize = 50;

/// Result of a completed login comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// Canonical user name.
    pub username: String,

    /// Cosine similarity between the stored and guessed embeddings.
    pub similarity: f32,

    /// Threshold the similarity was compared against.
    pub threshold: Threshold,

    /// Whether the login passed.
    pub passed: bool,
}

/// One line of an attempt report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    /// Subject of the attempt.
    pub username: String,

    /// Input as submitted.
    pub input: String,

    /// Recorded similarity, absent if the comparison failed.
    pub similarity: Option<f32>,

    /// Whether the similarity meets the report threshold.
    pub passed: bool,

    /// When the attempt was made.
    pub timestamp: DateTime<Utc>,
}

/// Similarity-gated authentication service.
pub struct Authenticator {
    resolver: EmbeddingResolver,
    decision: AuthDecision,
    users: Arc<dyn UserStore>,
    audit: Arc<dyn AuditLog>,
    default_threshold: Threshold,
}

impl Authenticator {
    /// Assemble a service from its parts.
    pub fn new(
        resolver: EmbeddingResolver,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditLog>,
        default_threshold: Threshold,
    ) -> Self {
        Self {
            resolver,
            decision: AuthDecision::new(Arc::clone(&audit)),
            users,
            audit,
            default_threshold,
        }
    }

    /// Wire the production stack from configuration.
    ///
    /// The semantic cache is consulted before the local file cache. Must be
    /// called from within a Tokio runtime.
    pub async fn open(config: &AuthConfig) -> Result<Self> {
        let default_threshold = config.default_threshold()?;
        let storage = &config.storage;

        let local = FileCache::open(storage.embeddings_dir())
            .await
            .map_err(StorageError::from)?;
        let users = FileUserStore::open(storage.users_dir()).await?;
        let audit = FileAuditLog::open(storage.attempts_path()).await?;

        let moderation = ModerationClient::new(config.moderation.url.clone())
            .with_timeout(config.moderation.timeout());
        let semantic = SemanticCacheClient::new(config.semantic_cache.clone());
        let provider = OpenAIProvider::new(config.provider.api_key.clone())
            .with_base_url(config.provider.base_url.clone())
            .with_model(config.provider.model.clone())
            .with_timeout(config.provider.timeout());
        let write_back = WriteBackQueue::start(&config.write_back);

        let resolver =
            EmbeddingResolver::new(Arc::new(moderation), Arc::new(provider), Arc::new(write_back))
                .with_tier(Arc::new(semantic) as Arc<dyn CacheTier>)
                .with_tier(Arc::new(local) as Arc<dyn CacheTier>);

        info!(
            data_dir = %storage.data_dir.display(),
            semantic_cache = config.semantic_cache.enabled,
            threshold = %default_threshold,
            "Semantic authentication ready"
        );

        Ok(Self::new(
            resolver,
            Arc::new(users),
            Arc::new(audit),
            default_threshold,
        ))
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &EmbeddingResolver {
        &self.resolver
    }

    /// Register a user whose password is embedded through the resolver.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserRecord> {
        self.register_with_cancel(username, password, &CancellationToken::new())
            .await
    }

    /// Register a user, abandoning the resolution when `cancel` fires.
    pub async fn register_with_cancel(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<UserRecord> {
        let username = canonical_username(username)?;
        let password = required_password(password)?;

        if self.users.get(&username).await?.is_some() {
            return Err(AuthError::UserExists(username));
        }

        let vector = self.resolver.resolve_with_cancel(password, cancel).await?;
        let user = UserRecord {
            hash: NormalizedText::new(password).content_hash(),
            username,
            vector,
            created_at: Utc::now(),
        };

        if !self.users.create(&user).await? {
            return Err(AuthError::UserExists(user.username));
        }

        info!(username = %user.username, "Registered user");
        Ok(user)
    }

    /// Compare a password guess against the user's stored embedding.
    ///
    /// `threshold` of `None` or `0` selects the configured default.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        threshold: Option<f32>,
    ) -> Result<LoginOutcome> {
        self.login_with_cancel(username, password, threshold, &CancellationToken::new())
            .await
    }

    /// Log in, abandoning the resolution when `cancel` fires.
    pub async fn login_with_cancel(
        &self,
        username: &str,
        password: &str,
        threshold: Option<f32>,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome> {
        let username = canonical_username(username)?;
        let password = required_password(password)?;
        let threshold = Threshold::or_default(threshold, self.default_threshold)?;

        let user = self
            .users
            .get(&username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(username.clone()))?;

        let guess = self.resolver.resolve_with_cancel(password, cancel).await?;
        let decision = self
            .decision
            .decide(&username, password, &user.vector, &guess, threshold)
            .await?;

        info!(
            username = %username,
            similarity = decision.similarity,
            %threshold,
            passed = decision.passed,
            "Login attempt evaluated"
        );

        Ok(LoginOutcome {
            username,
            similarity: decision.similarity,
            threshold,
            passed: decision.passed,
        })
    }

    /// Recent attempts, newest first, judged against `threshold`.
    pub async fn report(
        &self,
        username: Option<&str>,
        threshold: Option<f32>,
    ) -> Result<Vec<AttemptSummary>> {
        let threshold = Threshold::or_default(threshold, self.default_threshold)?;
        let subject = username.map(canonical_username).transpose()?;

        let records = self.audit.recent(subject.as_deref(), REPORT_LIMIT).await?;
        debug!(count = records.len(), "Loaded login attempts");

        Ok(records
            .into_iter()
            .map(|record| AttemptSummary {
                passed: record
                    .similarity
                    .is_some_and(|similarity| similarity >= threshold.value()),
                username: record.subject,
                input: record.input,
                similarity: record.similarity,
                timestamp: record.timestamp,
            })
            .collect())
    }

    /// Probe every backing service.
    pub async fn probe_services(&self) -> Vec<ServiceStatus> {
        self.resolver.probe_services().await
    }

    /// Stop background cache writes.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        self.resolver.write_back().shutdown(mode).await;
    }
}

fn canonical_username(raw: &str) -> Result<String> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(AuthError::InvalidInput("username is required".to_string()));
    }
    Ok(username)
}

fn required_password(raw: &str) -> Result<&str> {
    let password = raw.trim();
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".to_string()));
    }
    Ok(password)
}
