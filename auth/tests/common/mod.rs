//! Test doubles shared by the pipeline integration tests.
//!
//! Every fake counts its calls so tests can assert which stages ran.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use semauth_auth::config::WriteBackConfig;
use semauth_auth::{
    Authenticator, EmbeddingResolver, MemoryAuditLog, MemoryUserStore, Threshold, WriteBackQueue,
};
use semauth_embeddings::{
    CacheError, CacheKey, CacheRecord, CacheTier, Embedding, EmbeddingError, EmbeddingProvider,
    EmbeddingRequest, EmbeddingResponse, MemoryCache, NormalizedText, TierPolicy,
};
use semauth_moderation::{ModerationError, ModerationGate, ModerationVerdict};

/// Letter and digit frequencies. Identical canonical texts embed identically,
/// unrelated texts land well apart.
pub fn char_frequency(text: &str) -> Embedding {
    let mut vector = vec![0.0; 36];
    for c in text.chars() {
        if let Some(index) = match c {
            'a'..='z' => Some(c as usize - 'a' as usize),
            '0'..='9' => Some(26 + c as usize - '0' as usize),
            _ => None,
        } {
            vector[index] += 1.0;
        }
    }
    vector
}

/// Provider that embeds by character frequency.
#[derive(Default)]
pub struct CountingProvider {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl CountingProvider {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn default_model(&self) -> &str {
        "char-frequency"
    }

    fn default_dimension(&self) -> usize {
        36
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let embedding = char_frequency(request.text.as_str());
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.default_model().to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Moderation gate rejecting any text containing a blocked word.
#[derive(Default)]
pub struct CountingModeration {
    pub calls: AtomicUsize,
    pub blocked: Vec<String>,
    pub unavailable: bool,
}

impl CountingModeration {
    pub fn blocking(word: &str) -> Self {
        Self {
            blocked: vec![word.to_string()],
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationGate for CountingModeration {
    async fn check(&self, text: &NormalizedText) -> Result<ModerationVerdict, ModerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ModerationError::Status { status: 503 });
        }
        if self.blocked.iter().any(|word| text.as_str().contains(word.as_str())) {
            return Ok(ModerationVerdict::reject("blocked word"));
        }
        Ok(ModerationVerdict::allow())
    }
}

/// Memory-backed tier that counts lookups and writes. It can fail every
/// call, or only writes.
pub struct CountingTier {
    pub name: &'static str,
    pub policy: TierPolicy,
    pub inner: MemoryCache,
    pub failing: bool,
    pub fail_puts: bool,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl CountingTier {
    pub fn new(name: &'static str, policy: TierPolicy) -> Self {
        Self {
            name,
            policy,
            inner: MemoryCache::new(),
            failing: false,
            fail_puts: false,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, policy: TierPolicy) -> Self {
        Self {
            failing: true,
            ..Self::new(name, policy)
        }
    }

    pub fn failing_puts(name: &'static str, policy: TierPolicy) -> Self {
        Self {
            fail_puts: true,
            ..Self::new(name, policy)
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheTier for CountingTier {
    fn name(&self) -> &str {
        self.name
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Embedding>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(CacheError::Unavailable(format!("{} is down", self.name)));
        }
        self.inner.try_get(key).await
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing || self.fail_puts {
            return Err(CacheError::Unavailable(format!("{} is down", self.name)));
        }
        self.inner.put(record).await
    }
}

/// A resolver wired with fakes, keeping handles to each of them.
pub struct Harness {
    pub moderation: Arc<CountingModeration>,
    pub provider: Arc<CountingProvider>,
    pub semantic: Arc<CountingTier>,
    pub local: Arc<CountingTier>,
    pub resolver: EmbeddingResolver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            CountingModeration::default(),
            CountingProvider::default(),
            CountingTier::new("semantic", TierPolicy::BestEffort),
            CountingTier::new("local", TierPolicy::Authoritative),
        )
    }

    pub fn with(
        moderation: CountingModeration,
        provider: CountingProvider,
        semantic: CountingTier,
        local: CountingTier,
    ) -> Self {
        let moderation = Arc::new(moderation);
        let provider = Arc::new(provider);
        let semantic = Arc::new(semantic);
        let local = Arc::new(local);
        let write_back = Arc::new(WriteBackQueue::start(&WriteBackConfig {
            workers: 1,
            capacity: 16,
        }));

        let resolver = EmbeddingResolver::new(moderation.clone(), provider.clone(), write_back)
            .with_tier(semantic.clone())
            .with_tier(local.clone());

        Self {
            moderation,
            provider,
            semantic,
            local,
            resolver,
        }
    }

    /// Turn the harness into an authenticator over in-memory stores.
    pub fn into_authenticator(self) -> (Authenticator, MemoryAuditLog, Arc<CountingProvider>) {
        let audit = MemoryAuditLog::new();
        let provider = self.provider;
        let auth = Authenticator::new(
            self.resolver,
            Arc::new(MemoryUserStore::new()),
            Arc::new(audit.clone()),
            Threshold::DEFAULT,
        );
        (auth, audit, provider)
    }
}
