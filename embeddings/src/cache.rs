//! Cache tiers for resolved embeddings.
//!
//! Every tier speaks the same [`CacheTier`] interface. What differs is the
//! [`TierPolicy`]: a best-effort tier may fail without affecting resolution,
//! an authoritative tier may not.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::CacheError;
use crate::persist::write_new;
use crate::text::{ContentHash, NormalizedText};

/// How a resolver treats a failing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPolicy {
    /// Read failures count as a miss and writes happen off the request path.
    BestEffort,
    /// Read failures abort the resolution.
    Authoritative,
}

/// Both keys a tier may use to address an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Canonical text, used by text-keyed tiers.
    pub text: NormalizedText,

    /// Digest of the canonical text, used by hash-keyed tiers.
    pub hash: ContentHash,
}

impl CacheKey {
    /// Build the key pair for a canonical text.
    pub fn new(text: NormalizedText) -> Self {
        let hash = text.content_hash();
        Self { text, hash }
    }
}

/// A resolved embedding as stored by a cache tier.
///
/// Records are created once after a provider resolution and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Digest of `input`.
    pub hash: ContentHash,

    /// Canonical text that was embedded.
    pub input: NormalizedText,

    /// The embedding vector.
    pub vector: Embedding,
}

impl CacheRecord {
    /// Create a record from a key and its resolved vector.
    pub fn new(key: &CacheKey, vector: Embedding) -> Self {
        Self {
            hash: key.hash.clone(),
            input: key.text.clone(),
            vector,
        }
    }
}

/// Capability shared by every cache tier.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Failure policy for this tier.
    fn policy(&self) -> TierPolicy;

    /// Whether the tier participates in resolution at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Look up an entry. `Ok(None)` is a clean miss.
    async fn try_get(&self, key: &CacheKey) -> Result<Option<Embedding>, CacheError>;

    /// Store an entry. Existing entries are left untouched.
    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError>;

    /// Informational health probe.
    async fn probe_health(&self) -> bool {
        true
    }
}

/// In-process cache tier backed by a hash map.
#[derive(Clone)]
pub struct MemoryCache {
    records: Arc<RwLock<HashMap<ContentHash, CacheRecord>>>,
    policy: TierPolicy,
}

impl MemoryCache {
    /// Create an empty authoritative in-memory tier.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            policy: TierPolicy::Authoritative,
        }
    }

    /// Override the failure policy.
    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the tier holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Embedding>, CacheError> {
        let records = self.records.read().await;
        Ok(records.get(&key.hash).map(|r| r.vector.clone()))
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let mut records = self.records.write().await;
        records
            .entry(record.hash.clone())
            .or_insert_with(|| record.clone());
        debug!(hash = %record.hash, "Cached embedding in memory");
        Ok(())
    }
}

/// Durable cache tier storing one JSON document per content hash.
pub struct FileCache {
    /// Directory holding `<hash>.json` files.
    root: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a file cache rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        info!("Opened embedding cache at {}", root.display());
        Ok(Self { root })
    }

    fn record_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(format!("{hash}.json"))
    }

    /// Look up a full record by hash.
    pub async fn lookup(&self, hash: &ContentHash) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.record_path(hash);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CacheRecord = serde_json::from_slice(&content)
            .map_err(|e| CacheError::Corrupt(format!("{}: {e}", path.display())))?;

        if &record.hash != hash || record.vector.is_empty() {
            return Err(CacheError::Corrupt(format!(
                "{}: record does not match its key",
                path.display()
            )));
        }

        Ok(Some(record))
    }

    /// Insert a record unless one already exists for its hash.
    pub async fn insert(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.record_path(&record.hash);
        if fs::try_exists(&path).await? {
            debug!(hash = %record.hash, "Embedding already cached on disk");
            return Ok(());
        }

        let content = serde_json::to_vec(record)?;
        if write_new(&self.root, &path, content).await? {
            debug!(hash = %record.hash, "Saved embedding to {}", path.display());
        } else {
            debug!(hash = %record.hash, "Embedding cached concurrently, keeping first copy");
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTier for FileCache {
    fn name(&self) -> &str {
        "local"
    }

    fn policy(&self) -> TierPolicy {
        TierPolicy::Authoritative
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Embedding>, CacheError> {
        Ok(self.lookup(&key.hash).await?.map(|r| r.vector))
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        self.insert(record).await
    }
}
