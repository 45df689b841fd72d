//! Registered users and their stored embeddings.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semauth_embeddings::persist::write_new;
use semauth_embeddings::{ContentHash, Embedding, NormalizedText};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageError;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Canonical user name.
    pub username: String,

    /// Digest of the canonical password.
    pub hash: ContentHash,

    /// Embedding of the password at registration time.
    pub vector: Embedding,

    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Storage for registered users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user by canonical name.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Create a user. Returns `false` if the name is already taken.
    async fn create(&self, user: &UserRecord) -> Result<bool, StorageError>;
}

/// In-memory user store.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, user: &UserRecord) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Ok(false);
        }
        users.insert(user.username.clone(), user.clone());
        Ok(true)
    }
}

/// User store keeping one JSON document per user.
///
/// Files are named after the digest of the user name so arbitrary names
/// never reach the file system. A user file is published only once fully
/// written.
pub struct FileUserStore {
    root: PathBuf,
}

impl FileUserStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn user_path(&self, username: &str) -> PathBuf {
        let digest = NormalizedText::new(username).content_hash();
        self.root.join(format!("{digest}.json"))
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        match fs::read(self.user_path(username)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, user: &UserRecord) -> Result<bool, StorageError> {
        let content = serde_json::to_vec_pretty(user)?;
        let created = write_new(&self.root, &self.user_path(&user.username), content).await?;
        if created {
            debug!(username = %user.username, "Stored user");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            hash: NormalizedText::new("secret1").content_hash(),
            vector: vec![0.1, 0.2],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicates() {
        let store = MemoryUserStore::new();
        assert!(store.create(&user("alice")).await.unwrap());
        assert!(!store.create(&user("alice")).await.unwrap());
        assert_eq!(store.get("alice").await.unwrap().unwrap().vector, vec![0.1, 0.2]);
        assert!(store.get("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_users() {
        let dir = TempDir::new().unwrap();
        let alice = user("alice");

        {
            let store = FileUserStore::open(dir.path()).await.unwrap();
            assert!(store.create(&alice).await.unwrap());
            assert!(!store.create(&alice).await.unwrap());
        }

        let reopened = FileUserStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("alice").await.unwrap(), Some(alice));
        assert!(reopened.get("../etc/passwd").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_racing_registration_see_no_partial_user() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileUserStore::open(dir.path()).await.unwrap());

        for round in 0..50 {
            let name = format!("user{round}");
            let mut record = user(&name);
            record.vector = vec![0.125; 1536];

            let reader = {
                let store = Arc::clone(&store);
                let name = name.clone();
                tokio::spawn(async move {
                    // Each lookup must be a clean miss or the full record.
                    loop {
                        if let Some(found) = store.get(&name).await.unwrap() {
                            return found;
                        }
                        tokio::task::yield_now().await;
                    }
                })
            };

            assert!(store.create(&record).await.unwrap());
            assert_eq!(reader.await.unwrap(), record);
        }
    }
}
