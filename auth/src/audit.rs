//! Append-only audit log of authentication attempts.

use std::cmp::Reverse;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::StorageError;

/// How a decision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Similarity met the threshold.
    Passed,
    /// Similarity fell below the threshold.
    Rejected,
    /// The vectors could not be compared.
    Error,
}

/// One authentication decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAttemptRecord {
    /// Subject the attempt was made for.
    pub subject: String,

    /// Input text as submitted.
    pub input: String,

    /// Cosine similarity, absent when the comparison failed.
    pub similarity: Option<f32>,

    /// When the decision was made.
    pub timestamp: DateTime<Utc>,

    /// Outcome of the decision.
    pub outcome: AttemptOutcome,
}

/// Durable sink for attempt records.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one record.
    async fn append(&self, record: &AuthAttemptRecord) -> Result<(), StorageError>;

    /// Most recent records first, optionally for one subject.
    async fn recent(
        &self,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuthAttemptRecord>, StorageError>;
}

fn newest_first(
    records: impl Iterator<Item = AuthAttemptRecord>,
    subject: Option<&str>,
    limit: usize,
) -> Vec<AuthAttemptRecord> {
    let mut records: Vec<_> = records
        .filter(|r| subject.is_none_or(|s| r.subject == s))
        .collect();
    // Later appends win ties.
    records.reverse();
    records.sort_by_key(|r| Reverse(r.timestamp));
    records.truncate(limit);
    records
}

/// In-memory audit log.
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<RwLock<Vec<AuthAttemptRecord>>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in insertion order.
    pub async fn records(&self) -> Vec<AuthAttemptRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: &AuthAttemptRecord) -> Result<(), StorageError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn recent(
        &self,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuthAttemptRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(newest_first(records.iter().cloned(), subject, limit))
    }
}

/// Audit log stored as JSON lines in a single file.
pub struct FileAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Open a log file, creating its directory if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, record: &AuthAttemptRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(subject = %record.subject, "Recorded login attempt");
        Ok(())
    }

    async fn recent(
        &self,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuthAttemptRecord>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable attempt record: {e}");
                    None
                }
            });

        Ok(newest_first(records, subject, limit))
    }
}
