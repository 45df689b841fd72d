//! Background write-back to best-effort cache tiers.
//!
//! Writes are handed to a bounded queue served by a fixed pool of worker
//! tasks. Submitting never waits: when the queue is full the write is
//! dropped, since a missing best-effort entry only costs a later miss.

use std::sync::Arc;

use semauth_embeddings::{CacheRecord, CacheTier};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::WriteBackConfig;

/// A pending write.
pub struct WriteBackJob {
    /// Tier to write to.
    pub tier: Arc<dyn CacheTier>,

    /// Record to write.
    pub record: CacheRecord,
}

/// What to do with queued writes at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Finish every queued write, then stop.
    Drain,
    /// Stop immediately, discarding queued and in-flight writes.
    Abandon,
}

/// Bounded queue of cache writes served by worker tasks.
pub struct WriteBackQueue {
    sender: async_channel::Sender<WriteBackJob>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WriteBackQueue {
    /// Start the worker pool. Must be called from within a Tokio runtime.
    pub fn start(config: &WriteBackConfig) -> Self {
        let (sender, receiver) = async_channel::bounded(config.capacity.max(1));
        let workers = (0..config.workers.max(1))
            .map(|id| tokio::spawn(run_worker(id, receiver.clone())))
            .collect();

        debug!(
            workers = config.workers.max(1),
            capacity = config.capacity.max(1),
            "Started cache write-back workers"
        );

        Self {
            sender,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a write without waiting. Returns whether it was accepted.
    pub fn submit(&self, tier: Arc<dyn CacheTier>, record: CacheRecord) -> bool {
        match self.sender.try_send(WriteBackJob { tier, record }) {
            Ok(()) => true,
            Err(async_channel::TrySendError::Full(job)) => {
                warn!(
                    tier = job.tier.name(),
                    hash = %job.record.hash,
                    "Write-back queue full, dropping cache write"
                );
                false
            }
            Err(async_channel::TrySendError::Closed(job)) => {
                debug!(
                    tier = job.tier.name(),
                    "Write-back queue closed, dropping cache write"
                );
                false
            }
        }
    }

    /// Whether the queue has been shut down.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Stop accepting writes and stop the workers.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        self.sender.close();
        let workers = std::mem::take(&mut *self.workers.lock().await);

        if mode == ShutdownMode::Abandon {
            let discarded = self.sender.len();
            for worker in &workers {
                worker.abort();
            }
            if discarded > 0 {
                warn!("Abandoned {discarded} queued cache writes");
            }
        }

        for worker in workers {
            match worker.await {
                Err(e) if !e.is_cancelled() => warn!("Write-back worker failed: {e}"),
                _ => {}
            }
        }
        debug!(?mode, "Cache write-back stopped");
    }
}

async fn run_worker(id: usize, receiver: async_channel::Receiver<WriteBackJob>) {
    while let Ok(job) = receiver.recv().await {
        match job.tier.put(&job.record).await {
            Ok(()) => debug!(worker = id, tier = job.tier.name(), "Cache write-back complete"),
            Err(e) => warn!(
                worker = id,
                tier = job.tier.name(),
                hash = %job.record.hash,
                "Cache write-back failed: {e}"
            ),
        }
    }
}
