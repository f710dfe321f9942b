//! Sync engine: wires the walker, the work queue and the worker pool.
//!
//! Sequence: make sure the bucket exists, snapshot its contents, start the
//! walker on the blocking pool, start the workers, wait for all of them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::remote::{RemoteIndex, RemoteStore};
use crate::sync::classify::ContentTable;
use crate::sync::walker::TreeWalker;
use crate::sync::worker::{FileOutcome, UploadWorker, WorkQueue};

/// Sync statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Files queued by the walker.
    pub files_discovered: usize,
    /// Files uploaded.
    pub files_uploaded: usize,
    /// Files whose remote copy was already current.
    pub files_skipped: usize,
    /// Files that would have been uploaded in a dry run.
    pub files_pending: usize,
    /// Files abandoned after an error.
    pub files_failed: usize,
    /// Bytes sent to the bucket.
    pub bytes_uploaded: u64,
    /// Total duration.
    pub duration: Duration,
}

impl SyncStats {
    /// Files that reached a worker, whatever the outcome.
    pub fn files_processed(&self) -> usize {
        self.files_uploaded + self.files_skipped + self.files_pending + self.files_failed
    }
}

/// Counters updated concurrently by the workers.
#[derive(Debug, Default)]
pub struct SyncCounters {
    uploaded: AtomicUsize,
    skipped: AtomicUsize,
    pending: AtomicUsize,
    failed: AtomicUsize,
    bytes_uploaded: AtomicU64,
}

impl SyncCounters {
    pub fn record(&self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Uploaded { bytes } => {
                self.uploaded.fetch_add(1, Ordering::Relaxed);
                self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
            }
            FileOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            FileOutcome::Pending => {
                self.pending.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, files_discovered: usize, duration: Duration) -> SyncStats {
        SyncStats {
            files_discovered,
            files_uploaded: self.uploaded.load(Ordering::Relaxed),
            files_skipped: self.skipped.load(Ordering::Relaxed),
            files_pending: self.pending.load(Ordering::Relaxed),
            files_failed: self.failed.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            duration,
        }
    }
}

/// Sync engine for publishing a directory tree to a bucket.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    config: Arc<SyncConfig>,
    table: Arc<ContentTable>,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            table: Arc::new(ContentTable::default()),
        }
    }

    /// Ensure the bucket exists and take the remote snapshot.
    ///
    /// A dry run never creates the bucket.
    pub async fn prepare(&self) -> Result<RemoteIndex, SyncError> {
        let bucket = self.store.bucket().to_string();

        if !self.config.dry_run {
            self.store
                .ensure_bucket(self.config.acl)
                .await
                .map_err(|e| SyncError::Bucket {
                    bucket: bucket.clone(),
                    source: e,
                })?;
        }

        let index = RemoteIndex::fetch(&*self.store)
            .await
            .map_err(|e| SyncError::RemoteIndex { bucket: bucket.clone(), source: e })?;
        info!("{} objects already in bucket {}", index.len(), bucket);

        Ok(index)
    }

    /// Perform a full sync.
    pub async fn sync(&self) -> Result<SyncStats, SyncError> {
        let index = self.prepare().await?;
        self.sync_with_index(index).await
    }

    /// Run the walker and the worker pool against an existing snapshot.
    ///
    /// Returns once every worker has drained the queue. Per-file failures
    /// only show up in the counters; an unreadable directory or a crashed
    /// task is returned as an error.
    pub async fn sync_with_index(&self, index: RemoteIndex) -> Result<SyncStats, SyncError> {
        let start = Instant::now();
        let index = Arc::new(index);
        let counters = Arc::new(SyncCounters::default());

        // Keys are derived from the resolved root, so a symlinked or
        // relative root yields the same keys as the real directory.
        let root = tokio::fs::canonicalize(&self.config.source_root)
            .await
            .map_err(|e| SyncError::SourceRoot {
                path: self.config.source_root.clone(),
                source: e,
            })?;
        let config = Arc::new(SyncConfig {
            source_root: root.clone(),
            ..(*self.config).clone()
        });

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let queue: WorkQueue = Arc::new(Mutex::new(receiver));

        let walker = TreeWalker::new(root);
        info!("syncing {} to {}", walker.root().display(), self.store.bucket());
        let walk = tokio::task::spawn_blocking(move || walker.walk(sender));

        let mut workers = JoinSet::new();
        for id in 0..config.workers.max(1) {
            let worker = UploadWorker {
                id,
                config: Arc::clone(&config),
                store: Arc::clone(&self.store),
                index: Arc::clone(&index),
                table: Arc::clone(&self.table),
                counters: Arc::clone(&counters),
            };
            workers.spawn(worker.run(Arc::clone(&queue)));
        }

        let walked = walk.await.unwrap_or_else(|e| {
            Err(SyncError::Task {
                name: "walker",
                message: e.to_string(),
            })
        });
        let discovered = match walked {
            Ok(count) => count,
            Err(e) => {
                let abandoned = abandon_queue(&queue).await;
                error!("walk failed, {} queued files abandoned", abandoned);
                // In-flight files finish so their scratch copies are released.
                while workers.join_next().await.is_some() {}
                return Err(e);
            }
        };
        drop(queue);

        let mut crashed = None;
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("upload worker crashed: {}", e);
                crashed.get_or_insert(e.to_string());
            }
        }
        if let Some(message) = crashed {
            return Err(SyncError::Task {
                name: "upload worker",
                message,
            });
        }

        let stats = counters.snapshot(discovered, start.elapsed());
        info!(
            "sync complete: {} discovered, {} uploaded, {} skipped, {} failed, {} bytes in {:.2}s",
            stats.files_discovered,
            stats.files_uploaded,
            stats.files_skipped,
            stats.files_failed,
            stats.bytes_uploaded,
            stats.duration.as_secs_f64()
        );
        if stats.files_pending > 0 {
            info!("dry run: {} files would have been uploaded", stats.files_pending);
        }

        Ok(stats)
    }
}

/// Close the queue and drop whatever is still waiting in it.
async fn abandon_queue(queue: &WorkQueue) -> usize {
    let mut receiver = queue.lock().await;
    receiver.close();
    let mut abandoned = 0;
    while receiver.try_recv().is_ok() {
        abandoned += 1;
    }
    abandoned
}
