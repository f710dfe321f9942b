//! Upload workers: the consumer half of the pipeline.
//!
//! Each worker pulls tasks from the shared queue until the walker closes it.
//! Failures are confined to the file being processed: they are logged and
//! counted, and the worker moves on to the next task.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::FileError;
use crate::remote::{PutObject, RemoteIndex, RemoteObjectRecord, RemoteStore};
use crate::sync::classify::ContentTable;
use crate::sync::compression::{compress_file_async, CompressionType};
use crate::sync::engine::SyncCounters;
use crate::sync::hash::{hash_file_async, FileHash};
use crate::sync::task::{remote_key, FileTask, HeaderSet};

/// Receiving end of the work queue, shared by all workers.
///
/// Once the walker drops the sender, `recv` returns `None` for every worker
/// that asks, so each one sees end-of-input exactly when the queue is drained.
pub type WorkQueue = Arc<Mutex<Receiver<FileTask>>>;

/// Why a file is being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReason {
    /// No object under this key.
    NotInIndex,
    /// Object exists with different content.
    ChecksumMismatch,
    /// The local file could not be hashed, so nothing can be compared.
    HashUnavailable,
}

impl fmt::Display for UploadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInIndex => write!(f, "new file"),
            Self::ChecksumMismatch => write!(f, "content changed"),
            Self::HashUnavailable => write!(f, "hash unavailable"),
        }
    }
}

/// Whether a file needs to go to the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    Skip,
    Upload(UploadReason),
}

impl UploadDecision {
    /// Compare the hash of the bytes to be uploaded with the remote record.
    ///
    /// A missing hash always uploads: re-sending an unchanged file is
    /// cheaper than silently keeping a stale one.
    pub fn decide(hash: Option<&FileHash>, remote: Option<&RemoteObjectRecord>) -> Self {
        match (hash, remote) {
            (None, _) => Self::Upload(UploadReason::HashUnavailable),
            (Some(_), None) => Self::Upload(UploadReason::NotInIndex),
            (Some(hash), Some(record)) if hash.matches(&record.checksum) => Self::Skip,
            (Some(_), Some(_)) => Self::Upload(UploadReason::ChecksumMismatch),
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded { bytes: u64 },
    Skipped,
    /// Would have been uploaded, but this is a dry run.
    Pending,
}

/// One member of the worker pool.
#[derive(Clone)]
pub struct UploadWorker {
    pub id: usize,
    pub config: Arc<SyncConfig>,
    pub store: Arc<dyn RemoteStore>,
    pub index: Arc<RemoteIndex>,
    pub table: Arc<ContentTable>,
    pub counters: Arc<SyncCounters>,
}

impl UploadWorker {
    /// Drain `queue` until it is closed and empty.
    pub async fn run(self, queue: WorkQueue) {
        debug!(worker = self.id, "upload worker started");

        loop {
            // The lock is only held while waiting for the next task.
            let next = { queue.lock().await.recv().await };
            let Some(task) = next else {
                break;
            };

            match self.process(task).await {
                Ok(outcome) => self.counters.record(outcome),
                Err(e) => {
                    error!(worker = self.id, "{}", e);
                    self.counters.record_failure();
                }
            }
        }

        debug!(worker = self.id, "upload worker finished");
    }

    /// Run one task through classify, compress, hash, compare and upload.
    ///
    /// The compressed copy is removed before returning, whatever the result.
    pub async fn process(&self, mut task: FileTask) -> Result<FileOutcome, FileError> {
        let result = self.process_task(&mut task).await;
        task.finish();
        result
    }

    async fn process_task(&self, task: &mut FileTask) -> Result<FileOutcome, FileError> {
        info!(worker = self.id, "{}", task.absolute_path.display());

        let key = remote_key(&self.config.source_root, &task.absolute_path)?;

        let class = self.table.classify(&task.absolute_path);
        if !class.recognized {
            warn!("unknown extension, sending as {}: {}", class.content_type, task.absolute_path.display());
        }

        let compression = if class.compressible {
            debug!("compressing {}", key);
            let temp = compress_file_async(
                task.absolute_path.clone(),
                self.config.compression_level,
                self.config.temp_dir.clone(),
            )
            .await?;
            task.compressed_path = Some(temp);
            CompressionType::Gzip
        } else {
            CompressionType::None
        };

        let headers = HeaderSet::new(
            self.config.max_age_secs,
            class.content_type,
            compression.content_encoding(),
        );
        let source = task.upload_source().to_path_buf();

        let hash = match hash_file_async(&source).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                let err = FileError::Hash {
                    path: task.absolute_path.clone(),
                    source: e,
                };
                warn!("{}, uploading without comparison", err);
                None
            }
        };

        match UploadDecision::decide(hash.as_ref(), self.index.get(&key)) {
            UploadDecision::Skip => {
                info!("hashes match, no upload required: {}", key);
                Ok(FileOutcome::Skipped)
            }
            UploadDecision::Upload(reason) if self.config.dry_run => {
                info!("would upload {} ({})", key, reason);
                Ok(FileOutcome::Pending)
            }
            UploadDecision::Upload(reason) => {
                info!("uploading {} ({})", self.store.display_key(&key), reason);
                let bytes = self.upload(&key, &source, &headers, hash.as_ref()).await?;
                info!("finished upload of {} ({} bytes)", key, bytes);
                Ok(FileOutcome::Uploaded { bytes })
            }
        }
    }

    async fn upload(
        &self,
        key: &str,
        source: &Path,
        headers: &HeaderSet,
        hash: Option<&FileHash>,
    ) -> Result<u64, FileError> {
        let content_length = tokio::fs::metadata(source)
            .await
            .map_err(|e| FileError::Stat {
                path: PathBuf::from(source),
                source: e,
            })?
            .len();

        // The decision was made on the hashed bytes; refuse to send others.
        if let Some(hash) = hash {
            if hash.size != content_length {
                return Err(FileError::Changed {
                    path: PathBuf::from(source),
                    hashed: hash.size,
                    found: content_length,
                });
            }
        }

        self.store
            .put_object(PutObject {
                key,
                body: source,
                content_length,
                headers,
                acl: self.config.acl,
            })
            .await
            .map_err(|e| FileError::Upload {
                key: key.to_string(),
                source: e,
            })?;

        Ok(content_length)
    }
}
