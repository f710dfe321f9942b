//! Tree walker: the producer half of the pipeline.
//!
//! Walks the sync root with jwalk and pushes one [`FileTask`] per regular
//! file into the bounded work queue. `blocking_send` parks the walker while
//! the queue is full, so discovery never runs ahead of the uploads by more
//! than the queue capacity. The queue is closed when the walker drops its
//! sender, which every worker observes.

use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tracing::debug;

use crate::error::SyncError;
use crate::sync::task::FileTask;

pub struct TreeWalker {
    root: PathBuf,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree, sending every regular file to `queue`.
    ///
    /// Blocks the calling thread; run it with `spawn_blocking`. Any
    /// directory that cannot be read, at any depth, ends the walk with an
    /// error. Returns the number of files queued.
    ///
    /// The root itself is resolved first, so a symlink to the site
    /// directory is walked; links below the root are not followed.
    pub fn walk(&self, queue: Sender<FileTask>) -> Result<usize, SyncError> {
        let source_root = |e: std::io::Error| SyncError::SourceRoot {
            path: self.root.clone(),
            source: e,
        };
        let root = fs::canonicalize(&self.root).map_err(source_root)?;
        fs::read_dir(&root).map_err(source_root)?;

        let mut discovered = 0usize;

        for entry_result in WalkDir::new(&root)
            .parallelism(jwalk::Parallelism::RayonNewPool(0))
            .skip_hidden(false)
            .follow_links(false)
        {
            let mut entry = entry_result.map_err(|e| SyncError::Walk {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone()),
                source: e,
            })?;
            if let Some(e) = entry.read_children_error.take() {
                return Err(SyncError::Walk {
                    path: entry.path(),
                    source: e,
                });
            }

            // Directories are descended into by jwalk; symlinks and special
            // files are not synced.
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let (size, modified) = match entry.metadata() {
                Ok(metadata) => (metadata.len(), metadata.modified().ok().map(DateTime::<Utc>::from)),
                Err(_) => (0, None),
            };
            debug!("discovered {}", path.display());

            if queue.blocking_send(FileTask::new(path, size, modified)).is_err() {
                // Every worker is gone; nobody is left to take more work.
                debug!("work queue closed, stopping walk of {}", root.display());
                break;
            }
            discovered += 1;
        }

        // Dropping `queue` here closes the channel for all workers.
        Ok(discovered)
    }
}
