//! The unit of work flowing from the walker to the upload workers.

use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use tracing::warn;

use crate::error::FileError;

/// One regular file discovered under the sync root.
///
/// Owned by exactly one worker at a time. Dropping the task removes the
/// compressed copy, if one was made.
#[derive(Debug)]
pub struct FileTask {
    pub absolute_path: PathBuf,
    /// Gzip copy produced by the worker, removed when the task is finished.
    pub compressed_path: Option<TempPath>,
    /// Size at discovery time. Informational only.
    pub size_bytes: u64,
    /// Modification time at discovery time. Informational only.
    pub modified: Option<DateTime<Utc>>,
}

impl FileTask {
    pub fn new(absolute_path: PathBuf, size_bytes: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            absolute_path,
            compressed_path: None,
            size_bytes,
            modified,
        }
    }

    /// The file whose bytes get hashed and uploaded.
    pub fn upload_source(&self) -> &Path {
        match &self.compressed_path {
            Some(temp) => &**temp,
            None => self.absolute_path.as_path(),
        }
    }

    /// Remove the compressed copy, logging if the filesystem refuses.
    pub fn finish(mut self) {
        if let Some(temp) = self.compressed_path.take() {
            let path = temp.to_path_buf();
            if let Err(e) = temp.close() {
                warn!(
                    "could not remove temp file {} for {}: {}",
                    path.display(),
                    self.absolute_path.display(),
                    e
                );
            }
        }
    }
}

/// Derive the object key for `path`: the path relative to `root`, with
/// `/` separators and no leading slash.
pub fn remote_key(root: &Path, path: &Path) -> Result<String, FileError> {
    let relative = path.strip_prefix(root).map_err(|_| FileError::Key {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })?;

    let parts: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Err(FileError::Key {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    Ok(parts.join("/"))
}

/// HTTP headers stored with an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet {
    pub cache_control: String,
    pub content_type: String,
    pub content_encoding: Option<&'static str>,
}

impl HeaderSet {
    pub fn new(max_age_secs: u32, content_type: String, content_encoding: Option<&'static str>) -> Self {
        Self {
            cache_control: format!("max-age={}", max_age_secs),
            content_type,
            content_encoding,
        }
    }

    /// Header name/value pairs in the order they are sent.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("Cache-Control", self.cache_control.as_str()),
            ("Content-Type", self.content_type.as_str()),
        ];
        if let Some(encoding) = self.content_encoding {
            pairs.push(("Content-Encoding", encoding));
        }
        pairs
    }
}
