//! Error types for the sync pipeline.
//!
//! Errors fall into two tiers. [`SyncError`] aborts the run before or while
//! the tree is walked; [`FileError`] is confined to a single file and is only
//! ever logged by the worker that hit it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Any of these ends the process with exit status 1.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing credentials: set {variable} in the environment")]
    Credentials { variable: &'static str },

    #[error("bucket {bucket} is not usable")]
    Bucket {
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("could not list the contents of bucket {bucket}")]
    RemoteIndex {
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("could not read source directory {}", path.display())]
    SourceRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error walking {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: jwalk::Error,
    },

    #[error("{name} task failed: {message}")]
    Task { name: &'static str, message: String },
}

/// Errors scoped to one file. The file is abandoned, the run continues.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("could not compress {}: {source}", path.display())]
    Compress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not hash {}: {source}", path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not under the sync root {}", path.display(), root.display())]
    Key { path: PathBuf, root: PathBuf },

    #[error("could not stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} changed while being uploaded ({hashed} bytes hashed, {found} bytes now)", path.display())]
    Changed { path: PathBuf, hashed: u64, found: u64 },

    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Errors reported by a [`crate::remote::RemoteStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            operation,
            message: message.into(),
        }
    }
}
