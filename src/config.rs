//! Run configuration and store credentials.

use std::fmt;
use std::path::PathBuf;

use crate::error::SyncError;
use crate::remote::AccessPolicy;
use crate::sync::compression::CompressionLevel;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_MAX_AGE_SECS: u32 = 900;

/// Sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local directory mirrored to the bucket.
    pub source_root: PathBuf,
    /// Number of concurrent upload workers.
    pub workers: usize,
    /// Tasks the walker may queue ahead of the workers.
    pub queue_capacity: usize,
    /// `max-age` sent in `Cache-Control`.
    pub max_age_secs: u32,
    /// Gzip level for compressible files.
    pub compression_level: CompressionLevel,
    /// Where compressed copies are written; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Canned ACL for the bucket and every uploaded object.
    pub acl: AccessPolicy,
    /// Compare only, never upload.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            compression_level: CompressionLevel::max(),
            temp_dir: None,
            acl: AccessPolicy::PublicRead,
            dry_run: false,
        }
    }
}

impl SyncConfig {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            ..Self::default()
        }
    }
}

/// Static credentials for the object store, read from the environment.
#[derive(Clone)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

// Keep the secret out of logs.
impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StoreCredentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`, trying the standard AWS names
    /// first and the older short names second.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_of = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|value| !value.is_empty()))
        };

        let access_key_id = first_of(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"]).ok_or(
            SyncError::Credentials {
                variable: "AWS_ACCESS_KEY_ID",
            },
        )?;
        let secret_access_key = first_of(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"]).ok_or(
            SyncError::Credentials {
                variable: "AWS_SECRET_ACCESS_KEY",
            },
        )?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: first_of(&["AWS_SESSION_TOKEN"]),
        })
    }
}
