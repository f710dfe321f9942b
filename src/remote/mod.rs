//! Remote object store boundary.
//!
//! The sync pipeline only needs three things from a bucket: make sure it
//! exists, list what is already there, and put an object with headers.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::error::StoreError;
use crate::sync::task::HeaderSet;

pub use memory::MemoryStore;
pub use s3::S3Store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Canned access policy applied to the bucket and to each object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    Private,
    #[default]
    PublicRead,
}

/// One object as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRecord {
    /// Key relative to the bucket root, `/`-separated.
    pub key: String,
    /// Checksum exactly as the store reports it (S3 ETags carry quotes).
    pub checksum: String,
}

/// A single upload.
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    pub key: &'a str,
    /// File holding the exact bytes to store.
    pub body: &'a Path,
    pub content_length: u64,
    pub headers: &'a HeaderSet,
    pub acl: AccessPolicy,
}

/// Object storage operations used by the sync engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Make sure the bucket exists, creating it with `acl` if it does not.
    async fn ensure_bucket(&self, acl: AccessPolicy) -> StoreResult<()>;

    /// List every object in the bucket, following pagination to the end.
    async fn list_objects(&self) -> StoreResult<Vec<RemoteObjectRecord>>;

    /// Upload `request.body` under `request.key`.
    async fn put_object(&self, request: PutObject<'_>) -> StoreResult<()>;

    /// Bucket name, for logging.
    fn bucket(&self) -> &str;

    /// Get display path for a key
    fn display_key(&self, key: &str) -> String {
        format!("{}/{}", self.bucket(), key)
    }
}

/// Snapshot of the bucket taken once before any upload starts.
///
/// Never refreshed during a run, so concurrent edits by other writers go
/// unnoticed until the next run.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    objects: HashMap<String, RemoteObjectRecord>,
}

impl RemoteIndex {
    /// Fetch the listing from `store` and index it by key.
    pub async fn fetch(store: &dyn RemoteStore) -> StoreResult<Self> {
        Ok(store.list_objects().await?.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&RemoteObjectRecord> {
        self.objects.get(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<RemoteObjectRecord> for RemoteIndex {
    fn from_iter<I: IntoIterator<Item = RemoteObjectRecord>>(iter: I) -> Self {
        Self {
            objects: iter
                .into_iter()
                .map(|record| (record.key.clone(), record))
                .collect(),
        }
    }
}
