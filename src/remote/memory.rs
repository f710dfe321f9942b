//! In-process object store.
//!
//! Behaves like a bucket that reports quoted MD5 ETags. Test double for the
//! unit and integration tests; the binary always talks to S3.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::StoreError;
use crate::remote::{AccessPolicy, PutObject, RemoteObjectRecord, RemoteStore, StoreResult};
use crate::sync::hash::hash_bytes;

/// A stored object with the metadata it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub acl: Option<AccessPolicy>,
}

#[derive(Debug, Default)]
struct State {
    bucket_acl: Option<AccessPolicy>,
    objects: BTreeMap<String, StoredObject>,
    puts: Vec<String>,
}

/// Thread-safe in-memory bucket.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    state: Mutex<State>,
    failing_keys: HashSet<String>,
    put_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Self::default()
        }
    }

    /// Reject every put for `key`.
    pub fn fail_on(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    /// Sleep before each put, to simulate a slow link.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Store an object directly, bypassing `put_object`.
    pub fn insert_raw(&self, key: &str, data: Vec<u8>) {
        let mut state = self.lock();
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                cache_control: None,
                content_type: None,
                content_encoding: None,
                acl: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Keys of every successful put, in completion order.
    pub fn put_log(&self) -> Vec<String> {
        self.lock().puts.clone()
    }

    pub fn bucket_acl(&self) -> Option<AccessPolicy> {
        self.lock().bucket_acl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn ensure_bucket(&self, acl: AccessPolicy) -> StoreResult<()> {
        let mut state = self.lock();
        if state.bucket_acl.is_none() {
            state.bucket_acl = Some(acl);
        }
        Ok(())
    }

    async fn list_objects(&self) -> StoreResult<Vec<RemoteObjectRecord>> {
        Ok(self
            .lock()
            .objects
            .iter()
            .map(|(key, object)| RemoteObjectRecord {
                key: key.clone(),
                checksum: format!("\"{}\"", hash_bytes(&object.data)),
            })
            .collect())
    }

    async fn put_object(&self, request: PutObject<'_>) -> StoreResult<()> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_keys.contains(request.key) {
            return Err(StoreError::request("PutObject", "injected failure"));
        }

        let data = tokio::fs::read(request.body).await?;
        if data.len() as u64 != request.content_length {
            return Err(StoreError::request(
                "PutObject",
                format!(
                    "content length {} does not match body of {} bytes",
                    request.content_length,
                    data.len()
                ),
            ));
        }

        let mut state = self.lock();
        state.objects.insert(
            request.key.to_string(),
            StoredObject {
                data,
                cache_control: Some(request.headers.cache_control.clone()),
                content_type: Some(request.headers.content_type.clone()),
                content_encoding: request.headers.content_encoding.map(str::to_string),
                acl: Some(request.acl),
            },
        );
        state.puts.push(request.key.to_string());
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
