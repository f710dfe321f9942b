//! Amazon S3 (and S3-compatible) store backed by the AWS SDK.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl,
    ObjectOwnership,
};
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use super::{AccessPolicy, PutObject, RemoteObjectRecord, RemoteStore, StoreResult};
use crate::config::{StoreCredentials, DEFAULT_REGION};
use crate::error::StoreError;

/// S3 bucket store.
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Store {
    /// Build a client for `bucket` in `region`.
    ///
    /// `endpoint` points the client at an S3-compatible service and switches
    /// to path-style addressing.
    pub async fn connect(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: &StoreCredentials,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                "environment",
            ));
        if let Some(url) = endpoint {
            loader = loader.endpoint_url(url);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(endpoint.is_some())
            .build();

        Self::from_client(Client::from_conf(s3_config), bucket, region)
    }

    pub fn from_client(client: Client, bucket: &str, region: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            region: region.to_string(),
        }
    }

    async fn create_bucket(&self, acl: AccessPolicy) -> StoreResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(&self.bucket)
            .acl(bucket_acl(acl))
            .object_ownership(ObjectOwnership::ObjectWriter);

        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| StoreError::request("create bucket", DisplayErrorContext(&e).to_string()))?;
        info!("created bucket {}", self.bucket);

        if acl == AccessPolicy::PublicRead {
            // New buckets block public ACLs until this is lifted.
            if let Err(e) = self
                .client
                .delete_public_access_block()
                .bucket(&self.bucket)
                .send()
                .await
            {
                warn!(
                    "could not lift public access block on {}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                );
            }
        }

        Ok(())
    }
}

fn bucket_acl(acl: AccessPolicy) -> BucketCannedAcl {
    match acl {
        AccessPolicy::Private => BucketCannedAcl::Private,
        AccessPolicy::PublicRead => BucketCannedAcl::PublicRead,
    }
}

fn object_acl(acl: AccessPolicy) -> ObjectCannedAcl {
    match acl {
        AccessPolicy::Private => ObjectCannedAcl::Private,
        AccessPolicy::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn ensure_bucket(&self, acl: AccessPolicy) -> StoreResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!("bucket {} exists", self.bucket);
                Ok(())
            }
            Err(e) if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) => {
                info!("bucket {} not found, creating it", self.bucket);
                self.create_bucket(acl).await
            }
            Err(e) => Err(StoreError::request(
                "head bucket",
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    async fn list_objects(&self) -> StoreResult<Vec<RemoteObjectRecord>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| StoreError::request("list objects", DisplayErrorContext(&e).to_string()))?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(RemoteObjectRecord {
                            key,
                            checksum: object.e_tag.unwrap_or_default(),
                        });
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) && res.next_continuation_token.is_some() {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn put_object(&self, request: PutObject<'_>) -> StoreResult<()> {
        let body = ByteStream::from_path(request.body)
            .await
            .map_err(|e| StoreError::request("read body", e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(request.key)
            .body(body)
            .content_length(request.content_length as i64)
            .cache_control(&request.headers.cache_control)
            .content_type(&request.headers.content_type)
            .set_content_encoding(request.headers.content_encoding.map(str::to_string))
            .acl(object_acl(request.acl))
            .send()
            .await
            .map_err(|e| StoreError::request("put object", DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn display_key(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
