//! Photo object storage.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::Region,
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{ObjectCannedAcl, ServerSideEncryption},
    Client as S3Client,
};
use aws_config::SdkConfig;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Lifetime of photo URLs embedded in listing responses.
pub const PHOTO_URL_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime of media redirect targets.
pub const MEDIA_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object reference '{0}'")]
    InvalidReference(String),

    #[error("Unable to sign object URL: {0}")]
    Signing(String),

    #[error("Object storage request failed: {0}")]
    Request(String),

    #[error("Object storage unavailable")]
    Unavailable,
}

/// `<bucket>/<key>`, optionally written as a URL whose path holds both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn parse(reference: &str) -> Result<Self, StorageError> {
        let path = match reference.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
            None => reference,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        match path.trim_start_matches('/').split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            }
            _ => Err(StorageError::InvalidReference(reference.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Time-limited download URL for `object`.
    async fn presign_get(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError>;

    async fn put(&self, object: &ObjectRef, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
}

pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Client for `region` on top of the shared AWS config. An endpoint
    /// override (MinIO, LocalStack) switches to path-style addressing.
    pub fn from_sdk_config(sdk: &SdkConfig, region: &str, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk).region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(S3Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn presign_get(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Signing(DisplayErrorContext(&e).to_string()))?;

        metrics::counter!(super::metrics::PRESIGNED_URLS_TOTAL).increment(1);
        Ok(request.uri().to_string())
    }

    async fn put(&self, object: &ObjectRef, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .content_disposition("attachment")
            .acl(ObjectCannedAcl::Private)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| StorageError::Request(DisplayErrorContext(&e).to_string()))?;

        tracing::info!(object = %object, "Object stored");
        Ok(())
    }
}

/// In-memory storage for tests. Presigned URLs are deterministic and can be
/// made to fail.
#[derive(Default)]
pub struct MockObjectStorage {
    objects: DashMap<String, (Vec<u8>, String)>,
    failing: AtomicBool,
    presigned: AtomicU64,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn presign_count(&self) -> u64 {
        self.presigned.load(Ordering::SeqCst)
    }

    /// Content type and bytes of a stored object.
    pub fn stored(&self, object: &ObjectRef) -> Option<(String, Vec<u8>)> {
        self.objects
            .get(&object.to_string())
            .map(|entry| (entry.1.clone(), entry.0.clone()))
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn presign_get(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        self.presigned.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://storage.test/{}/{}?expires={}",
            object.bucket,
            object.key,
            ttl.as_secs()
        ))
    }

    async fn put(&self, object: &ObjectRef, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        self.objects
            .insert(object.to_string(), (body, content_type.to_string()));
        Ok(())
    }
}
