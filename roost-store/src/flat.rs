//! Flat versioned object storage for text assets and site files.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

use roost_core::{HostError, HostResult};

/// Result of a successful flat-store put.
#[derive(Debug, Clone)]
pub struct FlatPutResult {
    pub size_bytes: u64,
    pub etag: Option<String>,
}

/// One object listed under a prefix.
#[derive(Debug, Clone)]
pub struct FlatObject {
    pub key: String,
    pub size_bytes: u64,
}

/// Flat object-storage primitives. Must be implemented by all flat backends.
#[async_trait]
pub trait FlatStore: Send + Sync {
    /// Store an object under an explicit key.
    async fn put(&self, key: &str, content_type: &str, payload: Bytes) -> HostResult<FlatPutResult>;

    /// Delete an object. Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> HostResult<()>;

    /// List every object under a key prefix.
    async fn list(&self, prefix: &str) -> HostResult<Vec<FlatObject>>;

    /// Public URL an object is served from.
    fn public_url(&self, key: &str) -> String;
}

/// In-memory flat store for tests and development.
pub struct MemoryFlatStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    base_url: String,
    fail_puts: RwLock<bool>,
    fail_deletes: RwLock<bool>,
}

struct StoredObject {
    content_type: String,
    payload: Bytes,
}

impl MemoryFlatStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            base_url: "https://flat.test".to_string(),
            fail_puts: RwLock::new(false),
            fail_deletes: RwLock::new(false),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Stored content type of an object, if present.
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|o| o.content_type.clone())
    }

    /// Test helper: make every subsequent put fail with a storage error.
    pub fn fail_next_puts(&self, fail: bool) {
        *self.fail_puts.write() = fail;
    }

    /// Test helper: make every subsequent delete fail with a storage error.
    pub fn fail_next_deletes(&self, fail: bool) {
        *self.fail_deletes.write() = fail;
    }
}

impl Default for MemoryFlatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlatStore for MemoryFlatStore {
    async fn put(&self, key: &str, content_type: &str, payload: Bytes) -> HostResult<FlatPutResult> {
        if *self.fail_puts.read() {
            return Err(HostError::storage(format!("simulated put failure for '{}'", key)));
        }

        let size_bytes = payload.len() as u64;
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                payload,
            },
        );
        Ok(FlatPutResult {
            size_bytes,
            etag: Some(format!("\"mem-{}\"", size_bytes)),
        })
    }

    async fn delete(&self, key: &str) -> HostResult<()> {
        if *self.fail_deletes.read() {
            return Err(HostError::storage(format!(
                "simulated delete failure for '{}'",
                key
            )));
        }
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> HostResult<Vec<FlatObject>> {
        let objects = self.objects.read();
        let mut listed: Vec<FlatObject> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| FlatObject {
                key: key.clone(),
                size_bytes: obj.payload.len() as u64,
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Flat store over any S3-compatible object storage.
pub struct S3FlatStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3FlatStore {
    /// Build from ambient AWS configuration (env credentials, region).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket: bucket.into(),
            public_base_url: None,
        }
    }

    /// Build against an S3-compatible endpoint (MinIO, R2, ...).
    pub async fn with_endpoint(bucket: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        let base = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let config = aws_sdk_s3::config::Builder::from(&base)
            .endpoint_url(endpoint_url.into())
            .force_path_style(true)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: bucket.into(),
            public_base_url: None,
        }
    }

    /// Serve public URLs from a CDN domain instead of the bucket endpoint.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl FlatStore for S3FlatStore {
    async fn put(&self, key: &str, content_type: &str, payload: Bytes) -> HostResult<FlatPutResult> {
        let size_bytes = payload.len() as u64;
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(payload))
            .send()
            .await
            .map_err(|e| HostError::storage_source(format!("s3 put failed for '{}'", key), e))?;

        Ok(FlatPutResult {
            size_bytes,
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn delete(&self, key: &str) -> HostResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| HostError::storage_source(format!("s3 delete failed for '{}'", key), e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> HostResult<Vec<FlatObject>> {
        let mut listed = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| {
                HostError::storage_source(format!("s3 list failed for '{}'", prefix), e)
            })?;

            for object in output.contents() {
                listed.push(FlatObject {
                    key: object.key().unwrap_or_default().to_string(),
                    size_bytes: object.size().unwrap_or(0) as u64,
                });
            }

            if output.is_truncated().unwrap_or(false) {
                continuation = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(listed)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}
