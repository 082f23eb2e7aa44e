//! Transformation-capable media storage for images and video.
//!
//! Image uploads resolve synchronously to a servable URL. Video ingestion is
//! asynchronous on the provider side: the upload returns a pending public id
//! which is confirmed later by a provider webhook ([`MediaNotification`]).

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use roost_core::{HostError, HostResult};

/// Resource class the media provider distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaResourceType {
    Image,
    Video,
}

impl MediaResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a media upload.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaUpload {
    /// Servable immediately (images).
    Ready {
        public_id: String,
        url: String,
        size_bytes: u64,
    },
    /// Ingestion still running provider-side; confirmed via webhook (video).
    Pending { public_id: String, size_bytes: u64 },
}

impl MediaUpload {
    pub fn public_id(&self) -> &str {
        match self {
            Self::Ready { public_id, .. } | Self::Pending { public_id, .. } => public_id,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::Ready { size_bytes, .. } | Self::Pending { size_bytes, .. } => *size_bytes,
        }
    }
}

/// Provider webhook payload confirming an asynchronous upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaNotification {
    pub notification_type: String,
    pub resource_type: String,
    pub public_id: String,
    pub url: String,
}

impl MediaNotification {
    /// Whether this notification confirms a completed upload.
    pub fn is_upload_confirmation(&self) -> bool {
        self.notification_type == "upload"
    }
}

/// On-demand transformation parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Render as a provider query string, empty when no parameters are set.
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(w) = self.width {
            parts.push(format!("w={}", w));
        }
        if let Some(h) = self.height {
            parts.push(format!("h={}", h));
        }
        if let Some(f) = &self.format {
            parts.push(format!("fm={}", f));
        }
        parts.join("&")
    }
}

/// Media storage primitives. Must be implemented by all media backends.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a payload under an explicit public id.
    async fn upload(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        payload: Bytes,
    ) -> HostResult<MediaUpload>;

    /// Delete a resource. Deleting a missing id is a no-op.
    async fn delete(&self, public_id: &str, resource_type: MediaResourceType) -> HostResult<()>;

    /// URL serving the resource with a transformation applied.
    fn transform_url(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        spec: &TransformSpec,
    ) -> String;
}

/// In-memory media store for tests and development.
///
/// Images resolve immediately; video stays pending until
/// [`MemoryMediaStore::confirm_pending`] simulates the provider webhook.
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, MediaResourceType>>,
    pending: RwLock<HashSet<String>>,
    base_url: String,
    fail_uploads: RwLock<bool>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashSet::new()),
            base_url: "https://media.test".to_string(),
            fail_uploads: RwLock::new(false),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url_for(&self, public_id: &str, resource_type: MediaResourceType) -> String {
        format!("{}/{}/{}", self.base_url, resource_type, public_id)
    }

    /// Number of stored resources.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether a video upload is still awaiting confirmation.
    pub fn is_pending(&self, public_id: &str) -> bool {
        self.pending.read().contains(public_id)
    }

    /// Test helper: complete a pending ingestion and produce the webhook
    /// payload the provider would send.
    pub fn confirm_pending(&self, public_id: &str) -> Option<MediaNotification> {
        if !self.pending.write().remove(public_id) {
            return None;
        }
        let resource_type = *self.objects.read().get(public_id)?;
        Some(MediaNotification {
            notification_type: "upload".to_string(),
            resource_type: resource_type.as_str().to_string(),
            public_id: public_id.to_string(),
            url: self.url_for(public_id, resource_type),
        })
    }

    /// Test helper: make every subsequent upload fail with a storage error.
    pub fn fail_next_uploads(&self, fail: bool) {
        *self.fail_uploads.write() = fail;
    }
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        payload: Bytes,
    ) -> HostResult<MediaUpload> {
        if *self.fail_uploads.read() {
            return Err(HostError::storage(format!(
                "simulated upload failure for '{}'",
                public_id
            )));
        }

        let size_bytes = payload.len() as u64;
        self.objects
            .write()
            .insert(public_id.to_string(), resource_type);

        match resource_type {
            MediaResourceType::Image => Ok(MediaUpload::Ready {
                public_id: public_id.to_string(),
                url: self.url_for(public_id, resource_type),
                size_bytes,
            }),
            MediaResourceType::Video => {
                self.pending.write().insert(public_id.to_string());
                Ok(MediaUpload::Pending {
                    public_id: public_id.to_string(),
                    size_bytes,
                })
            }
        }
    }

    async fn delete(&self, public_id: &str, _resource_type: MediaResourceType) -> HostResult<()> {
        self.objects.write().remove(public_id);
        self.pending.write().remove(public_id);
        Ok(())
    }

    fn transform_url(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        spec: &TransformSpec,
    ) -> String {
        let base = self.url_for(public_id, resource_type);
        let query = spec.to_query();
        if query.is_empty() {
            base
        } else {
            format!("{}?{}", base, query)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderUploadResponse {
    status: String,
    url: Option<String>,
}

/// Media store speaking HTTP to a transformation provider.
pub struct HttpMediaStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    delivery_base_url: String,
}

impl HttpMediaStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        delivery_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            delivery_base_url: delivery_base_url.into(),
        }
    }

    fn resource_url(&self, public_id: &str, resource_type: MediaResourceType) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            resource_type,
            public_id
        )
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        payload: Bytes,
    ) -> HostResult<MediaUpload> {
        let size_bytes = payload.len() as u64;
        let response = self
            .http
            .put(self.resource_url(public_id, resource_type))
            .header("x-api-key", &self.api_key)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                HostError::storage_source(format!("media upload failed for '{}'", public_id), e)
            })?
            .error_for_status()
            .map_err(|e| {
                HostError::storage_source(format!("media provider rejected '{}'", public_id), e)
            })?;

        let body: ProviderUploadResponse = response.json().await.map_err(|e| {
            HostError::storage_source(format!("unreadable provider response for '{}'", public_id), e)
        })?;

        match body.status.as_str() {
            "ready" => {
                let url = body.url.ok_or_else(|| {
                    HostError::storage(format!("provider returned no URL for '{}'", public_id))
                })?;
                Ok(MediaUpload::Ready {
                    public_id: public_id.to_string(),
                    url,
                    size_bytes,
                })
            }
            // Anything not ready is confirmed later via webhook.
            _ => Ok(MediaUpload::Pending {
                public_id: public_id.to_string(),
                size_bytes,
            }),
        }
    }

    async fn delete(&self, public_id: &str, resource_type: MediaResourceType) -> HostResult<()> {
        let response = self
            .http
            .delete(self.resource_url(public_id, resource_type))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                HostError::storage_source(format!("media delete failed for '{}'", public_id), e)
            })?;

        // Providers answer 404 for already-removed resources; that is a no-op.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status().map_err(|e| {
            HostError::storage_source(format!("media delete rejected for '{}'", public_id), e)
        })?;
        Ok(())
    }

    fn transform_url(
        &self,
        public_id: &str,
        resource_type: MediaResourceType,
        spec: &TransformSpec,
    ) -> String {
        let base = format!(
            "{}/{}/{}",
            self.delivery_base_url.trim_end_matches('/'),
            resource_type,
            public_id
        );
        let query = spec.to_query();
        if query.is_empty() {
            base
        } else {
            format!("{}?{}", base, query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn image_uploads_resolve_immediately() {
        let store = MemoryMediaStore::new();
        let upload = store
            .upload("t1/ns/v1", MediaResourceType::Image, Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert!(matches!(upload, MediaUpload::Ready { .. }));
        assert!(!store.is_pending("t1/ns/v1"));
    }

    #[tokio::test]
    async fn video_uploads_stay_pending_until_webhook() {
        let store = MemoryMediaStore::new();
        let upload = store
            .upload("t1/ns/v1", MediaResourceType::Video, Bytes::from_static(b"mp4"))
            .await
            .unwrap();

        assert!(matches!(upload, MediaUpload::Pending { .. }));
        assert!(store.is_pending("t1/ns/v1"));

        let notification = store.confirm_pending("t1/ns/v1").unwrap();
        assert!(notification.is_upload_confirmation());
        assert_eq!(notification.resource_type, "video");
        assert!(!store.is_pending("t1/ns/v1"));

        // Confirming twice is not possible.
        assert!(store.confirm_pending("t1/ns/v1").is_none());
    }

    #[test]
    fn notification_payload_shape() {
        let json = r#"{
            "notificationType": "upload",
            "resourceType": "video",
            "publicId": "t1/ns/v3",
            "url": "https://media.test/video/t1/ns/v3"
        }"#;
        let parsed: MediaNotification = serde_json::from_str(json).unwrap();
        assert!(parsed.is_upload_confirmation());
        assert_eq!(parsed.public_id, "t1/ns/v3");
    }

    #[test]
    fn transform_query_rendering() {
        let spec = TransformSpec::new().with_width(640).with_format("webp");
        let store = MemoryMediaStore::new();
        let url = store.transform_url("t1/ns/v1", MediaResourceType::Image, &spec);
        assert_eq!(url, "https://media.test/image/t1/ns/v1?w=640&fm=webp");

        let plain = store.transform_url("t1/ns/v1", MediaResourceType::Image, &TransformSpec::new());
        assert!(!plain.contains('?'));
    }
}
