//! Uniform routing layer over the two storage backends.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use roost_core::{AssetKind, BackendKind, HostResult, NamespaceId, TenantCtx, TenantId};

use crate::flat::FlatStore;
use crate::keys::{DefaultVersionKeys, VersionKeys};
use crate::media::{MediaResourceType, MediaStore, MediaUpload, TransformSpec};

/// Backend-agnostic handle to a stored object. This is the only shape that
/// leaves the router; flat keys and media public ids never escape raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum Locator {
    FlatStore {
        key: String,
    },
    MediaStore {
        public_id: String,
        resource_type: MediaResourceType,
        /// `None` while a video ingestion awaits webhook confirmation.
        url: Option<String>,
    },
}

impl Locator {
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::FlatStore { .. } => BackendKind::FlatStore,
            Self::MediaStore { .. } => BackendKind::MediaStore,
        }
    }

    /// Whether the object is still awaiting asynchronous confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::MediaStore { url: None, .. })
    }
}

/// One asset version to store.
#[derive(Debug, Clone)]
pub struct PutAsset {
    pub owner: TenantId,
    pub namespace: NamespaceId,
    pub version: u64,
    pub kind: AssetKind,
    pub content_type: String,
    pub payload: Bytes,
}

/// One object found under a namespace.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
}

/// Routes assets to the flat or media backend by content kind.
///
/// Both routes are registered once at construction; call sites never switch
/// on the kind themselves. Adding an asset kind means extending
/// [`AssetKind::backend`] and, at most, registering a new backend here.
pub struct ObjectStoreRouter {
    flat: Arc<dyn FlatStore>,
    media: Arc<dyn MediaStore>,
    keys: Arc<dyn VersionKeys>,
}

impl ObjectStoreRouter {
    pub fn new(flat: Arc<dyn FlatStore>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            flat,
            media,
            keys: Arc::new(DefaultVersionKeys),
        }
    }

    pub fn with_key_strategy<K: VersionKeys + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Store one version of an asset, returning its locator and stored size.
    ///
    /// The caller picks the version; an update stores under the new version
    /// path without touching prior versions.
    pub async fn put(&self, ctx: &TenantCtx, asset: PutAsset) -> HostResult<(Locator, u64)> {
        let key = self
            .keys
            .object_key(&asset.owner, &asset.namespace, asset.version);

        match asset.kind.backend() {
            BackendKind::FlatStore => {
                tracing::debug!(
                    tenant = %ctx.tenant_id,
                    key = %key,
                    kind = %asset.kind,
                    "storing text asset in flat store"
                );
                let result = self
                    .flat
                    .put(&key, &asset.content_type, asset.payload)
                    .await?;
                Ok((Locator::FlatStore { key }, result.size_bytes))
            }
            BackendKind::MediaStore => {
                let resource_type = match asset.kind {
                    AssetKind::Video => MediaResourceType::Video,
                    _ => MediaResourceType::Image,
                };
                tracing::debug!(
                    tenant = %ctx.tenant_id,
                    public_id = %key,
                    kind = %asset.kind,
                    "storing media asset"
                );
                let upload = self.media.upload(&key, resource_type, asset.payload).await?;
                let size_bytes = upload.size_bytes();
                let locator = match upload {
                    MediaUpload::Ready { public_id, url, .. } => Locator::MediaStore {
                        public_id,
                        resource_type,
                        url: Some(url),
                    },
                    MediaUpload::Pending { public_id, .. } => Locator::MediaStore {
                        public_id,
                        resource_type,
                        url: None,
                    },
                };
                Ok((locator, size_bytes))
            }
        }
    }

    /// Delete the object a locator points at.
    pub async fn delete(&self, locator: &Locator) -> HostResult<()> {
        match locator {
            Locator::FlatStore { key } => self.flat.delete(key).await,
            Locator::MediaStore {
                public_id,
                resource_type,
                ..
            } => self.media.delete(public_id, *resource_type).await,
        }
    }

    /// List every flat-store object under a namespace.
    ///
    /// Site content and text-asset versions live in the flat store; media
    /// objects are tracked through their catalog locators instead.
    pub async fn list_under(
        &self,
        owner: &TenantId,
        namespace: &NamespaceId,
    ) -> HostResult<Vec<StoredObject>> {
        let prefix = self.keys.namespace_prefix(owner, namespace);
        let listed = self.flat.list(&prefix).await?;
        Ok(listed
            .into_iter()
            .map(|o| StoredObject {
                key: o.key,
                size_bytes: o.size_bytes,
            })
            .collect())
    }

    /// Public URL the object is served from, if it is servable yet.
    pub fn public_url(&self, locator: &Locator) -> Option<String> {
        match locator {
            Locator::FlatStore { key } => Some(self.flat.public_url(key)),
            Locator::MediaStore { url, .. } => url.clone(),
        }
    }

    /// Transformation URL for a media locator; `None` for flat objects.
    pub fn transform_url(&self, locator: &Locator, spec: &TransformSpec) -> Option<String> {
        match locator {
            Locator::FlatStore { .. } => None,
            Locator::MediaStore {
                public_id,
                resource_type,
                ..
            } => Some(self.media.transform_url(public_id, *resource_type, spec)),
        }
    }
}
