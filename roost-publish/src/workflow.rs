//! The upload state machine.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use roost_core::{AssetId, HostError, HostResult, NamespaceId, TenantCtx};
use roost_quota::{QuotaBucket, QuotaLedger};
use roost_store::{classify, ObjectStoreRouter, PutAsset, FIRST_VERSION};

use crate::catalog::{AssetCatalog, CdnAsset};

/// States of the upload workflow. `Aborted` is terminal and reachable from
/// every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadState {
    Validate,
    Classify,
    CheckQuota,
    Store,
    PersistMetadata,
    UpdateLedger,
    Done,
    Aborted,
}

/// One upload: a first version, a new version of an existing asset, or a
/// metadata-only patch.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Target asset for an update; `None` creates a new asset.
    pub asset_id: Option<AssetId>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub payload: Option<Bytes>,
    pub attributes: Option<serde_json::Value>,
    /// `None` keeps the asset's current setting (off for new assets).
    pub transform_enabled: Option<bool>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self {
            asset_id: None,
            filename: None,
            content_type: None,
            payload: None,
            attributes: None,
            transform_enabled: None,
        }
    }

    pub fn for_asset(mut self, asset_id: AssetId) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_transform_enabled(mut self, enabled: bool) -> Self {
        self.transform_enabled = Some(enabled);
        self
    }
}

impl Default for UploadRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub state: UploadState,
    pub asset: CdnAsset,
}

/// Configuration for the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Upper bound on the remote store call; elapsing aborts the workflow
    /// with a storage error.
    pub store_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

/// Drives an upload through validate → classify → quota → store → metadata
/// → ledger, with compensating rollback on late failures.
pub struct UploadWorkflow {
    router: Arc<ObjectStoreRouter>,
    catalog: Arc<dyn AssetCatalog>,
    ledger: Arc<dyn QuotaLedger>,
    config: WorkflowConfig,
}

impl UploadWorkflow {
    pub fn new(
        router: Arc<ObjectStoreRouter>,
        catalog: Arc<dyn AssetCatalog>,
        ledger: Arc<dyn QuotaLedger>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            router,
            catalog,
            ledger,
            config,
        }
    }

    /// Run one upload to completion or abort.
    pub async fn run(&self, ctx: &TenantCtx, request: UploadRequest) -> HostResult<UploadReport> {
        let mut state = UploadState::Validate;
        match self.drive(ctx, request, &mut state).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!(
                    tenant = %ctx.tenant_id,
                    request_id = %ctx.request_id,
                    aborted_from = ?state,
                    error = %e,
                    "upload aborted"
                );
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        ctx: &TenantCtx,
        request: UploadRequest,
        state: &mut UploadState,
    ) -> HostResult<UploadReport> {
        if request.payload.is_none() && request.attributes.is_none() {
            return Err(HostError::validation(
                "upload requires a file payload or a metadata blob",
            ));
        }

        let Some(payload) = request.payload.clone() else {
            return self.patch_metadata(ctx, request).await;
        };

        *state = UploadState::Classify;
        let kind = classify(request.content_type.as_deref(), request.filename.as_deref())?;

        let existing = match &request.asset_id {
            Some(asset_id) => {
                let asset = self.catalog.fetch(asset_id).await?;
                if asset.owner != ctx.tenant_id {
                    return Err(HostError::authorization(format!(
                        "tenant '{}' does not own asset '{}'",
                        ctx.tenant_id, asset_id
                    )));
                }
                if asset.kind.backend() != kind.backend() {
                    return Err(HostError::validation(format!(
                        "asset '{}' is served from the {} backend and cannot move to {}",
                        asset_id,
                        asset.kind.backend(),
                        kind.backend()
                    )));
                }
                Some(asset)
            }
            None => None,
        };

        *state = UploadState::CheckQuota;
        let size = payload.len() as u64;
        let bucket = QuotaBucket::for_kind(kind);
        self.ledger.check_headroom(ctx, bucket, size).await?;

        *state = UploadState::Store;
        let version = existing
            .as_ref()
            .map(|a| a.current_version + 1)
            .unwrap_or(FIRST_VERSION);
        let namespace = existing
            .as_ref()
            .map(|a| a.namespace.clone())
            .unwrap_or_else(NamespaceId::new);
        let content_type = request
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        // The prior version path is left untouched so a rollback can restore
        // the old pointer without re-uploading anything.
        let put = PutAsset {
            owner: ctx.tenant_id.clone(),
            namespace: namespace.clone(),
            version,
            kind,
            content_type,
            payload,
        };
        let (locator, stored_size) =
            match tokio::time::timeout(self.config.store_timeout, self.router.put(ctx, put)).await
            {
                Ok(result) => result?,
                Err(_) => return Err(HostError::storage("store operation timed out")),
            };

        *state = UploadState::PersistMetadata;
        let now = Utc::now();
        let record = match &existing {
            Some(prior) => CdnAsset {
                filename: request.filename.clone().unwrap_or_else(|| prior.filename.clone()),
                kind,
                current_version: version,
                previous_version: Some(prior.current_version),
                size_bytes: stored_size,
                locator,
                transform_enabled: request.transform_enabled.unwrap_or(prior.transform_enabled),
                attributes: request
                    .attributes
                    .clone()
                    .unwrap_or_else(|| prior.attributes.clone()),
                updated_at: now,
                ..prior.clone()
            },
            None => CdnAsset {
                asset_id: AssetId::new(),
                owner: ctx.tenant_id.clone(),
                namespace,
                filename: request.filename.clone().unwrap_or_default(),
                kind,
                current_version: version,
                previous_version: None,
                size_bytes: stored_size,
                locator,
                transform_enabled: request.transform_enabled.unwrap_or(false),
                transform_use_count: 0,
                attributes: request.attributes.clone().unwrap_or(serde_json::Value::Null),
                created_at: now,
                updated_at: now,
            },
        };

        let persisted = match &existing {
            Some(_) => self.catalog.update(record.clone()).await,
            None => self.catalog.insert(record.clone()).await,
        };
        if let Err(e) = persisted {
            // The stored object has no record pointing at it. Reconciliation
            // picks it up later; nothing to retry synchronously.
            tracing::warn!(
                tenant = %ctx.tenant_id,
                locator = ?record.locator,
                error = %e,
                "metadata persist failed after store; object orphaned"
            );
            return Err(e);
        }

        *state = UploadState::UpdateLedger;
        let old_size = existing.as_ref().map(|a| a.size_bytes).unwrap_or(0);
        let charged = if stored_size >= old_size {
            self.ledger.debit(ctx, bucket, stored_size - old_size).await
        } else {
            self.ledger.credit(ctx, bucket, old_size - stored_size).await
        };
        if let Err(e) = charged {
            self.revert_metadata(ctx, &existing, &record).await;
            tracing::warn!(
                tenant = %ctx.tenant_id,
                locator = ?record.locator,
                error = %e,
                "ledger update failed; catalog reverted, stored bytes left for cleanup"
            );
            return Err(e);
        }

        *state = UploadState::Done;
        Ok(UploadReport {
            state: UploadState::Done,
            asset: record,
        })
    }

    /// Metadata-only path: patch attributes and flags on an existing asset.
    /// No bytes move, no version bump, no ledger change.
    async fn patch_metadata(
        &self,
        ctx: &TenantCtx,
        request: UploadRequest,
    ) -> HostResult<UploadReport> {
        let asset_id = request.asset_id.as_ref().ok_or_else(|| {
            HostError::validation("metadata-only upload requires an existing asset")
        })?;

        let mut asset = self.catalog.fetch(asset_id).await?;
        if asset.owner != ctx.tenant_id {
            return Err(HostError::authorization(format!(
                "tenant '{}' does not own asset '{}'",
                ctx.tenant_id, asset_id
            )));
        }

        if let Some(attributes) = request.attributes {
            asset.attributes = attributes;
        }
        if let Some(enabled) = request.transform_enabled {
            asset.transform_enabled = enabled;
        }
        if let Some(filename) = request.filename {
            asset.filename = filename;
        }
        asset.updated_at = Utc::now();

        self.catalog.update(asset.clone()).await?;
        Ok(UploadReport {
            state: UploadState::Done,
            asset,
        })
    }

    async fn revert_metadata(
        &self,
        ctx: &TenantCtx,
        existing: &Option<CdnAsset>,
        record: &CdnAsset,
    ) {
        let reverted = match existing {
            Some(prior) => self.catalog.update(prior.clone()).await,
            None => self.catalog.remove(&record.asset_id).await.map(|_| ()),
        };
        if let Err(e) = reverted {
            tracing::warn!(
                tenant = %ctx.tenant_id,
                asset = %record.asset_id,
                error = %e,
                "compensating catalog revert failed"
            );
        }
    }
}
