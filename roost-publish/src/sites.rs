//! Whole-site publication over the flat store at folder granularity.

use bytes::Bytes;
use std::sync::Arc;

use roost_core::{HostError, HostResult, NamespaceId, TenantCtx};
use roost_quota::{QuotaBucket, QuotaLedger};
use roost_registry::{Resolver, SubdomainName, SubdomainRecord, Visibility};
use roost_store::{FlatStore, VersionKeys};

use crate::deletion::DeletionReport;

/// One file of a static site.
#[derive(Debug, Clone)]
pub struct SiteFile {
    pub path: String,
    pub content_type: String,
    pub payload: Bytes,
}

impl SiteFile {
    pub fn new(
        path: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            payload: payload.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.payload.len() as u64
    }
}

fn total_bytes(files: &[SiteFile]) -> u64 {
    files.iter().map(SiteFile::size_bytes).sum()
}

/// Publishes, replaces and deletes whole sites.
///
/// A site's files live in the flat store under the subdomain's namespace
/// prefix; the subdomain record is created only after every upload succeeds,
/// and deletion reclaims local state regardless of remote outcome.
pub struct SitePublisher {
    flat: Arc<dyn FlatStore>,
    keys: Arc<dyn VersionKeys>,
    resolver: Arc<Resolver>,
    ledger: Arc<dyn QuotaLedger>,
}

impl SitePublisher {
    pub fn new(
        flat: Arc<dyn FlatStore>,
        keys: Arc<dyn VersionKeys>,
        resolver: Arc<Resolver>,
        ledger: Arc<dyn QuotaLedger>,
    ) -> Self {
        Self {
            flat,
            keys,
            resolver,
            ledger,
        }
    }

    /// Publish a new site under a fresh namespace.
    pub async fn publish(
        &self,
        ctx: &TenantCtx,
        name: SubdomainName,
        visibility: Visibility,
        files: Vec<SiteFile>,
    ) -> HostResult<SubdomainRecord> {
        if files.is_empty() {
            return Err(HostError::validation("a site needs at least one file"));
        }

        let total = total_bytes(&files);
        self.ledger
            .check_headroom(ctx, QuotaBucket::SiteFiles, total)
            .await?;
        self.ledger.take_slot(ctx).await?;

        let namespace = NamespaceId::new();
        if let Err(e) = self.upload_all(ctx, &namespace, &files).await {
            self.clear_namespace(ctx, &namespace).await;
            self.give_back_slot(ctx).await;
            return Err(e);
        }

        // Record exists only once its remote objects do.
        let record = match self
            .resolver
            .register(ctx, name, namespace.clone(), visibility, total)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                self.clear_namespace(ctx, &namespace).await;
                self.give_back_slot(ctx).await;
                return Err(e);
            }
        };

        if let Err(e) = self.ledger.debit(ctx, QuotaBucket::SiteFiles, total).await {
            tracing::warn!(
                tenant = %ctx.tenant_id,
                name = %record.name,
                error = %e,
                "ledger debit failed after publish; rolling back registration"
            );
            if let Err(undo) = self.resolver.deregister(ctx, &record.name).await {
                tracing::warn!(error = %undo, "compensating deregister failed");
            }
            self.clear_namespace(ctx, &namespace).await;
            self.give_back_slot(ctx).await;
            return Err(e);
        }

        Ok(record)
    }

    /// Replace every file of an existing site.
    ///
    /// Quota is checked net of the site's current size. The ledger delta is
    /// applied up front and rolled back to its pre-attempt value if the
    /// upload fails after the old contents were deleted.
    pub async fn replace_content(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
        files: Vec<SiteFile>,
    ) -> HostResult<SubdomainRecord> {
        if files.is_empty() {
            return Err(HostError::validation("a site needs at least one file"));
        }

        let record = self.resolver.authorized(ctx, name).await?;
        let new_total = total_bytes(&files);
        let old_total = record.content_bytes;

        if new_total > old_total {
            self.ledger
                .check_headroom(ctx, QuotaBucket::SiteFiles, new_total - old_total)
                .await?;
        }

        self.apply_delta(ctx, old_total, new_total).await?;

        // Old contents go first; the namespace is reused for the new upload.
        self.clear_namespace(ctx, &record.namespace).await;

        if let Err(e) = self.upload_all(ctx, &record.namespace, &files).await {
            // Roll the counter back to its pre-attempt value and clear the
            // staging area. The old contents are already gone; the site
            // serves empty until the tenant retries.
            if let Err(undo) = self.apply_delta(ctx, new_total, old_total).await {
                tracing::warn!(error = %undo, "ledger rollback failed after aborted replace");
            }
            self.clear_namespace(ctx, &record.namespace).await;
            tracing::warn!(
                tenant = %ctx.tenant_id,
                name = %name,
                error = %e,
                "content replacement aborted after old contents were deleted"
            );
            return Err(e);
        }

        match self
            .resolver
            .registry()
            .set_content_bytes(name, new_total)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(e) => {
                if let Err(undo) = self.apply_delta(ctx, new_total, old_total).await {
                    tracing::warn!(error = %undo, "ledger rollback failed after persist failure");
                }
                tracing::warn!(
                    tenant = %ctx.tenant_id,
                    name = %name,
                    error = %e,
                    "size persist failed; remote contents already replaced"
                );
                Err(e)
            }
        }
    }

    /// Rename a site, swapping its cache keys.
    pub async fn rename(
        &self,
        ctx: &TenantCtx,
        old: &SubdomainName,
        new: SubdomainName,
    ) -> HostResult<SubdomainRecord> {
        self.resolver.rename(ctx, old, new).await
    }

    /// Change a site's visibility.
    pub async fn set_visibility(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
        visibility: Visibility,
    ) -> HostResult<SubdomainRecord> {
        self.resolver.set_visibility(ctx, name, visibility).await
    }

    /// Delete a site: best-effort remote cleanup, then unconditional removal
    /// of the record, cache entry and ledger charges.
    pub async fn delete_site(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
    ) -> HostResult<DeletionReport> {
        let record = self.resolver.authorized(ctx, name).await?;
        let mut report = DeletionReport::new();

        let prefix = self.keys.namespace_prefix(&record.owner, &record.namespace);
        match self.flat.list(&prefix).await {
            Ok(objects) => {
                let mut failed = 0usize;
                for object in &objects {
                    if let Err(e) = self.flat.delete(&object.key).await {
                        tracing::warn!(key = %object.key, error = %e, "remote delete failed");
                        failed += 1;
                    }
                }
                if failed == 0 {
                    report.push_ok("remote-objects");
                } else {
                    report.push_failed(
                        "remote-objects",
                        format!("{} of {} objects not deleted", failed, objects.len()),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "remote listing failed");
                report.push_failed("remote-objects", e.to_string());
            }
        }

        // Local cleanup and reclamation happen regardless of remote outcome.
        self.resolver.deregister(ctx, name).await?;
        report.push_ok("subdomain-record");

        self.ledger
            .credit(ctx, QuotaBucket::SiteFiles, record.content_bytes)
            .await?;
        report.push_ok("reclaim-bytes");

        self.ledger.restore_slot(ctx).await?;
        report.push_ok("restore-slot");

        Ok(report)
    }

    async fn upload_all(
        &self,
        ctx: &TenantCtx,
        namespace: &NamespaceId,
        files: &[SiteFile],
    ) -> HostResult<()> {
        for file in files {
            let key = self.keys.site_key(&ctx.tenant_id, namespace, &file.path);
            self.flat
                .put(&key, &file.content_type, file.payload.clone())
                .await?;
        }
        Ok(())
    }

    /// Best-effort removal of everything under a namespace.
    async fn clear_namespace(&self, ctx: &TenantCtx, namespace: &NamespaceId) {
        let prefix = self.keys.namespace_prefix(&ctx.tenant_id, namespace);
        match self.flat.list(&prefix).await {
            Ok(objects) => {
                for object in objects {
                    if let Err(e) = self.flat.delete(&object.key).await {
                        tracing::warn!(key = %object.key, error = %e, "staged cleanup failed");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "staged listing failed");
            }
        }
    }

    async fn apply_delta(&self, ctx: &TenantCtx, from: u64, to: u64) -> HostResult<()> {
        if to >= from {
            self.ledger
                .debit(ctx, QuotaBucket::SiteFiles, to - from)
                .await
        } else {
            self.ledger
                .credit(ctx, QuotaBucket::SiteFiles, from - to)
                .await
        }
    }

    async fn give_back_slot(&self, ctx: &TenantCtx) {
        if let Err(e) = self.ledger.restore_slot(ctx).await {
            tracing::warn!(tenant = %ctx.tenant_id, error = %e, "slot restore failed");
        }
    }
}
