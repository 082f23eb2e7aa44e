//! Reclamation sagas with per-step outcomes.
//!
//! Partial failure is a first-class return value here: every step of a
//! deletion records whether it succeeded, and bulk operations surface an
//! aggregate warning count instead of failing on the first broken backend.

use futures::future::join_all;
use std::sync::Arc;

use roost_core::{AssetId, HostError, HostResult, TenantCtx};
use roost_quota::{QuotaBucket, QuotaLedger};
use roost_store::ObjectStoreRouter;

use crate::catalog::AssetCatalog;

/// Outcome of one saga step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Failed(String),
    Skipped,
}

/// One recorded step of a deletion saga.
#[derive(Debug, Clone)]
pub struct SagaStep {
    pub label: String,
    pub outcome: StepOutcome,
}

/// Steps taken by one deletion, plus the number of best-effort failures.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    pub steps: Vec<SagaStep>,
    pub warnings: u32,
}

impl DeletionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&mut self, label: impl Into<String>) {
        self.steps.push(SagaStep {
            label: label.into(),
            outcome: StepOutcome::Ok,
        });
    }

    pub fn push_failed(&mut self, label: impl Into<String>, reason: impl Into<String>) {
        self.steps.push(SagaStep {
            label: label.into(),
            outcome: StepOutcome::Failed(reason.into()),
        });
        self.warnings += 1;
    }

    pub fn push_skipped(&mut self, label: impl Into<String>) {
        self.steps.push(SagaStep {
            label: label.into(),
            outcome: StepOutcome::Skipped,
        });
    }

    /// Whether every recorded step succeeded.
    pub fn clean(&self) -> bool {
        self.warnings == 0
    }
}

/// Result of a bulk per-tenant purge.
#[derive(Debug, Clone)]
pub struct PurgeReport {
    pub attempted: usize,
    pub deleted: usize,
    pub warnings: u32,
}

/// Deletes assets and reclaims their quota.
pub struct AssetReclaimer {
    router: Arc<ObjectStoreRouter>,
    catalog: Arc<dyn AssetCatalog>,
    ledger: Arc<dyn QuotaLedger>,
}

impl AssetReclaimer {
    pub fn new(
        router: Arc<ObjectStoreRouter>,
        catalog: Arc<dyn AssetCatalog>,
        ledger: Arc<dyn QuotaLedger>,
    ) -> Self {
        Self {
            router,
            catalog,
            ledger,
        }
    }

    /// Delete one asset. Remote deletion is attempted first; the catalog
    /// record is removed and the ledger credited regardless of its outcome.
    pub async fn delete_asset(
        &self,
        ctx: &TenantCtx,
        asset_id: &AssetId,
    ) -> HostResult<DeletionReport> {
        let asset = self.catalog.fetch(asset_id).await?;
        if asset.owner != ctx.tenant_id {
            return Err(HostError::authorization(format!(
                "tenant '{}' does not own asset '{}'",
                ctx.tenant_id, asset_id
            )));
        }

        let mut report = DeletionReport::new();

        match self.router.delete(&asset.locator).await {
            Ok(()) => report.push_ok("remote-object"),
            Err(e) => {
                tracing::warn!(
                    asset = %asset_id,
                    locator = ?asset.locator,
                    error = %e,
                    "remote delete failed; continuing local cleanup"
                );
                report.push_failed("remote-object", e.to_string());
            }
        }

        self.catalog.remove(asset_id).await?;
        report.push_ok("catalog-record");

        self.ledger
            .credit(ctx, QuotaBucket::for_kind(asset.kind), asset.size_bytes)
            .await?;
        report.push_ok("reclaim-bytes");

        Ok(report)
    }

    /// Delete every asset a tenant owns, fanning out concurrently.
    ///
    /// One failing deletion never blocks the others; failures surface as a
    /// warning count on the aggregate, never as a hard failure.
    pub async fn purge_tenant(&self, ctx: &TenantCtx) -> HostResult<PurgeReport> {
        let assets = self.catalog.list_owned(&ctx.tenant_id).await?;
        let attempted = assets.len();

        let deletions = assets
            .iter()
            .map(|asset| self.delete_asset(ctx, &asset.asset_id));
        let results = join_all(deletions).await;

        let mut deleted = 0usize;
        let mut warnings = 0u32;
        for result in results {
            match result {
                Ok(report) => {
                    deleted += 1;
                    warnings += report.warnings;
                }
                Err(e) => {
                    tracing::warn!(tenant = %ctx.tenant_id, error = %e, "purge item failed");
                    warnings += 1;
                }
            }
        }

        Ok(PurgeReport {
            attempted,
            deleted,
            warnings,
        })
    }
}
