use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use roost_core::{HostError, HostResult, TenantCtx, TenantId};

use crate::bucket::QuotaBucket;
use crate::policy::{Tier, TierPolicySource};

/// Running counters for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUsage {
    pub tier: Tier,
    pub subdomain_slots_remaining: u32,
    pub css_js_bytes_used: u64,
    pub media_bytes_used: u64,
    pub file_bytes_used: u64,
}

impl TenantUsage {
    /// Bytes currently used in a bucket.
    pub fn bytes_used(&self, bucket: QuotaBucket) -> u64 {
        match bucket {
            QuotaBucket::CssJs => self.css_js_bytes_used,
            QuotaBucket::Media => self.media_bytes_used,
            QuotaBucket::SiteFiles => self.file_bytes_used,
        }
    }

    fn bytes_used_mut(&mut self, bucket: QuotaBucket) -> &mut u64 {
        match bucket {
            QuotaBucket::CssJs => &mut self.css_js_bytes_used,
            QuotaBucket::Media => &mut self.media_bytes_used,
            QuotaBucket::SiteFiles => &mut self.file_bytes_used,
        }
    }
}

/// Per-tenant quota counters.
///
/// There is no mutual exclusion between a headroom check and the debit that
/// follows it: two concurrent uploads by the same tenant read-modify-write
/// the same counter independently and can transiently overshoot the tier
/// limit. `recompute` is the corrective lever.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Seed counters for a tenant from its tier policy. Idempotent: an
    /// existing account is returned unchanged.
    async fn open_account(&self, ctx: &TenantCtx, tier: Tier) -> HostResult<TenantUsage>;

    /// Current counters for a tenant.
    async fn usage(&self, ctx: &TenantCtx) -> HostResult<TenantUsage>;

    /// Check that `bytes` fit in the bucket's remaining headroom. Pure read;
    /// reserves nothing.
    async fn check_headroom(
        &self,
        ctx: &TenantCtx,
        bucket: QuotaBucket,
        bytes: u64,
    ) -> HostResult<()>;

    /// Add used bytes to a bucket.
    async fn debit(&self, ctx: &TenantCtx, bucket: QuotaBucket, bytes: u64) -> HostResult<()>;

    /// Reclaim used bytes from a bucket. Saturates at zero.
    async fn credit(&self, ctx: &TenantCtx, bucket: QuotaBucket, bytes: u64) -> HostResult<()>;

    /// Consume one subdomain slot.
    async fn take_slot(&self, ctx: &TenantCtx) -> HostResult<()>;

    /// Return one subdomain slot. Caps at the tier's slot limit.
    async fn restore_slot(&self, ctx: &TenantCtx) -> HostResult<()>;

    /// Overwrite byte counters from an authoritative recount.
    async fn recompute(
        &self,
        ctx: &TenantCtx,
        observed: &[(QuotaBucket, u64)],
    ) -> HostResult<TenantUsage>;
}

/// In-memory ledger for tests and development.
pub struct MemoryQuotaLedger {
    accounts: RwLock<HashMap<TenantId, TenantUsage>>,
    policies: Arc<dyn TierPolicySource>,
    fail_debits: RwLock<bool>,
}

impl MemoryQuotaLedger {
    pub fn new(policies: Arc<dyn TierPolicySource>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            policies,
            fail_debits: RwLock::new(false),
        }
    }

    /// Test helper: make every subsequent debit fail with a storage error.
    pub fn fail_next_debits(&self, fail: bool) {
        *self.fail_debits.write() = fail;
    }

    fn account(&self, tenant: &TenantId) -> HostResult<TenantUsage> {
        self.accounts
            .read()
            .get(tenant)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", tenant)))
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn open_account(&self, ctx: &TenantCtx, tier: Tier) -> HostResult<TenantUsage> {
        if let Some(existing) = self.accounts.read().get(&ctx.tenant_id) {
            return Ok(existing.clone());
        }

        let policy = self.policies.policy_for(&tier)?;
        let usage = TenantUsage {
            tier,
            subdomain_slots_remaining: policy.subdomain_slot_limit,
            css_js_bytes_used: 0,
            media_bytes_used: 0,
            file_bytes_used: 0,
        };

        let mut accounts = self.accounts.write();
        Ok(accounts
            .entry(ctx.tenant_id.clone())
            .or_insert(usage)
            .clone())
    }

    async fn usage(&self, ctx: &TenantCtx) -> HostResult<TenantUsage> {
        self.account(&ctx.tenant_id)
    }

    async fn check_headroom(
        &self,
        ctx: &TenantCtx,
        bucket: QuotaBucket,
        bytes: u64,
    ) -> HostResult<()> {
        let usage = self.account(&ctx.tenant_id)?;
        let policy = self.policies.policy_for(&usage.tier)?;
        let remaining = policy
            .byte_limit(bucket)
            .saturating_sub(usage.bytes_used(bucket));

        if bytes > remaining {
            return Err(HostError::quota_exceeded(bucket.as_str(), bytes, remaining));
        }
        Ok(())
    }

    async fn debit(&self, ctx: &TenantCtx, bucket: QuotaBucket, bytes: u64) -> HostResult<()> {
        if *self.fail_debits.read() {
            return Err(HostError::storage("simulated ledger debit failure"));
        }
        let mut accounts = self.accounts.write();
        let usage = accounts
            .get_mut(&ctx.tenant_id)
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", ctx.tenant_id)))?;
        *usage.bytes_used_mut(bucket) += bytes;
        Ok(())
    }

    async fn credit(&self, ctx: &TenantCtx, bucket: QuotaBucket, bytes: u64) -> HostResult<()> {
        let mut accounts = self.accounts.write();
        let usage = accounts
            .get_mut(&ctx.tenant_id)
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", ctx.tenant_id)))?;
        let used = usage.bytes_used_mut(bucket);
        *used = used.saturating_sub(bytes);
        Ok(())
    }

    async fn take_slot(&self, ctx: &TenantCtx) -> HostResult<()> {
        let mut accounts = self.accounts.write();
        let usage = accounts
            .get_mut(&ctx.tenant_id)
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", ctx.tenant_id)))?;

        if usage.subdomain_slots_remaining == 0 {
            return Err(HostError::quota_exceeded("subdomain-slots", 1, 0));
        }
        usage.subdomain_slots_remaining -= 1;
        Ok(())
    }

    async fn restore_slot(&self, ctx: &TenantCtx) -> HostResult<()> {
        let policy = {
            let usage = self.account(&ctx.tenant_id)?;
            self.policies.policy_for(&usage.tier)?
        };

        let mut accounts = self.accounts.write();
        let usage = accounts
            .get_mut(&ctx.tenant_id)
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", ctx.tenant_id)))?;

        if usage.subdomain_slots_remaining < policy.subdomain_slot_limit {
            usage.subdomain_slots_remaining += 1;
        } else {
            tracing::warn!(
                tenant = %ctx.tenant_id,
                "slot restore ignored: tenant already at slot limit"
            );
        }
        Ok(())
    }

    async fn recompute(
        &self,
        ctx: &TenantCtx,
        observed: &[(QuotaBucket, u64)],
    ) -> HostResult<TenantUsage> {
        let mut accounts = self.accounts.write();
        let usage = accounts
            .get_mut(&ctx.tenant_id)
            .ok_or_else(|| HostError::not_found(format!("tenant '{}'", ctx.tenant_id)))?;

        for (bucket, bytes) in observed {
            let counter = usage.bytes_used_mut(*bucket);
            if *counter != *bytes {
                tracing::info!(
                    tenant = %ctx.tenant_id,
                    bucket = %bucket,
                    was = *counter,
                    now = *bytes,
                    "ledger counter corrected from recount"
                );
            }
            *counter = *bytes;
        }
        Ok(usage.clone())
    }
}
