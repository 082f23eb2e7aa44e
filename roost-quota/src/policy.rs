use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use roost_core::{HostError, HostResult};

use crate::bucket::QuotaBucket;

/// Subscription tier identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier(pub String);

impl Tier {
    pub fn from_string(tier: String) -> Self {
        Self(tier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tier {
    fn from(tier: &str) -> Self {
        Self(tier.to_string())
    }
}

/// Quota limits granted by a subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub subdomain_slot_limit: u32,
    pub file_byte_limit: u64,
    pub css_js_byte_limit: u64,
    pub media_byte_limit: u64,
}

impl TierPolicy {
    /// Byte limit for a bucket.
    pub fn byte_limit(&self, bucket: QuotaBucket) -> u64 {
        match bucket {
            QuotaBucket::CssJs => self.css_js_byte_limit,
            QuotaBucket::Media => self.media_byte_limit,
            QuotaBucket::SiteFiles => self.file_byte_limit,
        }
    }
}

/// Source of tier → quota mappings.
///
/// A missing row is a fatal misconfiguration, not a user error: every tier
/// that can reach the ledger must have been registered at startup.
pub trait TierPolicySource: Send + Sync {
    fn policy_for(&self, tier: &Tier) -> HostResult<TierPolicy>;
}

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Static in-process policy table, registered once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticTierPolicies {
    rows: HashMap<Tier, TierPolicy>,
}

impl StaticTierPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy row for a tier.
    pub fn with_policy(mut self, tier: impl Into<Tier>, policy: TierPolicy) -> Self {
        self.rows.insert(tier.into(), policy);
        self
    }

    /// The stock free / pro / business rows.
    pub fn with_defaults(self) -> Self {
        self.with_policy(
            Tier::from("free"),
            TierPolicy {
                subdomain_slot_limit: 1,
                file_byte_limit: 50 * MIB,
                css_js_byte_limit: 10 * MIB,
                media_byte_limit: 100 * MIB,
            },
        )
        .with_policy(
            Tier::from("pro"),
            TierPolicy {
                subdomain_slot_limit: 5,
                file_byte_limit: 1 * GIB,
                css_js_byte_limit: 100 * MIB,
                media_byte_limit: 5 * GIB,
            },
        )
        .with_policy(
            Tier::from("business"),
            TierPolicy {
                subdomain_slot_limit: 25,
                file_byte_limit: 10 * GIB,
                css_js_byte_limit: 1 * GIB,
                media_byte_limit: 50 * GIB,
            },
        )
    }
}

impl TierPolicySource for StaticTierPolicies {
    fn policy_for(&self, tier: &Tier) -> HostResult<TierPolicy> {
        self.rows.get(tier).copied().ok_or_else(|| {
            HostError::configuration(format!("no quota policy registered for tier '{}'", tier))
        })
    }
}
