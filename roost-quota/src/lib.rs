//! Tier policies and the per-tenant quota ledger.
//!
//! The ledger holds the running counters quota enforcement reads: remaining
//! subdomain slots and bytes used per bucket. Counters are mutated only in
//! lockstep with the remote store operation they represent; the workflow
//! layer owns that pairing and its compensation.

pub mod bucket;
pub mod ledger;
pub mod policy;

pub use bucket::QuotaBucket;
pub use ledger::{MemoryQuotaLedger, QuotaLedger, TenantUsage};
pub use policy::{StaticTierPolicies, Tier, TierPolicy, TierPolicySource};
