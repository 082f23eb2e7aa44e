//! Subdomain registration and resolution.
//!
//! The registry is the authoritative mapping `subdomain → {owner, namespace,
//! visibility}`; the resolution cache is a TTL-bound cache-aside layer in
//! front of it, read on every public request. Writes invalidate, never
//! update in place. The cache is never the source of truth: mutations
//! authorize against the persistent record, and the registry's uniqueness
//! constraint remains the final arbiter for name collisions even when a
//! cold cache lets a pre-check slip through.

pub mod cache;
pub mod config;
pub mod record;
pub mod registry;
pub mod resolver;

pub use cache::{MemoryResolutionCache, ResolutionCache};
pub use config::RegistryConfig;
pub use record::{SubdomainName, SubdomainRecord, Visibility};
pub use registry::{MemorySubdomainRegistry, SubdomainRegistry};
pub use resolver::{ResolvedSite, Resolver};

#[cfg(feature = "redis")]
pub use cache::RedisResolutionCache;
