//! Cache-aside resolution over the subdomain registry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use roost_core::{HostError, HostResult, NamespaceId, TenantCtx, TenantId};

use crate::cache::ResolutionCache;
use crate::config::RegistryConfig;
use crate::record::{SubdomainName, SubdomainRecord, Visibility};
use crate::registry::SubdomainRegistry;

/// The tuple resolution serves on the hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSite {
    pub owner: TenantId,
    pub namespace_id: NamespaceId,
    pub visibility: Visibility,
}

impl From<&SubdomainRecord> for ResolvedSite {
    fn from(record: &SubdomainRecord) -> Self {
        Self {
            owner: record.owner.clone(),
            namespace_id: record.namespace.clone(),
            visibility: record.visibility,
        }
    }
}

/// Resolves subdomains through the cache, falling back to the registry.
///
/// Reads may serve a stale tuple for up to one TTL; that is acceptable for
/// anonymous resolution only. Every mutation here authorizes against the
/// persistent record and invalidates (deletes, never updates in place) the
/// affected cache key before the write is considered complete.
pub struct Resolver {
    registry: Arc<dyn SubdomainRegistry>,
    cache: Arc<dyn ResolutionCache>,
    config: RegistryConfig,
}

impl Resolver {
    pub fn new(
        registry: Arc<dyn SubdomainRegistry>,
        cache: Arc<dyn ResolutionCache>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    fn cache_key(&self, name: &SubdomainName) -> String {
        format!("{}:{}", self.config.cache_key_prefix, name)
    }

    /// Resolve a subdomain to its serving tuple. Cache first, registry on a
    /// miss, populate with TTL on the way out. Negative results are not
    /// cached. Cache failures degrade to misses; the registry is the source
    /// of truth.
    pub async fn resolve(&self, name: &SubdomainName) -> HostResult<ResolvedSite> {
        let key = self.cache_key(name);

        match self.cache.get(&key).await {
            Ok(Some(blob)) => match serde_json::from_str::<ResolvedSite>(&blob) {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                    let _ = self.cache.invalidate(&key).await;
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, falling through");
            }
        }

        let record = self.registry.fetch(name).await?;
        let resolved = ResolvedSite::from(&record);
        self.populate(&key, &resolved).await;
        Ok(resolved)
    }

    /// Register a subdomain for a tenant.
    ///
    /// The availability pre-check runs through the same cache-aside path as
    /// `resolve`, so a cold cache can momentarily miss a collision; the
    /// registry's unique constraint still rejects it.
    pub async fn register(
        &self,
        ctx: &TenantCtx,
        name: SubdomainName,
        namespace: NamespaceId,
        visibility: Visibility,
        content_bytes: u64,
    ) -> HostResult<SubdomainRecord> {
        self.reject_reserved(&name)?;

        match self.resolve(&name).await {
            Ok(_) => {
                return Err(HostError::validation(format!(
                    "subdomain '{}' is already taken",
                    name
                )))
            }
            Err(HostError::NotFound(_)) => {}
            Err(other) => return Err(other),
        }

        let record = SubdomainRecord::new(
            name.clone(),
            ctx.tenant_id.clone(),
            namespace,
            visibility,
            content_bytes,
        );
        self.registry.insert(record.clone()).await?;

        tracing::info!(tenant = %ctx.tenant_id, name = %name, "subdomain registered");
        self.populate(&self.cache_key(&name), &ResolvedSite::from(&record))
            .await;
        Ok(record)
    }

    /// Rename a subdomain. Swaps the cache keys: the old entry is
    /// invalidated, the new one populated.
    pub async fn rename(
        &self,
        ctx: &TenantCtx,
        old: &SubdomainName,
        new: SubdomainName,
    ) -> HostResult<SubdomainRecord> {
        self.authorized(ctx, old).await?;
        self.reject_reserved(&new)?;

        match self.resolve(&new).await {
            Ok(_) => {
                return Err(HostError::validation(format!(
                    "subdomain '{}' is already taken",
                    new
                )))
            }
            Err(HostError::NotFound(_)) => {}
            Err(other) => return Err(other),
        }

        let record = self.registry.rename(old, new).await?;

        self.drop_key(&self.cache_key(old)).await;
        self.populate(&self.cache_key(&record.name), &ResolvedSite::from(&record))
            .await;
        Ok(record)
    }

    /// Change a subdomain's visibility and refresh its cache entry.
    pub async fn set_visibility(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
        visibility: Visibility,
    ) -> HostResult<SubdomainRecord> {
        self.authorized(ctx, name).await?;

        let record = self.registry.set_visibility(name, visibility).await?;

        let key = self.cache_key(name);
        self.drop_key(&key).await;
        self.populate(&key, &ResolvedSite::from(&record)).await;
        Ok(record)
    }

    /// Remove a subdomain record and its cache entry, returning the record
    /// so the caller can reclaim quota.
    pub async fn deregister(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
    ) -> HostResult<SubdomainRecord> {
        self.authorized(ctx, name).await?;

        let record = self.registry.remove(name).await?;
        self.drop_key(&self.cache_key(name)).await;
        Ok(record)
    }

    /// Fetch the persistent record and check the caller owns it. Never
    /// consults the cache: a stale cached owner must not authorize a
    /// mutation.
    pub async fn authorized(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
    ) -> HostResult<SubdomainRecord> {
        let record = self.registry.fetch(name).await?;
        if record.owner != ctx.tenant_id {
            return Err(HostError::authorization(format!(
                "tenant '{}' does not own subdomain '{}'",
                ctx.tenant_id, name
            )));
        }
        Ok(record)
    }

    /// Direct registry access for orchestration that bypasses the cache
    /// tuple (content-size updates do not touch owner/namespace/visibility).
    pub fn registry(&self) -> &Arc<dyn SubdomainRegistry> {
        &self.registry
    }

    fn reject_reserved(&self, name: &SubdomainName) -> HostResult<()> {
        if self.config.is_reserved(name.as_str()) {
            return Err(HostError::validation(format!(
                "subdomain '{}' is reserved",
                name
            )));
        }
        Ok(())
    }

    async fn populate(&self, key: &str, resolved: &ResolvedSite) {
        let blob = match serde_json::to_string(resolved) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.put(key, &blob, self.config.cache_ttl).await {
            tracing::warn!(key = %key, error = %e, "cache population failed, skipping");
        }
    }

    async fn drop_key(&self, key: &str) {
        if let Err(e) = self.cache.invalidate(key).await {
            tracing::warn!(key = %key, error = %e, "cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryResolutionCache;
    use crate::registry::MemorySubdomainRegistry;

    fn create_resolver() -> (Resolver, Arc<MemoryResolutionCache>) {
        let cache = Arc::new(MemoryResolutionCache::new());
        let resolver = Resolver::new(
            Arc::new(MemorySubdomainRegistry::new()),
            cache.clone(),
            RegistryConfig::default(),
        );
        (resolver, cache)
    }

    fn name(raw: &str) -> SubdomainName {
        SubdomainName::new(raw).unwrap()
    }

    #[tokio::test]
    async fn read_your_write_after_register() {
        let (resolver, _) = create_resolver();
        let ctx = TenantCtx::new("t1");

        resolver
            .register(&ctx, name("my-site"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        let resolved = resolver.resolve(&name("my-site")).await.unwrap();
        assert_eq!(resolved.owner, TenantId::from("t1"));
        assert_eq!(resolved.visibility, Visibility::Public);
    }

    #[tokio::test]
    async fn reserved_names_are_rejected() {
        let (resolver, _) = create_resolver();
        let ctx = TenantCtx::new("t1");

        let err = resolver
            .register(&ctx, name("admin"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Validation(_)));
    }

    #[tokio::test]
    async fn resolving_twice_returns_identical_tuples() {
        let (resolver, _) = create_resolver();
        let ctx = TenantCtx::new("t1");
        resolver
            .register(&ctx, name("stable"), NamespaceId::new(), Visibility::Private, 0)
            .await
            .unwrap();

        let first = resolver.resolve(&name("stable")).await.unwrap();
        let second = resolver.resolve(&name("stable")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn miss_populates_the_cache() {
        let (resolver, cache) = create_resolver();
        let ctx = TenantCtx::new("t1");
        resolver
            .register(&ctx, name("warm"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        cache.invalidate("subdomain:warm").await.unwrap();
        assert_eq!(cache.entry_count(), 0);

        resolver.resolve(&name("warm")).await.unwrap();
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn unknown_name_is_not_cached() {
        let (resolver, cache) = create_resolver();

        let err = resolver.resolve(&name("ghost")).await.unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn rename_swaps_cache_keys() {
        let (resolver, cache) = create_resolver();
        let ctx = TenantCtx::new("t1");
        resolver
            .register(&ctx, name("before"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        resolver
            .rename(&ctx, &name("before"), name("after"))
            .await
            .unwrap();

        assert!(cache.get("subdomain:before").await.unwrap().is_none());
        assert!(cache.get("subdomain:after").await.unwrap().is_some());
        assert!(matches!(
            resolver.resolve(&name("before")).await,
            Err(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mutations_authorize_against_the_record_not_the_cache() {
        let (resolver, cache) = create_resolver();
        let owner = TenantCtx::new("t1");
        let intruder = TenantCtx::new("t2");

        resolver
            .register(&owner, name("target"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        // Poison the cache with a tuple claiming the intruder owns the site.
        // The persistent record must still win.
        let poisoned = serde_json::to_string(&ResolvedSite {
            owner: TenantId::from("t2"),
            namespace_id: NamespaceId::from("ns_fake"),
            visibility: Visibility::Public,
        })
        .unwrap();
        cache
            .put("subdomain:target", &poisoned, std::time::Duration::from_secs(60))
            .await
            .unwrap();

        let err = resolver
            .set_visibility(&intruder, &name("target"), Visibility::Private)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Authorization(_)));
    }

    #[tokio::test]
    async fn visibility_change_refreshes_the_entry() {
        let (resolver, cache) = create_resolver();
        let ctx = TenantCtx::new("t1");
        resolver
            .register(&ctx, name("flip"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        resolver
            .set_visibility(&ctx, &name("flip"), Visibility::Private)
            .await
            .unwrap();

        let blob = cache.get("subdomain:flip").await.unwrap().unwrap();
        let resolved: ResolvedSite = serde_json::from_str(&blob).unwrap();
        assert_eq!(resolved.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn collision_is_caught_by_the_registry_on_a_cold_cache() {
        let (resolver, cache) = create_resolver();
        let first = TenantCtx::new("t1");
        let second = TenantCtx::new("t2");

        resolver
            .register(&first, name("contested"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap();

        // Cold cache: the pre-check reads the registry and still collides,
        // but even a poisoned-empty cache cannot help the second register
        // because the unique constraint is checked on insert.
        cache.invalidate("subdomain:contested").await.unwrap();

        let err = resolver
            .register(&second, name("contested"), NamespaceId::new(), Visibility::Public, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Validation(_)));
    }
}
