//! The assembled hosting subsystem.

use std::sync::Arc;

use roost_auth::{SigningKeyProvider, TokenConfig, ViewToken, ViewTokenIssuer};
use roost_core::{AssetId, HostError, HostResult, TenantCtx};
use roost_quota::{QuotaBucket, QuotaLedger, Tier};
use roost_registry::{
    RegistryConfig, ResolutionCache, ResolvedSite, Resolver, SubdomainName, SubdomainRecord,
    SubdomainRegistry, Visibility,
};
use roost_store::{
    DefaultVersionKeys, FlatStore, Locator, MediaNotification, MediaStore, ObjectStoreRouter,
    TransformSpec,
};

use crate::catalog::{AssetCatalog, CdnAsset};
use crate::deletion::{AssetReclaimer, DeletionReport, PurgeReport};
use crate::sites::{SiteFile, SitePublisher};
use crate::workflow::{UploadReport, UploadRequest, UploadWorkflow, WorkflowConfig};

/// Configuration for the assembled service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub registry: RegistryConfig,
    pub token: TokenConfig,
    pub workflow: WorkflowConfig,
}

impl ServiceConfig {
    pub fn new(platform_domain: impl Into<String>) -> Self {
        Self {
            registry: RegistryConfig::default(),
            token: TokenConfig::new(platform_domain),
            workflow: WorkflowConfig::default(),
        }
    }

    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_token(mut self, token: TokenConfig) -> Self {
        self.token = token;
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = workflow;
        self
    }
}

/// Everything the hosting subsystem does, behind injected dependencies.
///
/// Embed it in a server or construct it in tests with in-memory backends;
/// there are no ambient globals anywhere below this type.
pub struct HostingService {
    catalog: Arc<dyn AssetCatalog>,
    ledger: Arc<dyn QuotaLedger>,
    resolver: Arc<Resolver>,
    router: Arc<ObjectStoreRouter>,
    issuer: ViewTokenIssuer,
    workflow: UploadWorkflow,
    publisher: SitePublisher,
    reclaimer: AssetReclaimer,
    platform_domain: String,
}

impl HostingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flat: Arc<dyn FlatStore>,
        media: Arc<dyn MediaStore>,
        registry: Arc<dyn SubdomainRegistry>,
        cache: Arc<dyn ResolutionCache>,
        catalog: Arc<dyn AssetCatalog>,
        ledger: Arc<dyn QuotaLedger>,
        signing_keys: Arc<dyn SigningKeyProvider>,
        config: ServiceConfig,
    ) -> Self {
        let keys = Arc::new(DefaultVersionKeys);
        let router = Arc::new(ObjectStoreRouter::new(flat.clone(), media));
        let resolver = Arc::new(Resolver::new(registry, cache, config.registry));
        let platform_domain = config.token.platform_domain.clone();

        Self {
            workflow: UploadWorkflow::new(
                router.clone(),
                catalog.clone(),
                ledger.clone(),
                config.workflow,
            ),
            publisher: SitePublisher::new(flat, keys, resolver.clone(), ledger.clone()),
            reclaimer: AssetReclaimer::new(router.clone(), catalog.clone(), ledger.clone()),
            issuer: ViewTokenIssuer::new(signing_keys, config.token),
            catalog,
            ledger,
            resolver,
            router,
            platform_domain,
        }
    }

    // ---- Accounts ----

    /// Seed a tenant's quota counters from its tier.
    pub async fn open_account(&self, ctx: &TenantCtx, tier: Tier) -> HostResult<()> {
        self.ledger.open_account(ctx, tier).await?;
        Ok(())
    }

    // ---- Assets ----

    /// Upload a new asset or a new version of an existing one.
    pub async fn upload(&self, ctx: &TenantCtx, request: UploadRequest) -> HostResult<UploadReport> {
        self.workflow.run(ctx, request).await
    }

    /// Delete one asset, reclaiming its quota.
    pub async fn delete_asset(
        &self,
        ctx: &TenantCtx,
        asset_id: &AssetId,
    ) -> HostResult<DeletionReport> {
        self.reclaimer.delete_asset(ctx, asset_id).await
    }

    /// Delete every asset a tenant owns.
    pub async fn purge_tenant(&self, ctx: &TenantCtx) -> HostResult<PurgeReport> {
        self.reclaimer.purge_tenant(ctx).await
    }

    /// Public URL an asset is served from, if servable yet.
    pub async fn asset_url(&self, ctx: &TenantCtx, asset_id: &AssetId) -> HostResult<Option<String>> {
        let asset = self.owned_asset(ctx, asset_id).await?;
        Ok(self.router.public_url(&asset.locator))
    }

    /// Transformation URL for a media asset, counting the use.
    pub async fn transform_url(
        &self,
        ctx: &TenantCtx,
        asset_id: &AssetId,
        spec: &TransformSpec,
    ) -> HostResult<String> {
        let mut asset = self.owned_asset(ctx, asset_id).await?;
        if !asset.transform_enabled {
            return Err(HostError::validation(format!(
                "transformations are not enabled for asset '{}'",
                asset_id
            )));
        }

        let url = self
            .router
            .transform_url(&asset.locator, spec)
            .ok_or_else(|| {
                HostError::validation("transformations apply to media assets only")
            })?;

        asset.transform_use_count += 1;
        self.catalog.update(asset).await?;
        Ok(url)
    }

    /// Apply a provider webhook confirming an asynchronous media upload.
    pub async fn confirm_media_upload(
        &self,
        notification: &MediaNotification,
    ) -> HostResult<CdnAsset> {
        if !notification.is_upload_confirmation() {
            return Err(HostError::validation(format!(
                "unexpected notification type '{}'",
                notification.notification_type
            )));
        }

        let mut asset = self
            .catalog
            .find_by_public_id(&notification.public_id)
            .await?
            .ok_or_else(|| {
                HostError::not_found(format!(
                    "no asset with media id '{}'",
                    notification.public_id
                ))
            })?;

        match &mut asset.locator {
            Locator::MediaStore { url, .. } => {
                *url = Some(notification.url.clone());
            }
            Locator::FlatStore { .. } => {
                return Err(HostError::validation(
                    "notification targets a flat-store asset",
                ));
            }
        }

        self.catalog.update(asset.clone()).await?;
        tracing::info!(
            public_id = %notification.public_id,
            "media ingestion confirmed"
        );
        Ok(asset)
    }

    // ---- Sites ----

    /// Publish a new site under a subdomain.
    pub async fn publish_site(
        &self,
        ctx: &TenantCtx,
        name: SubdomainName,
        visibility: Visibility,
        files: Vec<SiteFile>,
    ) -> HostResult<SubdomainRecord> {
        self.publisher.publish(ctx, name, visibility, files).await
    }

    /// Replace a site's entire contents.
    pub async fn replace_site_content(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
        files: Vec<SiteFile>,
    ) -> HostResult<SubdomainRecord> {
        self.publisher.replace_content(ctx, name, files).await
    }

    /// Rename a site.
    pub async fn rename_site(
        &self,
        ctx: &TenantCtx,
        old: &SubdomainName,
        new: SubdomainName,
    ) -> HostResult<SubdomainRecord> {
        self.publisher.rename(ctx, old, new).await
    }

    /// Change a site's visibility.
    pub async fn set_site_visibility(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
        visibility: Visibility,
    ) -> HostResult<SubdomainRecord> {
        self.publisher.set_visibility(ctx, name, visibility).await
    }

    /// Delete a site and reclaim its slot and bytes.
    pub async fn delete_site(
        &self,
        ctx: &TenantCtx,
        name: &SubdomainName,
    ) -> HostResult<DeletionReport> {
        self.publisher.delete_site(ctx, name).await
    }

    /// Resolve a subdomain on the anonymous hot path.
    pub async fn resolve(&self, name: &SubdomainName) -> HostResult<ResolvedSite> {
        self.resolver.resolve(name).await
    }

    // ---- View access ----

    /// Issue a view token for a site.
    pub fn issue_view_token(&self, name: &SubdomainName) -> HostResult<ViewToken> {
        self.issuer.issue(name)
    }

    /// Verify a view token, returning the site it grants access to.
    pub fn verify_view_token(&self, token: &str) -> HostResult<SubdomainName> {
        self.issuer.verify(token)
    }

    /// The URL a site is viewed at: bare for public sites, tokenized for
    /// private ones.
    pub async fn view_link(&self, name: &SubdomainName) -> HostResult<String> {
        let resolved = self.resolver.resolve(name).await?;
        match resolved.visibility {
            Visibility::Public => Ok(format!("https://{}.{}/", name, self.platform_domain)),
            Visibility::Private => {
                let token = self.issuer.issue(name)?;
                Ok(self.issuer.view_url(name, &token))
            }
        }
    }

    // ---- Reconciliation ----

    /// Recount a tenant's bytes from the authoritative records and overwrite
    /// the ledger counters. The corrective lever for the documented
    /// check-then-debit race and for orphaned compensation leftovers.
    pub async fn reconcile_ledger(&self, ctx: &TenantCtx) -> HostResult<()> {
        let assets = self.catalog.list_owned(&ctx.tenant_id).await?;
        let mut css_js = 0u64;
        let mut media = 0u64;
        for asset in &assets {
            match QuotaBucket::for_kind(asset.kind) {
                QuotaBucket::CssJs => css_js += asset.size_bytes,
                QuotaBucket::Media => media += asset.size_bytes,
                QuotaBucket::SiteFiles => {}
            }
        }

        let sites = self.resolver.registry().list_owned(&ctx.tenant_id).await?;
        let site_files: u64 = sites.iter().map(|s| s.content_bytes).sum();

        self.ledger
            .recompute(
                ctx,
                &[
                    (QuotaBucket::CssJs, css_js),
                    (QuotaBucket::Media, media),
                    (QuotaBucket::SiteFiles, site_files),
                ],
            )
            .await?;
        Ok(())
    }

    async fn owned_asset(&self, ctx: &TenantCtx, asset_id: &AssetId) -> HostResult<CdnAsset> {
        let asset = self.catalog.fetch(asset_id).await?;
        if asset.owner != ctx.tenant_id {
            return Err(HostError::authorization(format!(
                "tenant '{}' does not own asset '{}'",
                ctx.tenant_id, asset_id
            )));
        }
        Ok(asset)
    }
}
