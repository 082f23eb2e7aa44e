use std::sync::Arc;

use bytes::Bytes;
use roost_auth::StaticKeyProvider;
use roost_core::{HostError, TenantCtx};
use roost_publish::{
    AssetCatalog, HostingService, MemoryAssetCatalog, ServiceConfig, SiteFile, UploadRequest,
};
use roost_quota::{MemoryQuotaLedger, QuotaLedger, StaticTierPolicies, Tier, TierPolicy};
use roost_registry::{
    MemoryResolutionCache, MemorySubdomainRegistry, SubdomainName, Visibility,
};
use roost_store::{MemoryFlatStore, MemoryMediaStore, TransformSpec};

/// Test harness wiring the service to in-memory backends.
struct Harness {
    service: HostingService,
    flat: Arc<MemoryFlatStore>,
    media: Arc<MemoryMediaStore>,
    ledger: Arc<MemoryQuotaLedger>,
    catalog: Arc<MemoryAssetCatalog>,
}

fn create_harness() -> Harness {
    let policies = StaticTierPolicies::new().with_policy(
        Tier::from("test"),
        TierPolicy {
            subdomain_slot_limit: 2,
            file_byte_limit: 10_000,
            css_js_byte_limit: 1_000,
            media_byte_limit: 5_000,
        },
    );

    let flat = Arc::new(MemoryFlatStore::new());
    let media = Arc::new(MemoryMediaStore::new());
    let ledger = Arc::new(MemoryQuotaLedger::new(Arc::new(policies)));
    let catalog = Arc::new(MemoryAssetCatalog::new());

    let service = HostingService::new(
        flat.clone(),
        media.clone(),
        Arc::new(MemorySubdomainRegistry::new()),
        Arc::new(MemoryResolutionCache::new()),
        catalog.clone(),
        ledger.clone(),
        Arc::new(StaticKeyProvider::new(b"conformance-secret".to_vec())),
        ServiceConfig::new("roost.site"),
    );

    Harness {
        service,
        flat,
        media,
        ledger,
        catalog,
    }
}

async fn create_tenant(harness: &Harness, id: &str) -> TenantCtx {
    let ctx = TenantCtx::new(id);
    harness
        .service
        .open_account(&ctx, Tier::from("test"))
        .await
        .unwrap();
    ctx
}

fn name(raw: &str) -> SubdomainName {
    SubdomainName::new(raw).unwrap()
}

fn site_file(path: &str, bytes: usize) -> SiteFile {
    SiteFile::new(path, "text/html", vec![b'x'; bytes])
}

fn script_upload(filename: &str, bytes: usize) -> UploadRequest {
    UploadRequest::new()
        .with_filename(filename)
        .with_content_type("text/javascript")
        .with_payload(vec![b'j'; bytes])
}

/// A1. Reserved names rejected; accepted names consume a slot
#[tokio::test]
async fn test_register_reserved_and_accepted_names() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    // Act: reserved name
    let err = harness
        .service
        .publish_site(
            &ctx,
            name("admin"),
            Visibility::Public,
            vec![site_file("index.html", 10)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Validation(_)));

    // Act: ordinary name
    harness
        .service
        .publish_site(
            &ctx,
            name("my-site"),
            Visibility::Public,
            vec![site_file("index.html", 10)],
        )
        .await
        .unwrap();

    // Assert: exactly one slot consumed
    let usage = harness.ledger.usage(&ctx).await.unwrap();
    assert_eq!(usage.subdomain_slots_remaining, 1);
    assert_eq!(usage.file_bytes_used, 10);

    // Read-your-write through the cache-aside path.
    let resolved = harness.service.resolve(&name("my-site")).await.unwrap();
    assert_eq!(resolved.owner, ctx.tenant_id);
}

/// A2. Site deletion reclaims slot and bytes regardless of remote outcome
#[tokio::test]
async fn test_delete_site_reclaims_despite_remote_failure() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    // Arrange: a site holding 4096 bytes
    harness
        .service
        .publish_site(
            &ctx,
            name("doomed"),
            Visibility::Public,
            vec![site_file("index.html", 4000), site_file("app.css", 96)],
        )
        .await
        .unwrap();
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().file_bytes_used,
        4096
    );

    // Act: remote deletes are down
    harness.flat.fail_next_deletes(true);
    let report = harness
        .service
        .delete_site(&ctx, &name("doomed"))
        .await
        .unwrap();

    // Assert: warnings recorded, local state reclaimed anyway
    assert!(report.warnings > 0);
    assert!(!report.clean());
    let usage = harness.ledger.usage(&ctx).await.unwrap();
    assert_eq!(usage.file_bytes_used, 0);
    assert_eq!(usage.subdomain_slots_remaining, 2);

    // The record and cache entry are gone even though objects remain.
    assert!(matches!(
        harness.service.resolve(&name("doomed")).await,
        Err(HostError::NotFound(_))
    ));
    assert!(harness.flat.object_count() > 0);
}

/// A3. Updating an asset moves the ledger by the size delta
#[tokio::test]
async fn test_update_charges_the_delta() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let first = harness
        .service
        .upload(&ctx, script_upload("app.js", 500))
        .await
        .unwrap();

    let second = harness
        .service
        .upload(
            &ctx,
            script_upload("app.js", 700).for_asset(first.asset.asset_id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(second.asset.current_version, first.asset.current_version + 1);
    assert_eq!(second.asset.previous_version, Some(first.asset.current_version));
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().css_js_bytes_used,
        700
    );
}

/// A4. Quota rejection leaves the ledger untouched
#[tokio::test]
async fn test_quota_exceeded_before_any_side_effect() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    harness
        .service
        .upload(&ctx, script_upload("big.js", 900))
        .await
        .unwrap();

    let err = harness
        .service
        .upload(&ctx, script_upload("more.js", 150))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HostError::QuotaExceeded {
            requested: 150,
            remaining: 100,
            ..
        }
    ));
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().css_js_bytes_used,
        900
    );
    // No second object and no second record were created.
    assert_eq!(harness.catalog.record_count(), 1);
}

/// A5. Ledger failure after store reverts the catalog pointer
#[tokio::test]
async fn test_ledger_failure_reverts_version_pointer() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let first = harness
        .service
        .upload(&ctx, script_upload("app.js", 300))
        .await
        .unwrap();

    // Act: the debit for the update fails
    harness.ledger.fail_next_debits(true);
    let err = harness
        .service
        .upload(
            &ctx,
            script_upload("app.js", 400).for_asset(first.asset.asset_id.clone()),
        )
        .await
        .unwrap_err();
    harness.ledger.fail_next_debits(false);

    assert!(matches!(err, HostError::Storage { .. }));

    // Assert: record back at version 1, counter at its pre-attempt value
    let reverted = harness.catalog.fetch(&first.asset.asset_id).await.unwrap();
    assert_eq!(reverted.current_version, first.asset.current_version);
    assert_eq!(reverted.size_bytes, 300);
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().css_js_bytes_used,
        300
    );
}

/// A6. Video ingestion confirms through the provider webhook
#[tokio::test]
async fn test_video_webhook_confirmation() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let report = harness
        .service
        .upload(
            &ctx,
            UploadRequest::new()
                .with_filename("intro.mp4")
                .with_content_type("video/mp4")
                .with_payload(vec![0u8; 256]),
        )
        .await
        .unwrap();

    // Pending until the webhook lands; already charged to the ledger.
    assert!(report.asset.locator.is_pending());
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().media_bytes_used,
        256
    );

    let notification = match &report.asset.locator {
        roost_store::Locator::MediaStore { public_id, .. } => {
            harness.media.confirm_pending(public_id).unwrap()
        }
        other => panic!("unexpected locator {:?}", other),
    };

    let confirmed = harness
        .service
        .confirm_media_upload(&notification)
        .await
        .unwrap();
    assert!(!confirmed.locator.is_pending());
    assert_eq!(
        harness
            .service
            .asset_url(&ctx, &confirmed.asset_id)
            .await
            .unwrap(),
        Some(notification.url)
    );
}

/// A7. Transform URLs require the flag and count their uses
#[tokio::test]
async fn test_transform_url_gating_and_counting() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let report = harness
        .service
        .upload(
            &ctx,
            UploadRequest::new()
                .with_filename("hero.png")
                .with_content_type("image/png")
                .with_payload(vec![0u8; 64]),
        )
        .await
        .unwrap();
    let asset_id = report.asset.asset_id.clone();

    // Transforms start disabled.
    let spec = TransformSpec::new().with_width(320);
    let err = harness
        .service
        .transform_url(&ctx, &asset_id, &spec)
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Validation(_)));

    // Enable via a metadata-only patch, then transform twice.
    harness
        .service
        .upload(
            &ctx,
            UploadRequest::new()
                .for_asset(asset_id.clone())
                .with_transform_enabled(true)
                .with_attributes(serde_json::json!({})),
        )
        .await
        .unwrap();

    let url = harness
        .service
        .transform_url(&ctx, &asset_id, &spec)
        .await
        .unwrap();
    assert!(url.contains("w=320"));
    harness
        .service
        .transform_url(&ctx, &asset_id, &spec)
        .await
        .unwrap();

    let asset = harness.catalog.fetch(&asset_id).await.unwrap();
    assert_eq!(asset.transform_use_count, 2);
}

/// A8. Purge fans out and reports warnings instead of failing
#[tokio::test]
async fn test_purge_collects_per_item_failures() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    harness
        .service
        .upload(&ctx, script_upload("a.js", 100))
        .await
        .unwrap();
    harness
        .service
        .upload(&ctx, script_upload("b.js", 100))
        .await
        .unwrap();
    harness
        .service
        .upload(
            &ctx,
            UploadRequest::new()
                .with_filename("c.png")
                .with_content_type("image/png")
                .with_payload(vec![0u8; 50]),
        )
        .await
        .unwrap();

    // Act: flat-store deletes fail; media deletes still work
    harness.flat.fail_next_deletes(true);
    let report = harness.service.purge_tenant(&ctx).await.unwrap();

    // Assert: every item processed, remote failures surfaced as warnings
    assert_eq!(report.attempted, 3);
    assert_eq!(report.deleted, 3);
    assert_eq!(report.warnings, 2);

    // Local state is fully reclaimed either way.
    assert_eq!(harness.catalog.record_count(), 0);
    let usage = harness.ledger.usage(&ctx).await.unwrap();
    assert_eq!(usage.css_js_bytes_used, 0);
    assert_eq!(usage.media_bytes_used, 0);
}

/// A9. Content replacement checks quota net of current size and rolls back
#[tokio::test]
async fn test_replace_content_quota_and_rollback() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    harness
        .service
        .publish_site(
            &ctx,
            name("shop"),
            Visibility::Public,
            vec![site_file("index.html", 1_000)],
        )
        .await
        .unwrap();

    // 9_500 fits only because it is checked net of the current 1_000.
    let record = harness
        .service
        .replace_site_content(
            &ctx,
            &name("shop"),
            vec![site_file("index.html", 9_000), site_file("app.css", 500)],
        )
        .await
        .unwrap();
    assert_eq!(record.content_bytes, 9_500);
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().file_bytes_used,
        9_500
    );

    // Act: replacement whose upload fails after the old contents are gone
    harness.flat.fail_next_puts(true);
    let err = harness
        .service
        .replace_site_content(&ctx, &name("shop"), vec![site_file("index.html", 200)])
        .await
        .unwrap_err();
    harness.flat.fail_next_puts(false);

    assert!(matches!(err, HostError::Storage { .. }));
    // Assert: counter rolled back to its pre-attempt value
    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().file_bytes_used,
        9_500
    );
}

/// A10. View links are bare for public sites and tokenized for private ones
#[tokio::test]
async fn test_view_links_follow_visibility() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    harness
        .service
        .publish_site(
            &ctx,
            name("portfolio"),
            Visibility::Public,
            vec![site_file("index.html", 10)],
        )
        .await
        .unwrap();

    let public_link = harness.service.view_link(&name("portfolio")).await.unwrap();
    assert_eq!(public_link, "https://portfolio.roost.site/");

    harness
        .service
        .set_site_visibility(&ctx, &name("portfolio"), Visibility::Private)
        .await
        .unwrap();

    let private_link = harness.service.view_link(&name("portfolio")).await.unwrap();
    assert!(private_link.starts_with("https://portfolio.roost.site/?token="));

    let token = private_link.split("token=").nth(1).unwrap();
    assert_eq!(
        harness.service.verify_view_token(token).unwrap(),
        name("portfolio")
    );
}

/// A11. Renames keep serving and swap resolution atomically
#[tokio::test]
async fn test_rename_moves_resolution() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let published = harness
        .service
        .publish_site(
            &ctx,
            name("old-name"),
            Visibility::Public,
            vec![site_file("index.html", 10)],
        )
        .await
        .unwrap();

    let renamed = harness
        .service
        .rename_site(&ctx, &name("old-name"), name("new-name"))
        .await
        .unwrap();

    // Namespace survives the rename: objects never move.
    assert_eq!(renamed.namespace, published.namespace);
    assert!(matches!(
        harness.service.resolve(&name("old-name")).await,
        Err(HostError::NotFound(_))
    ));
    assert_eq!(
        harness
            .service
            .resolve(&name("new-name"))
            .await
            .unwrap()
            .namespace_id,
        published.namespace
    );
}

/// A12. Reconciliation recounts the ledger from authoritative records
#[tokio::test]
async fn test_reconcile_ledger_from_records() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    harness
        .service
        .upload(&ctx, script_upload("app.js", 400))
        .await
        .unwrap();
    harness
        .service
        .publish_site(
            &ctx,
            name("blog"),
            Visibility::Public,
            vec![site_file("index.html", 1_234)],
        )
        .await
        .unwrap();

    // Skew a counter the way a lost compensation would.
    harness
        .ledger
        .debit(&ctx, roost_quota::QuotaBucket::CssJs, 555)
        .await
        .unwrap();

    harness.service.reconcile_ledger(&ctx).await.unwrap();

    let usage = harness.ledger.usage(&ctx).await.unwrap();
    assert_eq!(usage.css_js_bytes_used, 400);
    assert_eq!(usage.file_bytes_used, 1_234);
    assert_eq!(usage.media_bytes_used, 0);
}

/// A13. Concurrent uploads are request-scoped and independent
#[tokio::test]
async fn test_concurrent_uploads_do_not_interfere() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let (a, b) = tokio::join!(
        harness.service.upload(&ctx, script_upload("a.js", 100)),
        harness.service.upload(&ctx, script_upload("b.js", 200)),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        harness.ledger.usage(&ctx).await.unwrap().css_js_bytes_used,
        300
    );
    assert_eq!(harness.catalog.record_count(), 2);
}

/// A14. Payload classification failures surface as unsupported media
#[tokio::test]
async fn test_unsupported_media_rejected_end_to_end() {
    let harness = create_harness();
    let ctx = create_tenant(&harness, "t1").await;

    let err = harness
        .service
        .upload(
            &ctx,
            UploadRequest::new()
                .with_filename("notes.txt")
                .with_content_type("text/plain")
                .with_payload(Bytes::from_static(b"hello")),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::UnsupportedMedia { .. }));
    assert_eq!(err.status_code(), 400);
    assert_eq!(harness.catalog.record_count(), 0);
}
