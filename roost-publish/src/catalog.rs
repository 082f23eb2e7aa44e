use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use roost_core::{AssetId, AssetKind, BackendKind, HostError, HostResult, NamespaceId, TenantId};
use roost_store::Locator;

/// Metadata record for one logical CDN asset.
///
/// `asset_id` is stable across versions. `current_version` strictly
/// increases by one per successful update and `previous_version` always
/// holds the prior `current_version`; the backend (via `kind`) never changes
/// over an asset's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnAsset {
    pub asset_id: AssetId,
    pub owner: TenantId,
    pub namespace: NamespaceId,
    pub filename: String,
    pub kind: AssetKind,
    pub current_version: u64,
    pub previous_version: Option<u64>,
    pub size_bytes: u64,
    pub locator: Locator,
    pub transform_enabled: bool,
    pub transform_use_count: u64,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CdnAsset {
    /// The backend serving this asset, determined by its kind.
    pub fn backend(&self) -> BackendKind {
        self.kind.backend()
    }
}

/// Persistent store of asset records.
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Insert a new record.
    async fn insert(&self, asset: CdnAsset) -> HostResult<()>;

    /// Fetch a record by asset id.
    async fn fetch(&self, asset_id: &AssetId) -> HostResult<CdnAsset>;

    /// Overwrite an existing record. Compensation paths use this to revert
    /// a record to its prior version pointer.
    async fn update(&self, asset: CdnAsset) -> HostResult<()>;

    /// Remove a record, returning it.
    async fn remove(&self, asset_id: &AssetId) -> HostResult<CdnAsset>;

    /// Every record owned by a tenant.
    async fn list_owned(&self, owner: &TenantId) -> HostResult<Vec<CdnAsset>>;

    /// Look up the record holding a media public id, if any. Used by the
    /// provider webhook, which carries no tenant context.
    async fn find_by_public_id(&self, public_id: &str) -> HostResult<Option<CdnAsset>>;
}

/// In-memory catalog for tests and development.
pub struct MemoryAssetCatalog {
    assets: RwLock<HashMap<AssetId, CdnAsset>>,
    fail_writes: RwLock<bool>,
}

impl MemoryAssetCatalog {
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            fail_writes: RwLock::new(false),
        }
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.assets.read().len()
    }

    /// Test helper: make every subsequent insert/update fail with a storage
    /// error.
    pub fn fail_next_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    fn check_writable(&self) -> HostResult<()> {
        if *self.fail_writes.read() {
            return Err(HostError::storage("simulated catalog write failure"));
        }
        Ok(())
    }
}

impl Default for MemoryAssetCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(asset_id: &AssetId) -> HostError {
    HostError::not_found(format!("asset '{}'", asset_id))
}

#[async_trait]
impl AssetCatalog for MemoryAssetCatalog {
    async fn insert(&self, asset: CdnAsset) -> HostResult<()> {
        self.check_writable()?;
        let mut assets = self.assets.write();
        if assets.contains_key(&asset.asset_id) {
            return Err(HostError::validation(format!(
                "asset '{}' already exists",
                asset.asset_id
            )));
        }
        assets.insert(asset.asset_id.clone(), asset);
        Ok(())
    }

    async fn fetch(&self, asset_id: &AssetId) -> HostResult<CdnAsset> {
        self.assets
            .read()
            .get(asset_id)
            .cloned()
            .ok_or_else(|| not_found(asset_id))
    }

    async fn update(&self, asset: CdnAsset) -> HostResult<()> {
        self.check_writable()?;
        let mut assets = self.assets.write();
        if !assets.contains_key(&asset.asset_id) {
            return Err(not_found(&asset.asset_id));
        }
        assets.insert(asset.asset_id.clone(), asset);
        Ok(())
    }

    async fn remove(&self, asset_id: &AssetId) -> HostResult<CdnAsset> {
        self.assets
            .write()
            .remove(asset_id)
            .ok_or_else(|| not_found(asset_id))
    }

    async fn list_owned(&self, owner: &TenantId) -> HostResult<Vec<CdnAsset>> {
        let assets = self.assets.read();
        let mut owned: Vec<CdnAsset> = assets
            .values()
            .filter(|a| &a.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.asset_id.as_str().cmp(b.asset_id.as_str()));
        Ok(owned)
    }

    async fn find_by_public_id(&self, public_id: &str) -> HostResult<Option<CdnAsset>> {
        let assets = self.assets.read();
        Ok(assets
            .values()
            .find(|a| matches!(&a.locator, Locator::MediaStore { public_id: id, .. } if id == public_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_asset(owner: &str) -> CdnAsset {
        let now = Utc::now();
        CdnAsset {
            asset_id: AssetId::new(),
            owner: TenantId::from(owner),
            namespace: NamespaceId::new(),
            filename: "app.js".to_string(),
            kind: AssetKind::Script,
            current_version: 1,
            previous_version: None,
            size_bytes: 512,
            locator: Locator::FlatStore {
                key: "t1/ns/v1".to_string(),
            },
            transform_enabled: false,
            transform_use_count: 0,
            attributes: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_fetch_remove_roundtrip() {
        let catalog = MemoryAssetCatalog::new();
        let asset = create_asset("t1");
        let id = asset.asset_id.clone();

        catalog.insert(asset.clone()).await.unwrap();
        assert_eq!(catalog.fetch(&id).await.unwrap(), asset);

        let removed = catalog.remove(&id).await.unwrap();
        assert_eq!(removed.asset_id, id);
        assert!(matches!(
            catalog.fetch(&id).await,
            Err(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let catalog = MemoryAssetCatalog::new();
        let asset = create_asset("t1");

        catalog.insert(asset.clone()).await.unwrap();
        assert!(catalog.insert(asset).await.is_err());
    }

    #[tokio::test]
    async fn find_by_public_id_matches_media_locators() {
        let catalog = MemoryAssetCatalog::new();
        let mut asset = create_asset("t1");
        asset.kind = AssetKind::Video;
        asset.locator = Locator::MediaStore {
            public_id: "t1/ns/v1".to_string(),
            resource_type: roost_store::MediaResourceType::Video,
            url: None,
        };
        catalog.insert(asset.clone()).await.unwrap();

        let found = catalog.find_by_public_id("t1/ns/v1").await.unwrap();
        assert_eq!(found.unwrap().asset_id, asset.asset_id);
        assert!(catalog.find_by_public_id("nope").await.unwrap().is_none());
    }
}
