use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::cache::ReadThroughCache;
use crate::error::CoreError;
use crate::store::AssetRepository;
use crate::types::{Asset, CatalogConfig, ExternalAsset, Provider};

use super::{list_key, read_snapshot, replace_snapshot};

// ==============================================================================
// Index
// ==============================================================================

#[derive(Default)]
struct AssetIndex {
    by_id: HashMap<String, Asset>,
    by_external: HashMap<(Provider, String), Asset>,
    /// Keyed by `(network id, lowercased on-chain id)`.
    by_onchain: HashMap<(String, String), Asset>,
    native: HashMap<String, Asset>,
    by_provider: HashMap<Provider, Vec<Asset>>,
    all: Vec<Asset>,
}

impl AssetIndex {
    fn build(assets: Vec<Asset>) -> Self {
        let mut index = Self::default();
        for asset in assets {
            for external in &asset.external_assets {
                index
                    .by_external
                    .insert((external.provider, external.external_id.clone()), asset.clone());
                index
                    .by_provider
                    .entry(external.provider)
                    .or_default()
                    .push(asset.clone());
            }
            match &asset.onchain_id {
                Some(onchain) => {
                    index.by_onchain.insert(
                        (asset.network_id.clone(), onchain.to_lowercase()),
                        asset.clone(),
                    );
                }
                None => {
                    index.native.insert(asset.network_id.clone(), asset.clone());
                }
            }
            index.by_id.insert(asset.id.clone(), asset.clone());
            index.all.push(asset);
        }
        index
    }
}

// ==============================================================================
// AssetCatalog
// ==============================================================================

pub struct AssetCatalog {
    repo: Arc<dyn AssetRepository>,
    index: RwLock<Arc<AssetIndex>>,
    points: ReadThroughCache<Asset>,
    lists: ReadThroughCache<Vec<Asset>>,
    /// Held across check-then-write so uniqueness checks see every
    /// earlier write.
    writes: tokio::sync::Mutex<()>,
}

impl AssetCatalog {
    pub fn new(repo: Arc<dyn AssetRepository>, config: CatalogConfig) -> Self {
        Self {
            repo,
            index: RwLock::new(Arc::new(AssetIndex::default())),
            points: ReadThroughCache::with_capacity(config.cache_capacity),
            lists: ReadThroughCache::with_capacity(config.cache_capacity),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn build_index(&self) -> Result<usize, CoreError> {
        let assets = self.repo.find_all().await?;
        let count = assets.len();
        replace_snapshot(&self.index, Arc::new(AssetIndex::build(assets)));
        info!(assets = count, "asset index built");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<AssetIndex> {
        read_snapshot(&self.index)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Asset>, CoreError> {
        if let Some(asset) = self.snapshot().by_id.get(id) {
            return Ok(Some(asset.clone()));
        }
        self.points
            .get_or_load(&format!("asset:id:{id}"), || self.repo.find_by_id(id))
            .await
    }

    pub async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Asset>, CoreError> {
        if let Some(asset) = self
            .snapshot()
            .by_external
            .get(&(provider, external_id.to_owned()))
        {
            return Ok(Some(asset.clone()));
        }

        debug!(%provider, external_id, "asset index miss; falling back to store");
        self.points
            .get_or_load(&external_key(provider, external_id), || {
                self.repo.find_by_external_id(provider, external_id)
            })
            .await
    }

    /// Case-insensitive on the on-chain id, since contract addresses are
    /// reported in mixed case by different sources.
    pub async fn find_by_onchain_id(
        &self,
        network_id: &str,
        onchain_id: &str,
    ) -> Result<Option<Asset>, CoreError> {
        let normalized = onchain_id.to_lowercase();
        if let Some(asset) = self
            .snapshot()
            .by_onchain
            .get(&(network_id.to_owned(), normalized.clone()))
        {
            return Ok(Some(asset.clone()));
        }

        self.points
            .get_or_load(&format!("asset:onchain:{network_id}:{normalized}"), || {
                self.repo.find_by_onchain_id(network_id, onchain_id)
            })
            .await
    }

    pub async fn find_native(&self, network_id: &str) -> Result<Option<Asset>, CoreError> {
        if let Some(asset) = self.snapshot().native.get(network_id) {
            return Ok(Some(asset.clone()));
        }
        self.points
            .get_or_load(&format!("asset:native:{network_id}"), || {
                self.repo.find_native(network_id)
            })
            .await
    }

    pub async fn find_all(&self, provider: Option<Provider>) -> Result<Vec<Asset>, CoreError> {
        let index = self.snapshot();
        let indexed = match provider {
            Some(p) => index.by_provider.get(&p).cloned().unwrap_or_default(),
            None => index.all.clone(),
        };
        if !indexed.is_empty() {
            return Ok(indexed);
        }

        let listed = self
            .lists
            .get_or_load(&list_key("asset", provider), || async {
                let all = self.repo.find_all().await?;
                let filtered: Vec<Asset> = match provider {
                    Some(p) => all
                        .into_iter()
                        .filter(|a| a.external_id_for(p).is_some())
                        .collect(),
                    None => all,
                };
                Ok::<_, CoreError>(Some(filtered))
            })
            .await?;
        Ok(listed.unwrap_or_default())
    }

    /// Persist a new asset. Checked against the store, not the index, before
    /// anything is written:
    /// - a network has at most one native asset;
    /// - each provider external id belongs to at most one asset.
    pub async fn create(&self, asset: Asset) -> Result<Asset, CoreError> {
        let _writes = self.writes.lock().await;
        if asset.is_native() {
            if let Some(existing) = self.repo.find_native(&asset.network_id).await? {
                return Err(CoreError::Conflict(format!(
                    "network {} already has native asset {}",
                    asset.network_id, existing.id
                )));
            }
        }
        self.ensure_mappings_unclaimed(&asset.id, &asset.external_assets)
            .await?;

        let created = self.repo.create(asset).await?;
        self.invalidate_lists(&created.external_assets);
        info!(asset.id = %created.id, network.id = %created.network_id, "asset created");
        Ok(created)
    }

    pub async fn add_external_assets(
        &self,
        asset_id: &str,
        mappings: Vec<ExternalAsset>,
    ) -> Result<Asset, CoreError> {
        let _writes = self.writes.lock().await;
        self.ensure_mappings_unclaimed(asset_id, &mappings).await?;

        let updated = self
            .repo
            .add_external_assets(asset_id, mappings.clone())
            .await?;
        self.forget(&updated);
        for mapping in &mappings {
            self.points
                .delete(&external_key(mapping.provider, &mapping.external_id));
        }
        self.invalidate_lists(&mappings);
        self.refresh_indexed(&updated);
        Ok(updated)
    }

    /// Drop every point entry that may hold an older copy of `asset`.
    fn forget(&self, asset: &Asset) {
        self.points.delete(&format!("asset:id:{}", asset.id));
        match &asset.onchain_id {
            Some(onchain) => self.points.delete(&format!(
                "asset:onchain:{}:{}",
                asset.network_id,
                onchain.to_lowercase()
            )),
            None => self
                .points
                .delete(&format!("asset:native:{}", asset.network_id)),
        }
        for mapping in &asset.external_assets {
            self.points
                .delete(&external_key(mapping.provider, &mapping.external_id));
        }
    }

    /// Swap an indexed asset for its updated copy. Assets created after
    /// boot are not indexed and are left to the point cache.
    fn refresh_indexed(&self, asset: &Asset) {
        let index = self.snapshot();
        if !index.by_id.contains_key(&asset.id) {
            return;
        }
        let assets = index
            .all
            .iter()
            .map(|a| if a.id == asset.id { asset.clone() } else { a.clone() })
            .collect();
        replace_snapshot(&self.index, Arc::new(AssetIndex::build(assets)));
    }

    async fn ensure_mappings_unclaimed(
        &self,
        asset_id: &str,
        mappings: &[ExternalAsset],
    ) -> Result<(), CoreError> {
        for mapping in mappings {
            if let Some(owner) = self
                .repo
                .find_by_external_id(mapping.provider, &mapping.external_id)
                .await?
            {
                if owner.id != asset_id {
                    return Err(CoreError::Conflict(format!(
                        "{} asset id {} already maps to {}",
                        mapping.provider, mapping.external_id, owner.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn invalidate_lists(&self, mappings: &[ExternalAsset]) {
        self.lists.delete(&list_key("asset", None));
        for mapping in mappings {
            self.lists.delete(&list_key("asset", Some(mapping.provider)));
        }
    }
}

fn external_key(provider: Provider, external_id: &str) -> String {
    format!("asset:ext:{provider}:{external_id}")
}
