use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::cache::ReadThroughCache;
use crate::error::CoreError;
use crate::store::NetworkRepository;
use crate::types::{CatalogConfig, ExternalNetwork, Network, Provider};

use super::{list_key, read_snapshot, replace_snapshot};

// ==============================================================================
// Index
// ==============================================================================

#[derive(Default)]
struct NetworkIndex {
    by_id: HashMap<String, Network>,
    by_external: HashMap<(Provider, String), Network>,
    by_provider: HashMap<Provider, Vec<Network>>,
    all: Vec<Network>,
}

impl NetworkIndex {
    fn build(networks: Vec<Network>) -> Self {
        let mut index = Self::default();
        for network in networks {
            for external in &network.external_networks {
                index
                    .by_external
                    .insert((external.provider, external.external_id.clone()), network.clone());
                index
                    .by_provider
                    .entry(external.provider)
                    .or_default()
                    .push(network.clone());
            }
            index.by_id.insert(network.id.clone(), network.clone());
            index.all.push(network);
        }
        index
    }
}

// ==============================================================================
// NetworkCatalog
// ==============================================================================

pub struct NetworkCatalog {
    repo: Arc<dyn NetworkRepository>,
    index: RwLock<Arc<NetworkIndex>>,
    points: ReadThroughCache<Network>,
    lists: ReadThroughCache<Vec<Network>>,
    writes: tokio::sync::Mutex<()>,
}

impl NetworkCatalog {
    pub fn new(repo: Arc<dyn NetworkRepository>, config: CatalogConfig) -> Self {
        Self {
            repo,
            index: RwLock::new(Arc::new(NetworkIndex::default())),
            points: ReadThroughCache::with_capacity(config.cache_capacity),
            lists: ReadThroughCache::with_capacity(config.cache_capacity),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Load every network and replace the index wholesale.
    pub async fn build_index(&self) -> Result<usize, CoreError> {
        let networks = self.repo.find_all().await?;
        let count = networks.len();
        replace_snapshot(&self.index, Arc::new(NetworkIndex::build(networks)));
        info!(networks = count, "network index built");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<NetworkIndex> {
        read_snapshot(&self.index)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Network>, CoreError> {
        if let Some(network) = self.snapshot().by_id.get(id) {
            return Ok(Some(network.clone()));
        }

        self.points
            .get_or_load(&id_key(id), || self.repo.find_by_id(id))
            .await
    }

    pub async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Network>, CoreError> {
        if let Some(network) = self
            .snapshot()
            .by_external
            .get(&(provider, external_id.to_owned()))
        {
            return Ok(Some(network.clone()));
        }

        debug!(%provider, external_id, "network index miss; falling back to store");
        self.points
            .get_or_load(&external_key(provider, external_id), || {
                self.repo.find_by_external_id(provider, external_id)
            })
            .await
    }

    /// All networks, or those a provider has a mapping for.
    pub async fn find_all(&self, provider: Option<Provider>) -> Result<Vec<Network>, CoreError> {
        let index = self.snapshot();
        let indexed = match provider {
            Some(p) => index.by_provider.get(&p).cloned().unwrap_or_default(),
            None => index.all.clone(),
        };
        if !indexed.is_empty() {
            return Ok(indexed);
        }

        let key = list_key("network", provider);
        let listed = self
            .lists
            .get_or_load(&key, || async {
                let all = self.repo.find_all().await?;
                let filtered: Vec<Network> = match provider {
                    Some(p) => all
                        .into_iter()
                        .filter(|n| n.external_id_for(p).is_some())
                        .collect(),
                    None => all,
                };
                Ok::<_, CoreError>(Some(filtered))
            })
            .await?;
        Ok(listed.unwrap_or_default())
    }

    pub async fn create(&self, network: Network) -> Result<Network, CoreError> {
        let _writes = self.writes.lock().await;
        self.ensure_mappings_unclaimed(&network.id, &network.external_networks)
            .await?;

        let created = self.repo.create(network).await?;
        self.invalidate_lists(&created.external_networks);
        info!(network.id = %created.id, "network created");
        Ok(created)
    }

    pub async fn add_external_networks(
        &self,
        network_id: &str,
        mappings: Vec<ExternalNetwork>,
    ) -> Result<Network, CoreError> {
        let _writes = self.writes.lock().await;
        self.ensure_mappings_unclaimed(network_id, &mappings).await?;

        let updated = self
            .repo
            .add_external_networks(network_id, mappings.clone())
            .await?;
        self.points.delete(&id_key(network_id));
        for mapping in &mappings {
            self.points
                .delete(&external_key(mapping.provider, &mapping.external_id));
        }
        self.invalidate_lists(&mappings);
        self.refresh_indexed(&updated);
        Ok(updated)
    }

    fn refresh_indexed(&self, network: &Network) {
        let index = self.snapshot();
        if !index.by_id.contains_key(&network.id) {
            return;
        }
        let networks = index
            .all
            .iter()
            .map(|n| if n.id == network.id { network.clone() } else { n.clone() })
            .collect();
        replace_snapshot(&self.index, Arc::new(NetworkIndex::build(networks)));
    }

    /// At most one canonical network may own a `(provider, external id)`.
    async fn ensure_mappings_unclaimed(
        &self,
        network_id: &str,
        mappings: &[ExternalNetwork],
    ) -> Result<(), CoreError> {
        for mapping in mappings {
            if let Some(owner) = self
                .repo
                .find_by_external_id(mapping.provider, &mapping.external_id)
                .await?
            {
                if owner.id != network_id {
                    return Err(CoreError::Conflict(format!(
                        "{} network id {} already maps to {}",
                        mapping.provider, mapping.external_id, owner.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn invalidate_lists(&self, mappings: &[ExternalNetwork]) {
        self.lists.delete(&list_key("network", None));
        for mapping in mappings {
            self.lists.delete(&list_key("network", Some(mapping.provider)));
        }
    }
}

fn id_key(id: &str) -> String {
    format!("network:id:{id}")
}

fn external_key(provider: Provider, external_id: &str) -> String {
    format!("network:ext:{provider}:{external_id}")
}
