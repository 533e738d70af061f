use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::NetworkCatalog;
use crate::connection::ValidConnection;
use crate::error::CoreError;
use crate::resolver::{AssetFallback, ResolvedAsset};
use crate::types::{Network, Provider};

use super::types::AnchorageAssetType;
use super::AnchorageClient;

/// Resolves assets the catalog does not list by asking Anchorage's
/// `/v2/asset-types` through one connection.
pub struct AnchorageAssetFallback {
    client: Arc<dyn AnchorageClient>,
    networks: Arc<NetworkCatalog>,
    connection: ValidConnection,
}

impl AnchorageAssetFallback {
    pub fn new(
        client: Arc<dyn AnchorageClient>,
        networks: Arc<NetworkCatalog>,
        connection: ValidConnection,
    ) -> Self {
        Self {
            client,
            networks,
            connection,
        }
    }

    async fn to_resolved(
        &self,
        asset_type: AnchorageAssetType,
    ) -> Result<Option<ResolvedAsset>, CoreError> {
        let network = self
            .networks
            .find_by_external_id(Provider::Anchorage, &asset_type.network_id)
            .await?;
        Ok(network.map(|network| ResolvedAsset {
            network,
            asset_id: None,
            external_asset_id: asset_type.asset_type,
        }))
    }
}

#[async_trait]
impl AssetFallback for AnchorageAssetFallback {
    async fn by_external_id(
        &self,
        provider: Provider,
        external_asset_id: &str,
    ) -> Result<Option<ResolvedAsset>, CoreError> {
        if provider != Provider::Anchorage {
            return Ok(None);
        }
        let found = self
            .client
            .get_asset_types(&self.connection)
            .await?
            .into_iter()
            .find(|a| a.asset_type == external_asset_id);
        debug!(external_asset_id, found = found.is_some(), "anchorage asset-type lookup");
        match found {
            Some(asset_type) => self.to_resolved(asset_type).await,
            None => Ok(None),
        }
    }

    async fn by_onchain_id(
        &self,
        provider: Provider,
        network: &Network,
        address: &str,
    ) -> Result<Option<ResolvedAsset>, CoreError> {
        if provider != Provider::Anchorage {
            return Ok(None);
        }
        let Some(network_external_id) = network.external_id_for(provider) else {
            return Ok(None);
        };
        let found = self
            .client
            .get_asset_types(&self.connection)
            .await?
            .into_iter()
            .find(|a| {
                a.network_id == network_external_id
                    && a.onchain_identifier
                        .as_deref()
                        .is_some_and(|id| id.eq_ignore_ascii_case(address))
            });
        Ok(found.map(|asset_type| ResolvedAsset {
            network: network.clone(),
            asset_id: None,
            external_asset_id: asset_type.asset_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::anchorage::mock::MockAnchorage;
    use crate::resolver::{AssetReference, AssetResolver};
    use crate::store::MemoryStore;
    use crate::test_util::*;

    #[tokio::test]
    async fn unlisted_asset_type_resolves_live() {
        let store = Arc::new(MemoryStore::new());
        let (networks, assets) = seeded_catalogs(store).await;
        let client = Arc::new(
            MockAnchorage::builder()
                .with_asset_type("PEPE", "ETH")
                .build(),
        );
        let fallback =
            AnchorageAssetFallback::new(client, networks.clone(), anchorage_connection());
        let resolver = AssetResolver::new(networks, assets);

        let resolved = resolver
            .resolve(
                &AssetReference {
                    external_asset_id: Some("PEPE".into()),
                    ..AssetReference::default()
                },
                Provider::Anchorage,
                &fallback,
            )
            .await
            .unwrap();
        assert_eq!(resolved.network.id, "ETHEREUM");
        assert!(resolved.asset_id.is_none());

        // Other providers never consult Anchorage.
        assert!(fallback
            .by_external_id(Provider::Fireblocks, "PEPE")
            .await
            .unwrap()
            .is_none());
    }
}
