//! Boot-time seed data.
//!
//! The persistent storage engine is not part of this process, so the
//! reference catalog and the provider connections come from a JSON file:
//!
//! ```json
//! {
//!   "networks":    [{ "id": "BITCOIN", "coin_type": 0, "name": "Bitcoin",
//!                     "external_networks": [{ "provider": "anchorage", "external_id": "BTC" }] }],
//!   "assets":      [{ "id": "BTC", "network_id": "BITCOIN", "name": "Bitcoin", ... }],
//!   "connections": [{ "id": "conn-1", "client_id": "client-1", "provider": "anchorage", ... }]
//! }
//! ```

use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;

use vaultlink_core::catalog::{AssetCatalog, NetworkCatalog};
use vaultlink_core::connection::Connection;
use vaultlink_core::store::ConnectionRepository;
use vaultlink_core::types::{Asset, Network};

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub networks: usize,
    pub assets: usize,
    pub connections: usize,
}

impl Seed {
    pub async fn load(path: &Path) -> eyre::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("read seed file {}", path.display()))?;
        Self::parse(&raw).wrap_err_with(|| format!("parse seed file {}", path.display()))
    }

    pub fn parse(raw: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Networks go in before assets so the native-asset and mapping checks
    /// see them.
    pub async fn apply(
        self,
        networks: &NetworkCatalog,
        assets: &AssetCatalog,
        connections: &dyn ConnectionRepository,
    ) -> eyre::Result<SeedCounts> {
        let mut counts = SeedCounts::default();
        for network in self.networks {
            let id = network.id.clone();
            networks
                .create(network)
                .await
                .wrap_err_with(|| format!("seed network {id}"))?;
            counts.networks += 1;
        }
        for asset in self.assets {
            let id = asset.id.clone();
            assets
                .create(asset)
                .await
                .wrap_err_with(|| format!("seed asset {id}"))?;
            counts.assets += 1;
        }
        for connection in self.connections {
            let id = connection.id.clone();
            connections
                .save(connection)
                .await
                .wrap_err_with(|| format!("seed connection {id}"))?;
            counts.connections += 1;
        }
        Ok(counts)
    }
}
