use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::connection::ValidConnection;
use crate::error::ProviderError;

use super::types::{FireblocksVault, FireblocksVaultAddress, FireblocksVaultAsset};
use super::FireblocksClient;

/// A mock Fireblocks API for testing, populated via the builder pattern.
pub struct MockFireblocks {
    vaults: Vec<FireblocksVault>,
    /// Keyed by `(vault id, asset id)`.
    addresses: HashMap<(String, String), Vec<FireblocksVaultAddress>>,
    failing_vaults: HashSet<String>,
    /// `(vault id, asset id)` listings that answer with 404.
    missing_listings: HashSet<(String, String)>,
    pub address_calls: AtomicUsize,
}

impl MockFireblocks {
    pub fn builder() -> MockFireblocksBuilder {
        MockFireblocksBuilder::default()
    }
}

#[derive(Default)]
pub struct MockFireblocksBuilder {
    vaults: Vec<FireblocksVault>,
    addresses: HashMap<(String, String), Vec<FireblocksVaultAddress>>,
    failing_vaults: HashSet<String>,
    missing_listings: HashSet<(String, String)>,
}

impl MockFireblocksBuilder {
    pub fn with_vault(mut self, id: &str, name: &str, assets: &[&str]) -> Self {
        self.vaults.push(FireblocksVault {
            id: id.into(),
            name: name.into(),
            hidden_on_ui: false,
            assets: assets
                .iter()
                .map(|asset| FireblocksVaultAsset {
                    id: (*asset).into(),
                    total: Some("0".into()),
                })
                .collect(),
        });
        self
    }

    pub fn with_address(mut self, vault_id: &str, asset_id: &str, address: &str) -> Self {
        self.addresses
            .entry((vault_id.into(), asset_id.into()))
            .or_default()
            .push(FireblocksVaultAddress {
                asset_id: asset_id.into(),
                address: address.into(),
                tag: None,
                description: None,
                address_type: Some("Permanent".into()),
            });
        self
    }

    /// Address listings for `vault_id` answer with HTTP 500.
    pub fn failing_vault(mut self, vault_id: &str) -> Self {
        self.failing_vaults.insert(vault_id.into());
        self
    }

    /// The `(vault_id, asset_id)` address listing answers with 404.
    pub fn missing_listing(mut self, vault_id: &str, asset_id: &str) -> Self {
        self.missing_listings.insert((vault_id.into(), asset_id.into()));
        self
    }

    pub fn build(self) -> MockFireblocks {
        MockFireblocks {
            vaults: self.vaults,
            addresses: self.addresses,
            failing_vaults: self.failing_vaults,
            missing_listings: self.missing_listings,
            address_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FireblocksClient for MockFireblocks {
    async fn get_vaults(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<FireblocksVault>, ProviderError> {
        Ok(self.vaults.clone())
    }

    async fn get_vault_addresses(
        &self,
        _connection: &ValidConnection,
        asset_id: &str,
        vault_id: &str,
    ) -> Result<Vec<FireblocksVaultAddress>, ProviderError> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_vaults.contains(vault_id) {
            return Err(ProviderError::Status {
                status: 500,
                message: "injected failure".into(),
            });
        }
        let key = (vault_id.to_owned(), asset_id.to_owned());
        if self.missing_listings.contains(&key) {
            return Err(ProviderError::NotFound(format!(
                "vault {vault_id} asset {asset_id}"
            )));
        }
        Ok(self
            .addresses
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}
