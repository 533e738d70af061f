use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::connection::ValidConnection;
use crate::error::ProviderError;

use super::types::{
    AnchorageAssetType, AnchorageDepositAddress, AnchorageTrustedDestination, AnchorageVault,
    AnchorageWallet, CryptoDestination,
};
use super::AnchorageClient;

/// A mock Anchorage API for testing. Returns canned resources populated via
/// the builder pattern and counts per-wallet detail calls.
pub struct MockAnchorage {
    vaults: Vec<AnchorageVault>,
    wallets: Vec<AnchorageWallet>,
    destinations: Vec<AnchorageTrustedDestination>,
    asset_types: Vec<AnchorageAssetType>,
    failing_wallets: HashMap<String, u16>,
    fail_destinations: bool,
    pub wallet_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
}

impl MockAnchorage {
    pub fn builder() -> MockAnchorageBuilder {
        MockAnchorageBuilder::default()
    }
}

#[derive(Default)]
pub struct MockAnchorageBuilder {
    vaults: Vec<AnchorageVault>,
    wallets: Vec<AnchorageWallet>,
    destinations: Vec<AnchorageTrustedDestination>,
    asset_types: Vec<AnchorageAssetType>,
    failing_wallets: HashMap<String, u16>,
    fail_destinations: bool,
}

impl MockAnchorageBuilder {
    pub fn with_vault(mut self, vault_id: &str, name: &str) -> Self {
        self.vaults.push(AnchorageVault {
            vault_id: vault_id.into(),
            name: name.into(),
            description: None,
        });
        self
    }

    /// A wallet in `vault_id` with a deposit address `addr-{wallet_id}`.
    pub fn with_wallet(
        mut self,
        wallet_id: &str,
        vault_id: &str,
        network_id: &str,
        address: &str,
    ) -> Self {
        let vault_name = self
            .vaults
            .iter()
            .find(|v| v.vault_id == vault_id)
            .map(|v| v.name.clone());
        self.wallets.push(AnchorageWallet {
            wallet_id: wallet_id.into(),
            wallet_name: format!("{wallet_id} wallet"),
            vault_id: vault_id.into(),
            vault_name,
            network_id: network_id.into(),
            deposit_address: Some(AnchorageDepositAddress {
                address: address.into(),
                address_id: format!("addr-{wallet_id}"),
            }),
        });
        self
    }

    pub fn with_destination(
        mut self,
        id: &str,
        network_id: &str,
        address: &str,
        asset_type: Option<&str>,
        name: Option<&str>,
    ) -> Self {
        self.destinations.push(AnchorageTrustedDestination {
            id: id.into(),
            destination_type: "crypto".into(),
            crypto: Some(CryptoDestination {
                address: address.into(),
                network_id: network_id.into(),
                asset_type: asset_type.map(Into::into),
                memo: None,
                name: name.map(Into::into),
            }),
        });
        self
    }

    pub fn with_asset_type(mut self, asset_type: &str, network_id: &str) -> Self {
        self.asset_types.push(AnchorageAssetType {
            asset_type: asset_type.into(),
            network_id: network_id.into(),
            name: Some(asset_type.into()),
            decimals: Some(18),
            onchain_identifier: None,
        });
        self
    }

    /// `get_wallet(wallet_id)` answers with HTTP `status` instead of data.
    pub fn failing_wallet(mut self, wallet_id: &str, status: u16) -> Self {
        self.failing_wallets.insert(wallet_id.into(), status);
        self
    }

    pub fn failing_destinations(mut self) -> Self {
        self.fail_destinations = true;
        self
    }

    pub fn build(self) -> MockAnchorage {
        MockAnchorage {
            vaults: self.vaults,
            wallets: self.wallets,
            destinations: self.destinations,
            asset_types: self.asset_types,
            failing_wallets: self.failing_wallets,
            fail_destinations: self.fail_destinations,
            wallet_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnchorageClient for MockAnchorage {
    async fn get_vaults(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageVault>, ProviderError> {
        Ok(self.vaults.clone())
    }

    async fn get_wallets(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageWallet>, ProviderError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.wallets.clone())
    }

    async fn get_wallet(
        &self,
        _connection: &ValidConnection,
        wallet_id: &str,
    ) -> Result<AnchorageWallet, ProviderError> {
        self.wallet_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(&status) = self.failing_wallets.get(wallet_id) {
            return Err(if status == 404 {
                ProviderError::NotFound(wallet_id.into())
            } else {
                ProviderError::Status {
                    status,
                    message: "injected failure".into(),
                }
            });
        }
        self.wallets
            .iter()
            .find(|w| w.wallet_id == wallet_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(wallet_id.into()))
    }

    async fn get_trusted_destinations(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageTrustedDestination>, ProviderError> {
        if self.fail_destinations {
            return Err(ProviderError::Status {
                status: 500,
                message: "injected failure".into(),
            });
        }
        Ok(self.destinations.clone())
    }

    async fn get_asset_types(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageAssetType>, ProviderError> {
        Ok(self.asset_types.clone())
    }
}
