use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::connection::Connection;
use crate::error::CoreError;
use crate::sync::run::SyncRun;
use crate::types::{
    Account, Address, Asset, ExternalAsset, ExternalNetwork, KnownDestination, Network, Provider,
    Wallet,
};

use super::{
    AccountRepository, AccountUpdate, AddressRepository, AssetRepository, ConnectionRepository,
    KnownDestinationRepository, KnownDestinationUpdate, NetworkRepository, SyncRunFilter,
    SyncRunRepository, WalletRepository, WalletUpdate,
};

// ==============================================================================
// MemoryStore
// ==============================================================================

/// In-memory canonical store keyed by canonical id.
///
/// Each bulk write validates the whole batch before touching any map, so a
/// rejected call leaves the store unchanged.
#[derive(Default)]
pub struct MemoryStore {
    networks: RwLock<HashMap<String, Network>>,
    assets: RwLock<HashMap<String, Asset>>,
    wallets: RwLock<HashMap<String, Wallet>>,
    accounts: RwLock<HashMap<String, Account>>,
    addresses: RwLock<HashMap<String, Address>>,
    known_destinations: RwLock<HashMap<String, KnownDestination>>,
    connections: RwLock<HashMap<String, Connection>>,
    sync_runs: RwLock<HashMap<String, SyncRun>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reject a batch whose ids collide with each other or with stored rows.
fn check_new_ids<'a, V>(
    kind: &str,
    existing: &HashMap<String, V>,
    ids: impl Iterator<Item = &'a String>,
) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for id in ids {
        if existing.contains_key(id) || !seen.insert(id) {
            return Err(CoreError::Persistence(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(())
}

fn check_known_ids<'a, V>(
    kind: &str,
    existing: &HashMap<String, V>,
    mut ids: impl Iterator<Item = &'a String>,
) -> Result<(), CoreError> {
    match ids.find(|id| !existing.contains_key(*id)) {
        Some(missing) => Err(CoreError::Persistence(format!(
            "{kind} {missing} does not exist"
        ))),
        None => Ok(()),
    }
}

// ==============================================================================
// Catalog
// ==============================================================================

#[async_trait]
impl NetworkRepository for MemoryStore {
    async fn find_all(&self) -> Result<Vec<Network>, CoreError> {
        let mut all: Vec<Network> = self.networks.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Network>, CoreError> {
        Ok(self.networks.read().await.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Network>, CoreError> {
        Ok(self
            .networks
            .read()
            .await
            .values()
            .find(|n| n.external_id_for(provider) == Some(external_id))
            .cloned())
    }

    async fn create(&self, network: Network) -> Result<Network, CoreError> {
        let mut networks = self.networks.write().await;
        check_new_ids("network", &networks, std::iter::once(&network.id))?;
        networks.insert(network.id.clone(), network.clone());
        Ok(network)
    }

    async fn add_external_networks(
        &self,
        network_id: &str,
        mappings: Vec<ExternalNetwork>,
    ) -> Result<Network, CoreError> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(network_id)
            .ok_or_else(|| CoreError::not_found("network", network_id))?;
        for mapping in mappings {
            if !network.external_networks.contains(&mapping) {
                network.external_networks.push(mapping);
            }
        }
        Ok(network.clone())
    }
}

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn find_all(&self) -> Result<Vec<Asset>, CoreError> {
        let mut all: Vec<Asset> = self.assets.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Asset>, CoreError> {
        Ok(self.assets.read().await.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Asset>, CoreError> {
        Ok(self
            .assets
            .read()
            .await
            .values()
            .find(|a| a.external_id_for(provider) == Some(external_id))
            .cloned())
    }

    async fn find_by_onchain_id(
        &self,
        network_id: &str,
        onchain_id: &str,
    ) -> Result<Option<Asset>, CoreError> {
        Ok(self
            .assets
            .read()
            .await
            .values()
            .find(|a| {
                a.network_id == network_id
                    && a.onchain_id
                        .as_deref()
                        .is_some_and(|id| id.eq_ignore_ascii_case(onchain_id))
            })
            .cloned())
    }

    async fn find_native(&self, network_id: &str) -> Result<Option<Asset>, CoreError> {
        Ok(self
            .assets
            .read()
            .await
            .values()
            .find(|a| a.network_id == network_id && a.is_native())
            .cloned())
    }

    async fn create(&self, asset: Asset) -> Result<Asset, CoreError> {
        let mut assets = self.assets.write().await;
        check_new_ids("asset", &assets, std::iter::once(&asset.id))?;
        assets.insert(asset.id.clone(), asset.clone());
        Ok(asset)
    }

    async fn add_external_assets(
        &self,
        asset_id: &str,
        mappings: Vec<ExternalAsset>,
    ) -> Result<Asset, CoreError> {
        let mut assets = self.assets.write().await;
        let asset = assets
            .get_mut(asset_id)
            .ok_or_else(|| CoreError::not_found("asset", asset_id))?;
        for mapping in mappings {
            if !asset.external_assets.contains(&mapping) {
                asset.external_assets.push(mapping);
            }
        }
        Ok(asset.clone())
    }
}

// ==============================================================================
// Custody Hierarchy
// ==============================================================================

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Wallet>, CoreError> {
        Ok(self
            .wallets
            .read()
            .await
            .values()
            .filter(|w| w.client_id == client_id && w.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, client_id: &str, id: &str) -> Result<Option<Wallet>, CoreError> {
        Ok(self
            .wallets
            .read()
            .await
            .get(id)
            .filter(|w| w.client_id == client_id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Wallet>, CoreError> {
        Ok(self
            .wallets
            .read()
            .await
            .values()
            .find(|w| {
                w.client_id == client_id && w.provider == provider && w.external_id == external_id
            })
            .cloned())
    }

    async fn bulk_create(&self, wallets: Vec<Wallet>) -> Result<(), CoreError> {
        let mut stored = self.wallets.write().await;
        check_new_ids("wallet", &stored, wallets.iter().map(|w| &w.id))?;
        stored.extend(wallets.into_iter().map(|w| (w.id.clone(), w)));
        Ok(())
    }

    async fn bulk_update(&self, updates: Vec<WalletUpdate>) -> Result<(), CoreError> {
        let mut stored = self.wallets.write().await;
        check_known_ids("wallet", &stored, updates.iter().map(|u| &u.id))?;
        for update in updates {
            if let Some(wallet) = stored.get_mut(&update.id) {
                wallet.label = update.label;
                wallet.updated_at = update.updated_at;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Account>, CoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.client_id == client_id && a.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Account>, CoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| {
                a.client_id == client_id && a.provider == provider && a.external_id == external_id
            })
            .cloned())
    }

    async fn find_by_wallet(
        &self,
        client_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<Account>, CoreError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.client_id == client_id && a.wallet_id.as_deref() == Some(wallet_id))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(accounts)
    }

    async fn bulk_create(&self, accounts: Vec<Account>) -> Result<(), CoreError> {
        let mut stored = self.accounts.write().await;
        check_new_ids("account", &stored, accounts.iter().map(|a| &a.id))?;
        stored.extend(accounts.into_iter().map(|a| (a.id.clone(), a)));
        Ok(())
    }

    async fn bulk_update(&self, updates: Vec<AccountUpdate>) -> Result<(), CoreError> {
        let mut stored = self.accounts.write().await;
        check_known_ids("account", &stored, updates.iter().map(|u| &u.id))?;
        for update in updates {
            if let Some(account) = stored.get_mut(&update.id) {
                account.label = update.label;
                account.wallet_id = update.wallet_id;
                account.updated_at = update.updated_at;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Address>, CoreError> {
        Ok(self
            .addresses
            .read()
            .await
            .values()
            .filter(|a| a.client_id == client_id && a.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Address>, CoreError> {
        Ok(self
            .addresses
            .read()
            .await
            .values()
            .find(|a| {
                a.client_id == client_id && a.provider == provider && a.external_id == external_id
            })
            .cloned())
    }

    async fn find_by_account(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> Result<Vec<Address>, CoreError> {
        let mut addresses: Vec<Address> = self
            .addresses
            .read()
            .await
            .values()
            .filter(|a| a.client_id == client_id && a.account_id == account_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(addresses)
    }

    async fn bulk_create(&self, addresses: Vec<Address>) -> Result<(), CoreError> {
        // Addresses reference accounts created earlier in the same batch.
        let accounts = self.accounts.read().await;
        check_known_ids("account", &accounts, addresses.iter().map(|a| &a.account_id))?;

        let mut stored = self.addresses.write().await;
        check_new_ids("address", &stored, addresses.iter().map(|a| &a.id))?;
        stored.extend(addresses.into_iter().map(|a| (a.id.clone(), a)));
        Ok(())
    }
}

#[async_trait]
impl KnownDestinationRepository for MemoryStore {
    async fn find_all_by_client(
        &self,
        client_id: &str,
        provider: Provider,
    ) -> Result<Vec<KnownDestination>, CoreError> {
        Ok(self
            .known_destinations
            .read()
            .await
            .values()
            .filter(|d| d.client_id == client_id && d.provider == provider)
            .cloned()
            .collect())
    }

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<KnownDestination>, CoreError> {
        Ok(self
            .known_destinations
            .read()
            .await
            .values()
            .find(|d| {
                d.client_id == client_id && d.provider == provider && d.external_id == external_id
            })
            .cloned())
    }

    async fn bulk_create(&self, destinations: Vec<KnownDestination>) -> Result<(), CoreError> {
        let mut stored = self.known_destinations.write().await;
        check_new_ids(
            "known destination",
            &stored,
            destinations.iter().map(|d| &d.id),
        )?;
        stored.extend(destinations.into_iter().map(|d| (d.id.clone(), d)));
        Ok(())
    }

    async fn bulk_update(&self, updates: Vec<KnownDestinationUpdate>) -> Result<(), CoreError> {
        let mut stored = self.known_destinations.write().await;
        check_known_ids("known destination", &stored, updates.iter().map(|u| &u.id))?;
        for update in updates {
            if let Some(destination) = stored.get_mut(&update.id) {
                destination.label = update.label;
                destination.asset_id = update.asset_id;
                destination.connection_ids = update.connection_ids;
                destination.updated_at = update.updated_at;
            }
        }
        Ok(())
    }

    async fn bulk_delete(&self, ids: Vec<String>) -> Result<(), CoreError> {
        let mut stored = self.known_destinations.write().await;
        for id in ids {
            stored.remove(&id);
        }
        Ok(())
    }
}

// ==============================================================================
// Connections / Sync Runs
// ==============================================================================

#[async_trait]
impl ConnectionRepository for MemoryStore {
    async fn find_by_id(
        &self,
        client_id: &str,
        id: &str,
    ) -> Result<Option<Connection>, CoreError> {
        Ok(self
            .connections
            .read()
            .await
            .get(id)
            .filter(|c| c.client_id == client_id)
            .cloned())
    }

    async fn find_all_by_client(&self, client_id: &str) -> Result<Vec<Connection>, CoreError> {
        let mut found: Vec<Connection> = self
            .connections
            .read()
            .await
            .values()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn save(&self, connection: Connection) -> Result<(), CoreError> {
        self.connections
            .write()
            .await
            .insert(connection.id.clone(), connection);
        Ok(())
    }
}

#[async_trait]
impl SyncRunRepository for MemoryStore {
    async fn create(&self, run: SyncRun) -> Result<SyncRun, CoreError> {
        let mut runs = self.sync_runs.write().await;
        check_new_ids("sync run", &runs, std::iter::once(&run.id))?;
        runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn update(&self, run: SyncRun) -> Result<SyncRun, CoreError> {
        let mut runs = self.sync_runs.write().await;
        check_known_ids("sync run", &runs, std::iter::once(&run.id))?;
        runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn find_by_id(&self, client_id: &str, id: &str) -> Result<Option<SyncRun>, CoreError> {
        Ok(self
            .sync_runs
            .read()
            .await
            .get(id)
            .filter(|r| r.client_id == client_id)
            .cloned())
    }

    async fn find_all(
        &self,
        client_id: &str,
        filter: &SyncRunFilter,
    ) -> Result<Vec<SyncRun>, CoreError> {
        let mut runs: Vec<SyncRun> = self
            .sync_runs
            .read()
            .await
            .values()
            .filter(|r| r.client_id == client_id)
            .filter(|r| {
                filter
                    .connection_id
                    .as_deref()
                    .is_none_or(|c| r.connection_id == c)
            })
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }
}
