//! Canonical store accessors.
//!
//! Narrow repository traits over the storage engine, keyed by client and
//! external id, plus [`MemoryStore`], an in-process implementation used by
//! the binary and by tests. Writes are bulk and all-or-nothing per call;
//! there is no transaction spanning calls.

mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::connection::Connection;
use crate::error::CoreError;
use crate::sync::run::{SyncRun, SyncStatus};
use crate::types::{
    Account, Address, Asset, ExternalAsset, ExternalNetwork, KnownDestination, Network, Provider,
    Wallet,
};

// ==============================================================================
// Partial Updates
// ==============================================================================

/// Replacement values for a wallet's tracked fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletUpdate {
    pub id: String,
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub id: String,
    pub label: Option<String>,
    pub wallet_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownDestinationUpdate {
    pub id: String,
    pub label: Option<String>,
    pub asset_id: Option<String>,
    pub connection_ids: BTreeSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// ==============================================================================
// Catalog Repositories
// ==============================================================================

#[async_trait]
pub trait NetworkRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Network>, CoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Network>, CoreError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Network>, CoreError>;

    async fn create(&self, network: Network) -> Result<Network, CoreError>;

    /// Append provider mappings to an existing network.
    async fn add_external_networks(
        &self,
        network_id: &str,
        mappings: Vec<ExternalNetwork>,
    ) -> Result<Network, CoreError>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Asset>, CoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Asset>, CoreError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Asset>, CoreError>;

    async fn find_by_onchain_id(
        &self,
        network_id: &str,
        onchain_id: &str,
    ) -> Result<Option<Asset>, CoreError>;

    async fn find_native(&self, network_id: &str) -> Result<Option<Asset>, CoreError>;

    async fn create(&self, asset: Asset) -> Result<Asset, CoreError>;

    async fn add_external_assets(
        &self,
        asset_id: &str,
        mappings: Vec<ExternalAsset>,
    ) -> Result<Asset, CoreError>;
}

// ==============================================================================
// Custody Repositories
// ==============================================================================

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Wallet>, CoreError>;

    async fn find_by_id(&self, client_id: &str, id: &str) -> Result<Option<Wallet>, CoreError>;

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Wallet>, CoreError>;

    async fn bulk_create(&self, wallets: Vec<Wallet>) -> Result<(), CoreError>;

    async fn bulk_update(&self, updates: Vec<WalletUpdate>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Account>, CoreError>;

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Account>, CoreError>;

    /// Derived view: every account whose `wallet_id` points at `wallet_id`.
    async fn find_by_wallet(
        &self,
        client_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<Account>, CoreError>;

    async fn bulk_create(&self, accounts: Vec<Account>) -> Result<(), CoreError>;

    async fn bulk_update(&self, updates: Vec<AccountUpdate>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn find_all_by_scope(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Vec<Address>, CoreError>;

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Address>, CoreError>;

    /// Derived view: every address owned by `account_id`.
    async fn find_by_account(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> Result<Vec<Address>, CoreError>;

    async fn bulk_create(&self, addresses: Vec<Address>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait KnownDestinationRepository: Send + Sync {
    async fn find_all_by_client(
        &self,
        client_id: &str,
        provider: Provider,
    ) -> Result<Vec<KnownDestination>, CoreError>;

    async fn find_by_external_id(
        &self,
        client_id: &str,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<KnownDestination>, CoreError>;

    async fn bulk_create(&self, destinations: Vec<KnownDestination>) -> Result<(), CoreError>;

    async fn bulk_update(&self, updates: Vec<KnownDestinationUpdate>) -> Result<(), CoreError>;

    async fn bulk_delete(&self, ids: Vec<String>) -> Result<(), CoreError>;
}

// ==============================================================================
// Connection / Sync Run Repositories
// ==============================================================================

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn find_by_id(&self, client_id: &str, id: &str)
        -> Result<Option<Connection>, CoreError>;

    /// Every connection of a client, ordered by id.
    async fn find_all_by_client(&self, client_id: &str) -> Result<Vec<Connection>, CoreError>;

    async fn save(&self, connection: Connection) -> Result<(), CoreError>;
}

/// Filters for [`SyncRunRepository::find_all`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRunFilter {
    pub connection_id: Option<String>,
    pub status: Option<SyncStatus>,
}

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn create(&self, run: SyncRun) -> Result<SyncRun, CoreError>;

    async fn update(&self, run: SyncRun) -> Result<SyncRun, CoreError>;

    async fn find_by_id(&self, client_id: &str, id: &str) -> Result<Option<SyncRun>, CoreError>;

    /// Runs for a client, newest first.
    async fn find_all(
        &self,
        client_id: &str,
        filter: &SyncRunFilter,
    ) -> Result<Vec<SyncRun>, CoreError>;
}

// ==============================================================================
// Repository Bundle
// ==============================================================================

/// The custody repositories the sync engine writes through.
#[derive(Clone)]
pub struct Repositories {
    pub wallets: Arc<dyn WalletRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub known_destinations: Arc<dyn KnownDestinationRepository>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub sync_runs: Arc<dyn SyncRunRepository>,
}

impl Repositories {
    /// Point every repository at one shared [`MemoryStore`].
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            wallets: store.clone(),
            accounts: store.clone(),
            addresses: store.clone(),
            known_destinations: store.clone(),
            connections: store.clone(),
            sync_runs: store,
        }
    }

    /// Children of a wallet, materialized from each account's `wallet_id`.
    pub async fn accounts_of_wallet(
        &self,
        client_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<Account>, CoreError> {
        if self.wallets.find_by_id(client_id, wallet_id).await?.is_none() {
            return Err(CoreError::not_found("wallet", wallet_id));
        }
        self.accounts.find_by_wallet(client_id, wallet_id).await
    }

    pub async fn addresses_of_account(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> Result<Vec<Address>, CoreError> {
        self.addresses.find_by_account(client_id, account_id).await
    }
}
