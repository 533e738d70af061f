//! Shared test helpers for `vaultlink-core` unit tests.
//!
//! Builders for catalog entries, custody entities and connections, with a
//! fixed timestamp so that values built twice compare equal.

use std::collections::BTreeSet;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::catalog::{AssetCatalog, NetworkCatalog};
use crate::connection::{Connection, ConnectionCredentials, ConnectionStatus, ValidConnection};
use crate::store::MemoryStore;
use crate::types::{
    Account, Address, Asset, CatalogConfig, ExternalAsset, ExternalNetwork, KnownDestination,
    Network, Provider, Wallet,
};

pub const CLIENT_ID: &str = "client-1";
pub const CONNECTION_ID: &str = "conn-1";

pub fn fixed_time() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid unix timestamp")
}

// ==============================================================================
// Catalog Builders
// ==============================================================================

pub fn make_network(id: &str, mappings: &[(Provider, &str)]) -> Network {
    Network {
        id: id.into(),
        coin_type: None,
        name: id.to_lowercase(),
        external_networks: mappings
            .iter()
            .map(|(provider, external_id)| ExternalNetwork {
                provider: *provider,
                external_id: (*external_id).into(),
            })
            .collect(),
        created_at: fixed_time(),
    }
}

pub fn bitcoin_network() -> Network {
    Network {
        coin_type: Some(0),
        name: "Bitcoin".into(),
        ..make_network(
            "BITCOIN",
            &[(Provider::Anchorage, "BTC"), (Provider::Fireblocks, "BTC")],
        )
    }
}

pub fn ethereum_network() -> Network {
    Network {
        coin_type: Some(60),
        name: "Ethereum".into(),
        ..make_network(
            "ETHEREUM",
            &[(Provider::Anchorage, "ETH"), (Provider::Fireblocks, "ETH")],
        )
    }
}

fn external_assets(mappings: &[(Provider, &str)]) -> Vec<ExternalAsset> {
    mappings
        .iter()
        .map(|(provider, external_id)| ExternalAsset {
            provider: *provider,
            external_id: (*external_id).into(),
        })
        .collect()
}

pub fn make_native(id: &str, network_id: &str, mappings: &[(Provider, &str)]) -> Asset {
    Asset {
        id: id.into(),
        network_id: network_id.into(),
        name: id.into(),
        symbol: Some(id.into()),
        decimals: Some(18),
        onchain_id: None,
        external_assets: external_assets(mappings),
        created_at: fixed_time(),
    }
}

/// A token with no provider mappings.
pub fn make_token(id: &str, network_id: &str, onchain_id: &str) -> Asset {
    Asset {
        onchain_id: Some(onchain_id.into()),
        decimals: Some(6),
        ..make_native(id, network_id, &[])
    }
}

pub fn ether_asset() -> Asset {
    make_native(
        "ETH",
        "ETHEREUM",
        &[(Provider::Anchorage, "ETH"), (Provider::Fireblocks, "ETH")],
    )
}

pub fn usdc_asset() -> Asset {
    Asset {
        external_assets: external_assets(&[(Provider::Fireblocks, "USDC")]),
        ..make_token(
            "USDC_ETH",
            "ETHEREUM",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
        )
    }
}

pub fn bitcoin_asset() -> Asset {
    Asset {
        decimals: Some(8),
        ..make_native(
            "BTC",
            "BITCOIN",
            &[(Provider::Anchorage, "BTC"), (Provider::Fireblocks, "BTC")],
        )
    }
}

/// Catalogs over `store` holding Bitcoin and Ethereum with ETH, USDC and BTC,
/// with indexes built.
pub async fn seeded_catalogs(store: Arc<MemoryStore>) -> (Arc<NetworkCatalog>, Arc<AssetCatalog>) {
    let networks = Arc::new(NetworkCatalog::new(store.clone(), CatalogConfig::default()));
    let assets = Arc::new(AssetCatalog::new(store, CatalogConfig::default()));
    for network in [bitcoin_network(), ethereum_network()] {
        networks.create(network).await.expect("seed network");
    }
    for asset in [ether_asset(), usdc_asset(), bitcoin_asset()] {
        assets.create(asset).await.expect("seed asset");
    }
    networks.build_index().await.expect("network index");
    assets.build_index().await.expect("asset index");
    (networks, assets)
}

// ==============================================================================
// Custody Builders
// ==============================================================================

pub fn make_wallet(id: &str, external_id: &str, label: Option<&str>) -> Wallet {
    Wallet {
        id: id.into(),
        client_id: CLIENT_ID.into(),
        connection_id: CONNECTION_ID.into(),
        provider: Provider::Anchorage,
        external_id: external_id.into(),
        label: label.map(Into::into),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn make_account(
    id: &str,
    wallet_id: Option<&str>,
    external_id: &str,
    network_id: &str,
) -> Account {
    Account {
        id: id.into(),
        client_id: CLIENT_ID.into(),
        connection_id: CONNECTION_ID.into(),
        provider: Provider::Anchorage,
        external_id: external_id.into(),
        wallet_id: wallet_id.map(Into::into),
        network_id: network_id.into(),
        label: None,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn make_address(id: &str, account_id: &str, external_id: &str, address: &str) -> Address {
    Address {
        id: id.into(),
        account_id: account_id.into(),
        client_id: CLIENT_ID.into(),
        connection_id: CONNECTION_ID.into(),
        provider: Provider::Anchorage,
        external_id: external_id.into(),
        address: address.into(),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn make_destination(id: &str, external_id: &str, connection_ids: &[&str]) -> KnownDestination {
    KnownDestination {
        id: id.into(),
        client_id: CLIENT_ID.into(),
        provider: Provider::Anchorage,
        external_id: external_id.into(),
        address: format!("0x{external_id}"),
        label: None,
        asset_id: None,
        network_id: "ETHEREUM".into(),
        connection_ids: connection_ids.iter().map(|c| (*c).to_owned()).collect::<BTreeSet<_>>(),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

// ==============================================================================
// Connections
// ==============================================================================

pub fn active_connection(provider: Provider) -> Connection {
    Connection {
        id: CONNECTION_ID.into(),
        client_id: CLIENT_ID.into(),
        provider,
        status: ConnectionStatus::Active,
        url: Some(format!("https://api.{provider}.test")),
        credentials: Some(ConnectionCredentials {
            api_key: "test-api-key".into(),
            private_key: None,
        }),
    }
}

pub fn anchorage_connection() -> ValidConnection {
    active_connection(Provider::Anchorage)
        .validate()
        .expect("test connection is valid")
}

pub fn fireblocks_connection() -> ValidConnection {
    active_connection(Provider::Fireblocks)
        .validate()
        .expect("test connection is valid")
}
