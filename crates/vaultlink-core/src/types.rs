//! Canonical domain types for Vaultlink's custody model.
//!
//! Contains the reference catalog (`Network`, `Asset`), the owned custody
//! hierarchy (`Wallet` → `Account` → `Address`), the `KnownDestination`
//! allow-list, and shared configuration structs.
//!
//! Containment is one-directional: a child stores its parent's id and
//! "children of X" is always a query, never a stored collection.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ==============================================================================
// Provider
// ==============================================================================

/// The closed set of custodial platforms Vaultlink integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anchorage,
    Fireblocks,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchorage => "anchorage",
            Self::Fireblocks => "fireblocks",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anchorage" => Ok(Self::Anchorage),
            "fireblocks" => Ok(Self::Fireblocks),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

// ==============================================================================
// Network / Asset Catalog
// ==============================================================================

/// A provider's own identifier for a canonical network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalNetwork {
    pub provider: Provider,
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    /// SLIP-44 coin type, when the network has one.
    pub coin_type: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub external_networks: Vec<ExternalNetwork>,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
}

impl Network {
    /// The id this provider uses for the network, if it supports it at all.
    pub fn external_id_for(&self, provider: Provider) -> Option<&str> {
        self.external_networks
            .iter()
            .find(|e| e.provider == provider)
            .map(|e| e.external_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalAsset {
    pub provider: Provider,
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub network_id: String,
    pub name: String,
    pub symbol: Option<String>,
    pub decimals: Option<u32>,
    /// Contract address or issuer id. `None` marks the network's native asset.
    pub onchain_id: Option<String>,
    #[serde(default)]
    pub external_assets: Vec<ExternalAsset>,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
}

impl Asset {
    pub fn is_native(&self) -> bool {
        self.onchain_id.is_none()
    }

    pub fn external_id_for(&self, provider: Provider) -> Option<&str> {
        self.external_assets
            .iter()
            .find(|e| e.provider == provider)
            .map(|e| e.external_id.as_str())
    }
}

// ==============================================================================
// Custody Hierarchy
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub client_id: String,
    pub connection_id: String,
    pub provider: Provider,
    pub external_id: String,
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub client_id: String,
    pub connection_id: String,
    pub provider: Provider,
    pub external_id: String,
    pub wallet_id: Option<String>,
    pub network_id: String,
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Addresses are only ever created by reconciliation; `external_id` never
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: String,
    pub account_id: String,
    pub client_id: String,
    pub connection_id: String,
    pub provider: Provider,
    pub external_id: String,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// An allow-listed transfer destination. Unlike the owned hierarchy it can
/// be observed through several connections at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownDestination {
    pub id: String,
    pub client_id: String,
    pub provider: Provider,
    pub external_id: String,
    pub address: String,
    pub label: Option<String>,
    pub asset_id: Option<String>,
    pub network_id: String,
    pub connection_ids: BTreeSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// ==============================================================================
// Limits / Config
// ==============================================================================

/// Concurrency bounds for remote detail calls made inside one adapter
/// invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncLimits {
    /// Per-id wallet detail requests issued concurrently per batch.
    pub wallet_batch_size: usize,
    /// Per-vault address listing requests issued concurrently per batch.
    pub address_batch_size: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            wallet_batch_size: 10,
            address_batch_size: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Entries per read-through cache instance.
    pub cache_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for provider in [Provider::Anchorage, Provider::Fireblocks] {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert!("coinbase".parse::<Provider>().is_err());
    }

    #[test]
    fn network_seed_json_defaults_created_at() {
        let network: Network = serde_json::from_str(
            r#"{"id":"BTC","coin_type":0,"name":"Bitcoin",
                "external_networks":[{"provider":"anchorage","external_id":"BTC"}]}"#,
        )
        .expect("seed network must parse");
        assert_eq!(network.external_id_for(Provider::Anchorage), Some("BTC"));
        assert_eq!(network.external_id_for(Provider::Fireblocks), None);
    }
}
