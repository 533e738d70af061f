//! Asset reference resolution.
//!
//! Turns a loosely specified asset reference into a concrete
//! `(network, provider external asset id)` pair. Branches are tried in a
//! fixed order:
//!
//! 1. provider external asset id, then the caller's fallback for it;
//! 2. canonical asset id;
//! 3. network id + on-chain address, then the caller's fallback for it;
//! 4. network id alone, meaning the network's native asset.
//!
//! Fallbacks are how a provider adapter lets the resolver ask the provider
//! live about assets the catalog has not listed yet.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{AssetCatalog, NetworkCatalog};
use crate::error::CoreError;
use crate::types::{Asset, Network, Provider};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub asset_id: Option<String>,
    pub external_asset_id: Option<String>,
    pub network_id: Option<String>,
    pub address: Option<String>,
}

impl std::fmt::Display for AssetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = [
            ("asset_id", &self.asset_id),
            ("external_asset_id", &self.external_asset_id),
            ("network_id", &self.network_id),
            ("address", &self.address),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{name}={v}")))
        .collect();
        if parts.is_empty() {
            f.write_str("<empty reference>")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAsset {
    pub network: Network,
    /// `None` when the asset came from a live provider fallback and is not
    /// in the catalog.
    pub asset_id: Option<String>,
    pub external_asset_id: String,
}

/// Provider-specific strategies consulted when the catalog has no answer.
#[async_trait]
pub trait AssetFallback: Send + Sync {
    async fn by_external_id(
        &self,
        _provider: Provider,
        _external_asset_id: &str,
    ) -> Result<Option<ResolvedAsset>, CoreError> {
        Ok(None)
    }

    async fn by_onchain_id(
        &self,
        _provider: Provider,
        _network: &Network,
        _address: &str,
    ) -> Result<Option<ResolvedAsset>, CoreError> {
        Ok(None)
    }
}

/// Catalog-only resolution.
pub struct NoFallback;

impl AssetFallback for NoFallback {}

pub struct AssetResolver {
    networks: Arc<NetworkCatalog>,
    assets: Arc<AssetCatalog>,
}

impl AssetResolver {
    pub fn new(networks: Arc<NetworkCatalog>, assets: Arc<AssetCatalog>) -> Self {
        Self { networks, assets }
    }

    pub async fn resolve(
        &self,
        reference: &AssetReference,
        provider: Provider,
        fallback: &dyn AssetFallback,
    ) -> Result<ResolvedAsset, CoreError> {
        // Set when a branch finds the asset but the provider cannot serve
        // its network; reported only if no later branch succeeds.
        let mut unsupported: Option<CoreError> = None;

        if let Some(external_id) = reference.external_asset_id.as_deref() {
            match self.assets.find_by_external_id(provider, external_id).await? {
                Some(asset) => match self.resolve_listed(&asset, provider).await? {
                    Ok(resolved) => return Ok(resolved),
                    Err(err) => unsupported = Some(err),
                },
                None => {
                    if let Some(resolved) = fallback.by_external_id(provider, external_id).await? {
                        debug!(%provider, external_id, "asset resolved by provider fallback");
                        return Ok(resolved);
                    }
                }
            }
        }

        if let Some(asset_id) = reference.asset_id.as_deref() {
            if let Some(asset) = self.assets.find_by_id(asset_id).await? {
                match self.resolve_listed(&asset, provider).await? {
                    Ok(resolved) => return Ok(resolved),
                    Err(err) => unsupported = Some(err),
                }
            }
        }

        if let Some(network_id) = reference.network_id.as_deref() {
            if let Some(network) = self.networks.find_by_id(network_id).await? {
                if network.external_id_for(provider).is_none() {
                    return Err(CoreError::NetworkUnsupported {
                        network_id: network.id,
                        provider,
                    });
                }

                let listed = match reference.address.as_deref() {
                    Some(address) => self.assets.find_by_onchain_id(&network.id, address).await?,
                    None => self.assets.find_native(&network.id).await?,
                };
                if let Some(resolved) = listed.and_then(|asset| {
                    asset
                        .external_id_for(provider)
                        .map(|external_id| ResolvedAsset {
                            asset_id: Some(asset.id.clone()),
                            external_asset_id: external_id.to_owned(),
                            network: network.clone(),
                        })
                }) {
                    return Ok(resolved);
                }

                if let Some(address) = reference.address.as_deref() {
                    if let Some(resolved) =
                        fallback.by_onchain_id(provider, &network, address).await?
                    {
                        debug!(%provider, network.id = %network.id, address, "asset resolved by provider fallback");
                        return Ok(resolved);
                    }
                }
            }
        }

        Err(unsupported.unwrap_or_else(|| CoreError::not_found("asset", reference.to_string())))
    }

    /// A catalog asset resolves only if the provider supports its network
    /// and lists the asset itself. The inner `Err` is the recoverable
    /// "network unsupported" outcome.
    async fn resolve_listed(
        &self,
        asset: &Asset,
        provider: Provider,
    ) -> Result<Result<ResolvedAsset, CoreError>, CoreError> {
        let network = self
            .networks
            .find_by_id(&asset.network_id)
            .await?
            .ok_or_else(|| CoreError::not_found("network", asset.network_id.clone()))?;

        if network.external_id_for(provider).is_none() {
            return Ok(Err(CoreError::NetworkUnsupported {
                network_id: network.id,
                provider,
            }));
        }

        match asset.external_id_for(provider) {
            Some(external_id) => Ok(Ok(ResolvedAsset {
                external_asset_id: external_id.to_owned(),
                asset_id: Some(asset.id.clone()),
                network,
            })),
            None => Ok(Err(CoreError::not_found(
                "provider asset mapping",
                format!("{}:{provider}", asset.id),
            ))),
        }
    }
}
