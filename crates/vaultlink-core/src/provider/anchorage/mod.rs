//! Anchorage Digital integration.
//!
//! Anchorage groups custody as vault → wallet → deposit address. Vaults map
//! onto canonical wallets, Anchorage wallets onto canonical accounts (one
//! network each), and each wallet's deposit address onto a canonical
//! address. Trusted destinations feed the known-destination allow-list.

mod client;
mod fallback;
#[cfg(test)]
pub mod mock;
mod reconcile;
pub mod types;

pub use client::HttpAnchorageClient;
pub use fallback::AnchorageAssetFallback;
pub use reconcile::AnchorageAdapter;
pub use types::{
    AnchorageAssetType, AnchorageDepositAddress, AnchorageTrustedDestination, AnchorageVault,
    AnchorageWallet, CryptoDestination,
};

use async_trait::async_trait;

use crate::connection::ValidConnection;
use crate::error::ProviderError;

/// The Anchorage API calls reconciliation depends on.
#[async_trait]
pub trait AnchorageClient: Send + Sync {
    async fn get_vaults(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageVault>, ProviderError>;

    /// Every wallet visible to the API key, across all vaults.
    async fn get_wallets(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageWallet>, ProviderError>;

    /// A single wallet. Unknown ids return [`ProviderError::NotFound`].
    async fn get_wallet(
        &self,
        connection: &ValidConnection,
        wallet_id: &str,
    ) -> Result<AnchorageWallet, ProviderError>;

    async fn get_trusted_destinations(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageTrustedDestination>, ProviderError>;

    async fn get_asset_types(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageAssetType>, ProviderError>;
}
