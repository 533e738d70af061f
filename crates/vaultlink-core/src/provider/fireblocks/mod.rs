//! Fireblocks integration.
//!
//! Fireblocks exposes vault accounts, each holding per-asset wallets. A
//! vault account maps onto a canonical wallet; the vault's asset wallets are
//! grouped by canonical network into one canonical account per
//! `(vault, network)`, with external id `{vault_id}-{network_id}`.
//!
//! Request signing is not implemented here; any concrete
//! [`FireblocksClient`] owns it.

#[cfg(test)]
pub mod mock;
mod reconcile;
pub mod types;

pub use reconcile::FireblocksAdapter;
pub use types::{FireblocksVault, FireblocksVaultAddress, FireblocksVaultAsset};

use async_trait::async_trait;

use crate::connection::ValidConnection;
use crate::error::ProviderError;

#[async_trait]
pub trait FireblocksClient: Send + Sync {
    /// Every vault account, fully paginated.
    async fn get_vaults(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<FireblocksVault>, ProviderError>;

    async fn get_vault_addresses(
        &self,
        connection: &ValidConnection,
        asset_id: &str,
        vault_id: &str,
    ) -> Result<Vec<FireblocksVaultAddress>, ProviderError>;
}
