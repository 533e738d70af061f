use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::catalog::{AssetCatalog, NetworkCatalog};
use crate::connection::ValidConnection;
use crate::error::CoreError;
use crate::provider::{fetch_in_batches, ScopeSnapshot};
use crate::store::Repositories;
use crate::sync::adapter::ReconciliationAdapter;
use crate::sync::operation::{FailedOperation, Operation, OperationBatch, SkippedOperation};
use crate::types::{Network, Provider, SyncLimits};

use super::FireblocksClient;

/// Reconciles Fireblocks vault accounts for one connection.
///
/// The vault listing is always fetched in full; a non-empty scope only
/// filters which `{vault_id}-{network_id}` accounts are diffed afterwards.
/// Addresses are then listed per `(vault, asset)` in batches of
/// [`SyncLimits::address_batch_size`].
pub struct FireblocksAdapter {
    client: Arc<dyn FireblocksClient>,
    networks: Arc<NetworkCatalog>,
    assets: Arc<AssetCatalog>,
    repos: Repositories,
    limits: SyncLimits,
}

struct AddressJob {
    account_id: String,
    vault_id: String,
    network_id: String,
    asset_id: String,
}

fn account_external_id(vault_id: &str, network_id: &str) -> String {
    format!("{vault_id}-{network_id}")
}

impl FireblocksAdapter {
    pub fn new(
        client: Arc<dyn FireblocksClient>,
        networks: Arc<NetworkCatalog>,
        assets: Arc<AssetCatalog>,
        repos: Repositories,
        limits: SyncLimits,
    ) -> Self {
        Self {
            client,
            networks,
            assets,
            repos,
            limits,
        }
    }

    /// Canonical network for a Fireblocks asset id. The inner `Err` carries
    /// the reason a record is unmappable.
    async fn network_for_asset(
        &self,
        asset_id: &str,
    ) -> Result<Result<Network, String>, CoreError> {
        let Some(asset) = self
            .assets
            .find_by_external_id(Provider::Fireblocks, asset_id)
            .await?
        else {
            return Ok(Err(format!("unknown fireblocks asset {asset_id}")));
        };
        let Some(network) = self.networks.find_by_id(&asset.network_id).await? else {
            return Ok(Err(format!(
                "asset {} references unknown network {}",
                asset.id, asset.network_id
            )));
        };
        if network.external_id_for(Provider::Fireblocks).is_none() {
            return Ok(Err(format!(
                "network {} is not supported by fireblocks",
                network.id
            )));
        }
        Ok(Ok(network))
    }
}

#[async_trait]
impl ReconciliationAdapter for FireblocksAdapter {
    fn provider(&self) -> Provider {
        Provider::Fireblocks
    }

    async fn reconcile(
        &self,
        connection: &ValidConnection,
        requested_accounts: &[String],
    ) -> Result<OperationBatch, CoreError> {
        let now = OffsetDateTime::now_utc();
        let mut batch = OperationBatch::default();
        let mut snapshot = ScopeSnapshot::load(&self.repos, connection).await?;
        let scope: HashSet<&str> = requested_accounts.iter().map(String::as_str).collect();

        let vaults = self.client.get_vaults(connection).await?;
        debug!(connection.id = %connection.id, vaults = vaults.len(), "fireblocks vaults fetched");

        let mut matched: HashSet<String> = HashSet::new();
        let mut jobs: Vec<AddressJob> = Vec::new();

        for vault in vaults {
            let mut by_network: BTreeMap<String, (Network, Vec<String>)> = BTreeMap::new();
            for asset in &vault.assets {
                match self.network_for_asset(&asset.id).await? {
                    Ok(network) => {
                        by_network
                            .entry(network.id.clone())
                            .or_insert_with(|| (network, Vec::new()))
                            .1
                            .push(asset.id.clone());
                    }
                    // A scoped run cannot tell which account an unmapped
                    // asset would have belonged to, so it stays silent.
                    Err(message) if scope.is_empty() => {
                        batch.accounts.push(Operation::Failed(FailedOperation {
                            external_id: format!("{}-{}", vault.id, asset.id),
                            message,
                            context: json!({ "vault_id": vault.id, "asset_id": asset.id }),
                        }));
                    }
                    Err(_) => {}
                }
            }

            if !scope.is_empty() {
                by_network.retain(|network_id, _| {
                    scope.contains(account_external_id(&vault.id, network_id).as_str())
                });
                if by_network.is_empty() {
                    continue;
                }
            }

            let label = Some(vault.name.clone());
            let wallet_id = snapshot.diff_wallet(connection, &vault.id, label, now, &mut batch);

            for (network_id, (network, asset_ids)) in by_network {
                let external_id = account_external_id(&vault.id, &network_id);
                let account_id = snapshot.diff_account(
                    connection,
                    &external_id,
                    &wallet_id,
                    &network_id,
                    Some(format!("{} - {}", vault.name, network.name)),
                    now,
                    &mut batch,
                );
                matched.insert(external_id);
                jobs.extend(asset_ids.into_iter().map(|asset_id| AddressJob {
                    account_id: account_id.clone(),
                    vault_id: vault.id.clone(),
                    network_id: network_id.clone(),
                    asset_id,
                }));
            }
        }

        let mut skipped: HashSet<&str> = HashSet::new();
        for requested in requested_accounts {
            if !matched.contains(requested) && skipped.insert(requested) {
                batch.accounts.push(Operation::Skip(SkippedOperation {
                    external_id: requested.clone(),
                    reason: "account not reported by fireblocks".into(),
                }));
            }
        }

        let client = &self.client;
        let jobs_ref = &jobs;
        let settled = fetch_in_batches(
            (0..jobs.len()).collect(),
            self.limits.address_batch_size,
            |index: usize| async move {
                let job = &jobs_ref[index];
                client
                    .get_vault_addresses(connection, &job.asset_id, &job.vault_id)
                    .await
            },
        )
        .await?;
        if !settled.missing.is_empty() {
            debug!(missing = settled.missing.len(), "fireblocks address listings not found");
        }
        for index in settled.missing {
            let job = &jobs[index];
            batch.addresses.push(Operation::Skip(SkippedOperation {
                external_id: format!("{}-{}", job.vault_id, job.asset_id),
                reason: "address listing not found at fireblocks".into(),
            }));
        }

        for (index, addresses) in settled.found {
            let job = &jobs[index];
            for remote in addresses {
                let external_id = format!("{}-{}-{}", job.vault_id, job.network_id, remote.address);
                snapshot.add_address(
                    connection,
                    &job.account_id,
                    external_id,
                    remote.address,
                    now,
                    &mut batch,
                );
            }
        }

        info!(
            connection.id = %connection.id,
            requested = requested_accounts.len(),
            wallets = batch.wallets.len(),
            accounts = batch.accounts.len(),
            addresses = batch.addresses.len(),
            "fireblocks reconcile complete"
        );
        Ok(batch)
    }
}
