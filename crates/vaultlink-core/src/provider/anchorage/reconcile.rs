use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{AssetCatalog, NetworkCatalog};
use crate::connection::ValidConnection;
use crate::error::CoreError;
use crate::provider::{fetch_in_batches, ScopeSnapshot};
use crate::store::{KnownDestinationUpdate, Repositories};
use crate::sync::adapter::ReconciliationAdapter;
use crate::sync::operation::{
    FailedOperation, KnownDestinationOperation, Operation, OperationBatch, SkippedOperation,
};
use crate::types::{KnownDestination, Provider, SyncLimits};

use super::types::{AnchorageTrustedDestination, AnchorageWallet};
use super::AnchorageClient;

/// Reconciles Anchorage vaults, wallets, deposit addresses and trusted
/// destinations for one connection.
///
/// Scoped runs take Anchorage wallet ids and fetch each one individually in
/// batches of [`SyncLimits::wallet_batch_size`]; ids the API no longer knows
/// become skips. An empty scope lists every wallet instead.
pub struct AnchorageAdapter {
    client: Arc<dyn AnchorageClient>,
    networks: Arc<NetworkCatalog>,
    assets: Arc<AssetCatalog>,
    repos: Repositories,
    limits: SyncLimits,
}

impl AnchorageAdapter {
    pub fn new(
        client: Arc<dyn AnchorageClient>,
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

    /// Remote wallets in scope, plus skips for requested ids that are gone.
    async fn fetch_wallets(
        &self,
        connection: &ValidConnection,
        requested: &[String],
    ) -> Result<(Vec<AnchorageWallet>, Vec<SkippedOperation>), CoreError> {
        if requested.is_empty() {
            warn!(connection.id = %connection.id, "unscoped anchorage sync; listing every wallet");
            return Ok((self.client.get_wallets(connection).await?, Vec::new()));
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = requested
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let client = &self.client;
        let settled = fetch_in_batches(ids, self.limits.wallet_batch_size, |wallet_id| async move {
            client.get_wallet(connection, &wallet_id).await
        })
        .await?;

        let skips = settled
            .missing
            .into_iter()
            .map(|external_id| SkippedOperation {
                external_id,
                reason: "wallet not found at anchorage".into(),
            })
            .collect();
        Ok((settled.found.into_iter().map(|(_, w)| w).collect(), skips))
    }

    async fn reconcile_custody(
        &self,
        connection: &ValidConnection,
        requested: &[String],
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) -> Result<(), CoreError> {
        let mut snapshot = ScopeSnapshot::load(&self.repos, connection).await?;
        let (remote, skips) = self.fetch_wallets(connection, requested).await?;
        batch
            .accounts
            .extend(skips.into_iter().map(Operation::Skip));
        if remote.is_empty() {
            return Ok(());
        }

        let vault_names: HashMap<String, String> = self
            .client
            .get_vaults(connection)
            .await?
            .into_iter()
            .map(|v| (v.vault_id, v.name))
            .collect();

        let mut by_vault: BTreeMap<String, Vec<AnchorageWallet>> = BTreeMap::new();
        for wallet in remote {
            by_vault.entry(wallet.vault_id.clone()).or_default().push(wallet);
        }

        for (vault_id, members) in by_vault {
            let label = vault_names
                .get(&vault_id)
                .cloned()
                .or_else(|| members.iter().find_map(|w| w.vault_name.clone()));
            let wallet_id = snapshot.diff_wallet(connection, &vault_id, label, now, batch);

            for remote_wallet in members {
                self.diff_account(&mut snapshot, connection, &wallet_id, remote_wallet, now, batch)
                    .await?;
            }
        }
        Ok(())
    }

    async fn diff_account(
        &self,
        snapshot: &mut ScopeSnapshot,
        connection: &ValidConnection,
        wallet_id: &str,
        remote: AnchorageWallet,
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) -> Result<(), CoreError> {
        let Some(network) = self
            .networks
            .find_by_external_id(Provider::Anchorage, &remote.network_id)
            .await?
        else {
            debug!(wallet = %remote.wallet_id, network = %remote.network_id, "unmapped anchorage network");
            batch.accounts.push(Operation::Failed(FailedOperation {
                external_id: remote.wallet_id.clone(),
                message: format!("unknown anchorage network {}", remote.network_id),
                context: json!({
                    "network_id": remote.network_id,
                    "vault_id": remote.vault_id,
                    "address": remote.deposit_address.as_ref().map(|d| &d.address),
                }),
            }));
            return Ok(());
        };

        let account_id = snapshot.diff_account(
            connection,
            &remote.wallet_id,
            wallet_id,
            &network.id,
            Some(remote.wallet_name),
            now,
            batch,
        );
        if let Some(deposit) = remote.deposit_address {
            snapshot.add_address(
                connection,
                &account_id,
                deposit.address_id,
                deposit.address,
                now,
                batch,
            );
        }
        Ok(())
    }

    // ==========================================================================
    // Known destinations
    // ==========================================================================

    async fn reconcile_destinations(
        &self,
        connection: &ValidConnection,
        now: OffsetDateTime,
        batch: &mut OperationBatch,
    ) -> Result<(), CoreError> {
        let existing: HashMap<String, KnownDestination> = self
            .repos
            .known_destinations
            .find_all_by_client(&connection.client_id, Provider::Anchorage)
            .await?
            .into_iter()
            .map(|d| (d.external_id.clone(), d))
            .collect();
        let remote = self.client.get_trusted_destinations(connection).await?;

        // Ids reported by the provider, mapped or not; anything else this
        // connection used to observe has been removed remotely.
        let mut reported: HashSet<String> = HashSet::new();
        for destination in remote {
            // Overlapping pages may report an id twice.
            if !reported.insert(destination.id.clone()) {
                continue;
            }
            if let Some(op) = self
                .diff_destination(existing.get(&destination.id), connection, destination, now)
                .await?
            {
                batch.known_destinations.push(op);
            }
        }

        let mut vanished: Vec<&KnownDestination> = existing
            .values()
            .filter(|d| d.connection_ids.contains(&connection.id))
            .filter(|d| !reported.contains(&d.external_id))
            .collect();
        vanished.sort_by(|a, b| a.external_id.cmp(&b.external_id));

        for destination in vanished {
            let mut remaining = destination.connection_ids.clone();
            remaining.remove(&connection.id);
            batch.known_destinations.push(if remaining.is_empty() {
                KnownDestinationOperation::Delete {
                    id: destination.id.clone(),
                    external_id: destination.external_id.clone(),
                }
            } else {
                KnownDestinationOperation::Update(KnownDestinationUpdate {
                    id: destination.id.clone(),
                    label: destination.label.clone(),
                    asset_id: destination.asset_id.clone(),
                    connection_ids: remaining,
                    updated_at: now,
                })
            });
        }
        Ok(())
    }

    async fn diff_destination(
        &self,
        existing: Option<&KnownDestination>,
        connection: &ValidConnection,
        remote: AnchorageTrustedDestination,
        now: OffsetDateTime,
    ) -> Result<Option<KnownDestinationOperation>, CoreError> {
        let Some(crypto) = remote.crypto else {
            debug!(destination = %remote.id, kind = %remote.destination_type, "ignoring non-crypto destination");
            return Ok(None);
        };

        let Some(network) = self
            .networks
            .find_by_external_id(Provider::Anchorage, &crypto.network_id)
            .await?
        else {
            return Ok(Some(KnownDestinationOperation::Failed(FailedOperation {
                external_id: remote.id,
                message: format!("unknown anchorage network {}", crypto.network_id),
                context: json!({
                    "network_id": crypto.network_id,
                    "address": crypto.address,
                }),
            })));
        };

        let asset_id = match crypto.asset_type.as_deref() {
            Some(asset_type) => self
                .assets
                .find_by_external_id(Provider::Anchorage, asset_type)
                .await?
                .map(|a| a.id),
            None => None,
        };

        let Some(current) = existing else {
            return Ok(Some(KnownDestinationOperation::Create(KnownDestination {
                id: Uuid::new_v4().to_string(),
                client_id: connection.client_id.clone(),
                provider: Provider::Anchorage,
                external_id: remote.id,
                address: crypto.address,
                label: crypto.name,
                asset_id,
                network_id: network.id,
                connection_ids: BTreeSet::from([connection.id.clone()]),
                created_at: now,
                updated_at: now,
            })));
        };

        let mut connection_ids = current.connection_ids.clone();
        connection_ids.insert(connection.id.clone());
        if current.label == crypto.name
            && current.asset_id == asset_id
            && current.connection_ids == connection_ids
        {
            return Ok(None);
        }
        Ok(Some(KnownDestinationOperation::Update(
            KnownDestinationUpdate {
                id: current.id.clone(),
                label: crypto.name,
                asset_id,
                connection_ids,
                updated_at: now,
            },
        )))
    }
}

#[async_trait]
impl ReconciliationAdapter for AnchorageAdapter {
    fn provider(&self) -> Provider {
        Provider::Anchorage
    }

    async fn reconcile(
        &self,
        connection: &ValidConnection,
        requested_accounts: &[String],
    ) -> Result<OperationBatch, CoreError> {
        let now = OffsetDateTime::now_utc();
        let mut batch = OperationBatch::default();

        self.reconcile_custody(connection, requested_accounts, now, &mut batch)
            .await?;
        self.reconcile_destinations(connection, now, &mut batch)
            .await?;

        info!(
            connection.id = %connection.id,
            requested = requested_accounts.len(),
            wallets = batch.wallets.len(),
            accounts = batch.accounts.len(),
            addresses = batch.addresses.len(),
            known_destinations = batch.known_destinations.len(),
            "anchorage reconcile complete"
        );
        Ok(batch)
    }
}
