use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use vaultlink_core::catalog::{AssetCatalog, NetworkCatalog};
use vaultlink_core::connection::{
    Connection, ConnectionCredentials, ConnectionStatus, ValidConnection,
};
use vaultlink_core::dispatch::{EventBus, EventKind};
use vaultlink_core::provider::anchorage::{
    AnchorageAdapter, AnchorageAssetType, AnchorageClient, AnchorageDepositAddress,
    AnchorageTrustedDestination, AnchorageVault, AnchorageWallet,
};
use vaultlink_core::store::{
    AccountRepository, ConnectionRepository, MemoryStore, NetworkRepository, Repositories,
    WalletRepository,
};
use vaultlink_core::sync::operation::OperationStatus;
use vaultlink_core::sync::{
    AdapterRegistry, ScopedSyncEngine, ScopedSyncHandler, SyncRun, SyncStatus,
};
use vaultlink_core::types::{CatalogConfig, ExternalNetwork, Network, Provider, SyncLimits};
use vaultlink_core::ProviderError;

const CLIENT_ID: &str = "client-1";

// ==============================================================================
// Fake Anchorage
// ==============================================================================

struct FakeAnchorage {
    wallets: Vec<AnchorageWallet>,
    unavailable: AtomicBool,
}

impl FakeAnchorage {
    fn treasury() -> Self {
        let wallet = |id: &str, address: &str| AnchorageWallet {
            wallet_id: id.into(),
            wallet_name: format!("Treasury {id}"),
            vault_id: "vault-1".into(),
            vault_name: Some("Treasury".into()),
            network_id: "BTC".into(),
            deposit_address: Some(AnchorageDepositAddress {
                address: address.into(),
                address_id: format!("addr-{id}"),
            }),
        };
        Self {
            wallets: vec![wallet("W1", "bc1qone"), wallet("W2", "bc1qtwo")],
            unavailable: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 503,
                message: "maintenance".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnchorageClient for FakeAnchorage {
    async fn get_vaults(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageVault>, ProviderError> {
        self.check()?;
        Ok(vec![AnchorageVault {
            vault_id: "vault-1".into(),
            name: "Treasury".into(),
            description: None,
        }])
    }

    async fn get_wallets(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageWallet>, ProviderError> {
        self.check()?;
        Ok(self.wallets.clone())
    }

    async fn get_wallet(
        &self,
        _connection: &ValidConnection,
        wallet_id: &str,
    ) -> Result<AnchorageWallet, ProviderError> {
        self.check()?;
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
        self.check()?;
        Ok(Vec::new())
    }

    async fn get_asset_types(
        &self,
        _connection: &ValidConnection,
    ) -> Result<Vec<AnchorageAssetType>, ProviderError> {
        Ok(Vec::new())
    }
}

// ==============================================================================
// Harness
// ==============================================================================

struct Harness {
    store: Arc<MemoryStore>,
    engine: Arc<ScopedSyncEngine>,
    client: Arc<FakeAnchorage>,
}

fn connection(status: ConnectionStatus) -> Connection {
    Connection {
        id: "conn-1".into(),
        client_id: CLIENT_ID.into(),
        provider: Provider::Anchorage,
        status,
        url: Some("https://api.anchorage.test".into()),
        credentials: Some(ConnectionCredentials {
            api_key: "key".into(),
            private_key: None,
        }),
    }
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    NetworkRepository::create(
        store.as_ref(),
        Network {
            id: "BITCOIN".into(),
            coin_type: Some(0),
            name: "Bitcoin".into(),
            external_networks: vec![ExternalNetwork {
                provider: Provider::Anchorage,
                external_id: "BTC".into(),
            }],
            created_at: OffsetDateTime::now_utc(),
        },
    )
    .await
    .expect("seed network");

    let networks = Arc::new(NetworkCatalog::new(store.clone(), CatalogConfig::default()));
    let assets = Arc::new(AssetCatalog::new(store.clone(), CatalogConfig::default()));
    networks.build_index().await.expect("network index");
    assets.build_index().await.expect("asset index");

    let repos = Repositories::from_memory(store.clone());
    let client = Arc::new(FakeAnchorage::treasury());
    let registry = AdapterRegistry::new().with(Arc::new(AnchorageAdapter::new(
        client.clone(),
        networks,
        assets,
        repos.clone(),
        SyncLimits::default(),
    )));

    let events = EventBus::new();
    let engine = Arc::new(ScopedSyncEngine::new(registry, repos, events.clone()));
    events.subscribe(
        EventKind::ScopedSyncStarted,
        Arc::new(ScopedSyncHandler::new(engine.clone())),
    );

    Harness {
        store,
        engine,
        client,
    }
}

impl Harness {
    async fn start(&self, connection: Connection, scope: &[&str]) -> SyncRun {
        ConnectionRepository::save(self.store.as_ref(), connection.clone())
            .await
            .expect("save connection");
        let started = self
            .engine
            .start(
                &[connection],
                scope.iter().map(|s| (*s).to_owned()).collect(),
            )
            .await
            .expect("start sync");
        assert!(started.started);
        assert_eq!(started.runs[0].status, SyncStatus::Processing);
        started.runs.into_iter().next().expect("one run per connection")
    }

    /// Poll the persisted record until the background handler finishes it.
    async fn wait_terminal(&self, run: &SyncRun) -> SyncRun {
        for _ in 0..200 {
            let current = self
                .engine
                .find_by_id(CLIENT_ID, &run.id)
                .await
                .expect("run is persisted");
            if current.status.is_terminal() {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} never left processing", run.id);
    }
}

// ==============================================================================
// Scenarios
// ==============================================================================

#[tokio::test]
async fn full_sync_builds_hierarchy_and_rerun_is_quiet() {
    let h = harness().await;

    let first = h.start(connection(ConnectionStatus::Active), &[]).await;
    let first = h.wait_terminal(&first).await;
    assert_eq!(first.status, SyncStatus::Success, "error: {:?}", first.error);
    assert!(first.completed_at.is_some());
    assert_eq!(first.operations.count(OperationStatus::Create), 5);

    let wallets = WalletRepository::find_all_by_scope(h.store.as_ref(), CLIENT_ID, "conn-1")
        .await
        .unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].label.as_deref(), Some("Treasury"));
    let accounts = AccountRepository::find_by_wallet(h.store.as_ref(), CLIENT_ID, &wallets[0].id)
        .await
        .unwrap();
    assert_eq!(accounts.len(), 2);

    let second = h.start(connection(ConnectionStatus::Active), &[]).await;
    let second = h.wait_terminal(&second).await;
    assert_eq!(second.status, SyncStatus::Success);
    assert_eq!(second.operations.count(OperationStatus::Create), 0);
    assert_eq!(second.operations.count(OperationStatus::Update), 0);
}

#[tokio::test]
async fn scoped_sync_skips_unknown_wallet() {
    let h = harness().await;

    let run = h.start(connection(ConnectionStatus::Active), &["W1", "W9"]).await;
    let run = h.wait_terminal(&run).await;

    assert_eq!(run.status, SyncStatus::Success);
    assert_eq!(run.requested_accounts, vec!["W1", "W9"]);
    assert_eq!(run.operations.count(OperationStatus::Skip), 1);
    let skipped = run
        .operations
        .accounts
        .iter()
        .find(|r| r.status == OperationStatus::Skip)
        .expect("skip recorded");
    assert_eq!(skipped.external_id.as_deref(), Some("W9"));

    let accounts = AccountRepository::find_all_by_scope(h.store.as_ref(), CLIENT_ID, "conn-1")
        .await
        .unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].external_id, "W1");
}

#[tokio::test]
async fn provider_outage_fails_run_without_writes() {
    let h = harness().await;
    h.client.unavailable.store(true, Ordering::SeqCst);

    let run = h.start(connection(ConnectionStatus::Active), &[]).await;
    let run = h.wait_terminal(&run).await;

    assert_eq!(run.status, SyncStatus::Failed);
    let error = run.error.expect("failed run carries an error");
    assert_eq!(error.name, "ProviderError");
    assert!(error.trace_id.is_some());
    assert!(WalletRepository::find_all_by_scope(h.store.as_ref(), CLIENT_ID, "conn-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn revoked_connection_fails_before_remote_calls() {
    let h = harness().await;

    let run = h.start(connection(ConnectionStatus::Revoked), &[]).await;
    let run = h.wait_terminal(&run).await;

    assert_eq!(run.status, SyncStatus::Failed);
    assert_eq!(
        run.error.map(|e| e.name).as_deref(),
        Some("ConnectionInvalid")
    );
}
