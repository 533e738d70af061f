use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::connection::Connection;
use crate::dispatch::{BrokerEvent, EventBus};
use crate::error::CoreError;
use crate::store::{Repositories, SyncRunFilter};

use super::adapter::AdapterRegistry;
use super::operation::{
    partition, partition_destinations, OperationBatch, OperationLog, OperationRecord,
    OperationStatus,
};
use super::run::{SyncRun, SyncRunError};

/// Result of [`ScopedSyncEngine::start`].
#[derive(Debug, Clone, Serialize)]
pub struct StartedSync {
    pub started: bool,
    pub runs: Vec<SyncRun>,
}

/// Drives scoped sync runs from `processing` to a terminal state.
///
/// Runs for one connection are serialized behind a per-connection async
/// mutex, so each run diffs against the store as the previous one left it.
pub struct ScopedSyncEngine {
    registry: AdapterRegistry,
    repos: Repositories,
    events: EventBus,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ScopedSyncEngine {
    pub fn new(registry: AdapterRegistry, repos: Repositories, events: EventBus) -> Self {
        Self {
            registry,
            repos,
            events,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist one `processing` run per connection and publish a start event
    /// for each. Returns without waiting for any reconciliation.
    pub async fn start(
        &self,
        connections: &[Connection],
        requested_accounts: Vec<String>,
    ) -> Result<StartedSync, CoreError> {
        let mut runs = Vec::with_capacity(connections.len());
        for connection in connections {
            let run = self
                .repos
                .sync_runs
                .create(SyncRun::processing(
                    connection.client_id.clone(),
                    connection.id.clone(),
                    requested_accounts.clone(),
                ))
                .await?;
            info!(
                run.id = %run.id,
                connection.id = %connection.id,
                provider = %connection.provider,
                requested = run.requested_accounts.len(),
                "scoped sync started"
            );
            self.events.publish(BrokerEvent::ScopedSyncStarted {
                run_id: run.id.clone(),
                client_id: run.client_id.clone(),
                connection_id: run.connection_id.clone(),
            });
            runs.push(run);
        }

        Ok(StartedSync {
            started: !runs.is_empty(),
            runs,
        })
    }

    /// Reconcile one run. Adapter and connection failures land on the run
    /// as `failed`; only store failures while recording the outcome are
    /// returned as errors.
    pub async fn run(&self, run: SyncRun, connection: &Connection) -> Result<SyncRun, CoreError> {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "scoped_sync",
            run.id = %run.id,
            connection.id = %connection.id,
            provider = %connection.provider,
            trace_id = %trace_id,
        );

        self.run_locked(run, connection, trace_id)
            .instrument(span)
            .await
    }

    async fn run_locked(
        &self,
        run: SyncRun,
        connection: &Connection,
        trace_id: String,
    ) -> Result<SyncRun, CoreError> {
        let lock = self.connection_lock(&connection.id);
        let _guard = lock.lock().await;

        // A redelivered event may find the run already finished.
        let current = self
            .repos
            .sync_runs
            .find_by_id(&run.client_id, &run.id)
            .await?
            .unwrap_or(run);
        if current.status.is_terminal() {
            debug!(status = %current.status, "run already finished; ignoring");
            return Ok(current);
        }

        match self.reconcile(&current, connection).await {
            Ok(batch) => self.execute_traced(current, batch, trace_id).await,
            Err(err) => self.fail_traced(current, &err, Some(trace_id)).await,
        }
    }

    async fn reconcile(
        &self,
        run: &SyncRun,
        connection: &Connection,
    ) -> Result<OperationBatch, CoreError> {
        let valid = connection.validate()?;
        let adapter = self.registry.get(valid.provider)?;
        adapter.reconcile(&valid, &run.requested_accounts).await
    }

    /// Apply an operation batch and move the run to its terminal state.
    pub async fn execute(&self, run: SyncRun, batch: OperationBatch) -> Result<SyncRun, CoreError> {
        self.execute_traced(run, batch, Uuid::new_v4().to_string())
            .await
    }

    /// Mark a run failed without reconciling it.
    pub async fn fail(&self, run: SyncRun, err: &CoreError) -> Result<SyncRun, CoreError> {
        self.fail_traced(run, err, None).await
    }

    pub async fn find_all(
        &self,
        client_id: &str,
        filter: &SyncRunFilter,
    ) -> Result<Vec<SyncRun>, CoreError> {
        self.repos.sync_runs.find_all(client_id, filter).await
    }

    pub async fn find_by_id(&self, client_id: &str, id: &str) -> Result<SyncRun, CoreError> {
        self.repos
            .sync_runs
            .find_by_id(client_id, id)
            .await?
            .ok_or_else(|| CoreError::not_found("sync run", id))
    }

    pub async fn find_connection(
        &self,
        client_id: &str,
        connection_id: &str,
    ) -> Result<Connection, CoreError> {
        self.repos
            .connections
            .find_by_id(client_id, connection_id)
            .await?
            .ok_or_else(|| CoreError::not_found("connection", connection_id))
    }

    /// The client's connections with the given ids, or all of them when
    /// `ids` is empty. Any unknown id is an error.
    pub async fn find_connections(
        &self,
        client_id: &str,
        ids: &[String],
    ) -> Result<Vec<Connection>, CoreError> {
        if ids.is_empty() {
            return self.repos.connections.find_all_by_client(client_id).await;
        }
        let mut connections = Vec::with_capacity(ids.len());
        for id in ids {
            connections.push(self.find_connection(client_id, id).await?);
        }
        Ok(connections)
    }

    fn connection_lock(&self, connection_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(connection_id.to_owned())
            .or_default()
            .clone()
    }

    async fn execute_traced(
        &self,
        mut run: SyncRun,
        batch: OperationBatch,
        trace_id: String,
    ) -> Result<SyncRun, CoreError> {
        let planned = OperationLog::from_batch(&batch);
        let failed = planned.count(OperationStatus::Failed);
        if failed > 0 {
            warn!(run.id = %run.id, failed, "records could not be mapped");
        }
        for record in planned_failures(&planned) {
            debug!(
                run.id = %run.id,
                external_id = record.external_id.as_deref().unwrap_or_default(),
                message = record.message.as_deref().unwrap_or_default(),
                context = %record.context,
                "unmapped record"
            );
        }

        let mut applied = OperationLog::default();
        match self.apply(batch, planned, &mut applied).await {
            Ok(()) => {
                run.succeed(applied)?;
                info!(
                    run.id = %run.id,
                    created = run.operations.count(OperationStatus::Create),
                    updated = run.operations.count(OperationStatus::Update),
                    deleted = run.operations.count(OperationStatus::Delete),
                    skipped = run.operations.count(OperationStatus::Skip),
                    failed,
                    "scoped sync succeeded"
                );
                self.repos.sync_runs.update(run).await
            }
            Err(err) => {
                // Kinds written before the failure stay written.
                run.operations = applied;
                self.fail_traced(run, &err, Some(trace_id)).await
            }
        }
    }

    /// Writes kinds in dependency order. A record moves from `planned` into
    /// `applied` as soon as the write carrying it succeeds; skips and
    /// failures are moved up front since they write nothing.
    async fn apply(
        &self,
        batch: OperationBatch,
        mut planned: OperationLog,
        applied: &mut OperationLog,
    ) -> Result<(), CoreError> {
        use OperationStatus::{Create, Delete, Failed, Skip, Update};

        let wallets = partition(batch.wallets);
        let (from, to) = (&mut planned.wallets, &mut applied.wallets);
        move_records(from, to, &[Skip, Failed]);
        if !wallets.creates.is_empty() {
            self.repos.wallets.bulk_create(wallets.creates).await?;
        }
        move_records(from, to, &[Create]);
        if !wallets.updates.is_empty() {
            self.repos.wallets.bulk_update(wallets.updates).await?;
        }
        move_records(from, to, &[Update]);

        let accounts = partition(batch.accounts);
        let (from, to) = (&mut planned.accounts, &mut applied.accounts);
        move_records(from, to, &[Skip, Failed]);
        if !accounts.creates.is_empty() {
            self.repos.accounts.bulk_create(accounts.creates).await?;
        }
        move_records(from, to, &[Create]);
        if !accounts.updates.is_empty() {
            self.repos.accounts.bulk_update(accounts.updates).await?;
        }
        move_records(from, to, &[Update]);

        let addresses = partition(batch.addresses);
        let (from, to) = (&mut planned.addresses, &mut applied.addresses);
        move_records(from, to, &[Skip, Failed]);
        if !addresses.creates.is_empty() {
            self.repos.addresses.bulk_create(addresses.creates).await?;
        }
        move_records(from, to, &[Create]);

        let destinations = partition_destinations(batch.known_destinations);
        let (from, to) = (
            &mut planned.known_destinations,
            &mut applied.known_destinations,
        );
        move_records(from, to, &[Failed]);
        if !destinations.creates.is_empty() {
            self.repos
                .known_destinations
                .bulk_create(destinations.creates)
                .await?;
        }
        move_records(from, to, &[Create]);
        if !destinations.updates.is_empty() {
            self.repos
                .known_destinations
                .bulk_update(destinations.updates)
                .await?;
        }
        move_records(from, to, &[Update]);
        if !destinations.deletes.is_empty() {
            self.repos
                .known_destinations
                .bulk_delete(destinations.deletes)
                .await?;
        }
        move_records(from, to, &[Delete]);
        Ok(())
    }

    async fn fail_traced(
        &self,
        mut run: SyncRun,
        err: &CoreError,
        trace_id: Option<String>,
    ) -> Result<SyncRun, CoreError> {
        warn!(run.id = %run.id, error = %err, kind = err.name(), "scoped sync failed");
        run.fail(SyncRunError::from_core(err, trace_id))?;
        self.repos.sync_runs.update(run).await
    }
}

fn planned_failures(log: &OperationLog) -> impl Iterator<Item = &OperationRecord> {
    log.wallets
        .iter()
        .chain(&log.accounts)
        .chain(&log.addresses)
        .chain(&log.known_destinations)
        .filter(|r| r.status == OperationStatus::Failed)
}

/// Move the records with one of `statuses` from `from` to `to`, keeping
/// their order.
fn move_records(
    from: &mut Vec<OperationRecord>,
    to: &mut Vec<OperationRecord>,
    statuses: &[OperationStatus],
) {
    let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(from)
        .into_iter()
        .partition(|r| statuses.contains(&r.status));
    *from = kept;
    to.extend(moved);
}
