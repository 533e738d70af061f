use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use vaultlink_core::store::SyncRunFilter;
use vaultlink_core::sync::{StartedSync, SyncRun};

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub(super) struct StartSyncRequest {
    /// Connections to sync. Empty means every connection of the client.
    #[serde(default)]
    connection_ids: Vec<String>,
    /// External account ids to restrict each run to. Empty means full sync.
    #[serde(default)]
    account_ids: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct SyncRunsResponse {
    runs: Vec<SyncRun>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn start_sync(
    State(state): State<SharedState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<StartSyncRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartedSync>), AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(request) = payload?;

    let connections = state
        .engine
        .find_connections(&client_id, &request.connection_ids)
        .await?;
    let started = state
        .engine
        .start(&connections, request.account_ids)
        .await?;

    let status = if started.started {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(started)))
}

pub(super) async fn list_sync_runs(
    State(state): State<SharedState>,
    Path(client_id): Path<String>,
    Query(filter): Query<SyncRunFilter>,
    headers: HeaderMap,
) -> Result<Json<SyncRunsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let runs = state.engine.find_all(&client_id, &filter).await?;
    Ok(Json(SyncRunsResponse { runs }))
}

pub(super) async fn get_sync_run(
    State(state): State<SharedState>,
    Path((client_id, run_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<SyncRun>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.engine.find_by_id(&client_id, &run_id).await?))
}
