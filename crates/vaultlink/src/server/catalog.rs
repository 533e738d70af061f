use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use vaultlink_core::provider::anchorage::AnchorageAssetFallback;
use vaultlink_core::resolver::{AssetFallback, AssetReference, NoFallback, ResolvedAsset};
use vaultlink_core::types::{Asset, Network, Provider};

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProviderQuery {
    provider: Option<Provider>,
}

#[derive(Serialize)]
pub(super) struct NetworksResponse {
    networks: Vec<Network>,
}

#[derive(Serialize)]
pub(super) struct AssetsResponse {
    assets: Vec<Asset>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn list_networks(
    State(state): State<SharedState>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
) -> Result<Json<NetworksResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let networks = state.networks.find_all(query.provider).await?;
    Ok(Json(NetworksResponse { networks }))
}

pub(super) async fn list_assets(
    State(state): State<SharedState>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
) -> Result<Json<AssetsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let assets = state.assets.find_all(query.provider).await?;
    Ok(Json(AssetsResponse { assets }))
}

/// Resolve an asset reference for the provider behind one connection. For
/// Anchorage connections, assets missing from the catalog are looked up live.
pub(super) async fn resolve_asset(
    State(state): State<SharedState>,
    Path((client_id, connection_id)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<AssetReference>, JsonRejection>,
) -> Result<Json<ResolvedAsset>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(reference) = payload?;

    let connection = state
        .engine
        .find_connection(&client_id, &connection_id)
        .await?
        .validate()?;
    let provider = connection.provider;

    let fallback: Box<dyn AssetFallback> = match (&state.anchorage, provider) {
        (Some(client), Provider::Anchorage) => Box::new(AnchorageAssetFallback::new(
            client.clone(),
            state.networks.clone(),
            connection,
        )),
        _ => Box::new(NoFallback),
    };

    let resolved = state
        .resolver
        .resolve(&reference, provider, fallback.as_ref())
        .await?;
    Ok(Json(resolved))
}
