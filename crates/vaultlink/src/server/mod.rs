mod auth;
mod catalog;
mod custody;
mod error;
mod sync;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use vaultlink_core::catalog::{AssetCatalog, NetworkCatalog};
use vaultlink_core::provider::anchorage::AnchorageClient;
use vaultlink_core::resolver::AssetResolver;
use vaultlink_core::store::Repositories;
use vaultlink_core::sync::ScopedSyncEngine;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub engine: Arc<ScopedSyncEngine>,
    pub repos: Repositories,
    pub networks: Arc<NetworkCatalog>,
    pub assets: Arc<AssetCatalog>,
    pub resolver: Arc<AssetResolver>,
    /// Used for live asset lookups; `None` disables the Anchorage fallback.
    pub anchorage: Option<Arc<dyn AnchorageClient>>,
    pub api_token: String,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, allowed_origin: HeaderValue) -> Router {
    // Reflect the origin only on an exact match; anything else gets no
    // CORS headers at all.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &HeaderValue, _| *request_origin == allowed_origin,
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new().route("/api/v1/health", get(health));

    let protected_api = Router::new()
        .route("/api/v1/networks", get(catalog::list_networks))
        .route("/api/v1/assets", get(catalog::list_assets))
        .route(
            "/api/v1/clients/{client_id}/sync",
            get(sync::list_sync_runs).post(sync::start_sync),
        )
        .route(
            "/api/v1/clients/{client_id}/sync/{run_id}",
            get(sync::get_sync_run),
        )
        .route(
            "/api/v1/clients/{client_id}/wallets/{wallet_id}/accounts",
            get(custody::list_wallet_accounts),
        )
        .route(
            "/api/v1/clients/{client_id}/accounts/{account_id}/addresses",
            get(custody::list_account_addresses),
        )
        .route(
            "/api/v1/clients/{client_id}/connections/{connection_id}/assets/resolve",
            post(catalog::resolve_asset),
        );

    Router::new()
        .merge(public_api)
        .merge(protected_api)
        .fallback(api_not_found)
        .layer(cors)
        .with_state(shared)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}
