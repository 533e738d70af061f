mod cli;
mod config;
mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use eyre::{eyre, WrapErr};

use vaultlink_core::catalog::{AssetCatalog, NetworkCatalog};
use vaultlink_core::dispatch::{EventBus, EventKind};
use vaultlink_core::provider::anchorage::{AnchorageAdapter, AnchorageClient, HttpAnchorageClient};
use vaultlink_core::resolver::AssetResolver;
use vaultlink_core::store::{MemoryStore, Repositories};
use vaultlink_core::sync::{AdapterRegistry, ScopedSyncEngine, ScopedSyncHandler};
use vaultlink_core::{CatalogConfig, SyncLimits};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Generate a random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex_encode(bytes)
    };

    let store = Arc::new(MemoryStore::new());
    let catalog_config = CatalogConfig {
        cache_capacity: args.cache_capacity,
    };
    let networks = Arc::new(NetworkCatalog::new(store.clone(), catalog_config));
    let assets = Arc::new(AssetCatalog::new(store.clone(), catalog_config));

    match &args.seed {
        Some(path) => {
            let counts = config::Seed::load(path)
                .await?
                .apply(&networks, &assets, store.as_ref())
                .await?;
            tracing::info!(
                path = %path.display(),
                networks = counts.networks,
                assets = counts.assets,
                connections = counts.connections,
                "loaded seed file"
            );
        }
        None => tracing::warn!("no seed file given; catalog and connections start empty"),
    }

    // Indexes are built once; later catalog writes fall through to the store.
    let indexed_networks = networks.build_index().await.context("build network index")?;
    let indexed_assets = assets.build_index().await.context("build asset index")?;
    tracing::info!(
        networks = indexed_networks,
        assets = indexed_assets,
        "catalog indexes built"
    );

    let limits = SyncLimits {
        wallet_batch_size: args.wallet_batch_size.max(1),
        address_batch_size: args.address_batch_size.max(1),
    };
    let anchorage: Arc<dyn AnchorageClient> = Arc::new(
        HttpAnchorageClient::new(
            Some(args.anchorage_rate_limit),
            Duration::from_secs(args.http_timeout_secs),
        )
        .context("build Anchorage HTTP client")?,
    );

    let repos = Repositories::from_memory(store);
    let registry = AdapterRegistry::new().with(Arc::new(AnchorageAdapter::new(
        anchorage.clone(),
        networks.clone(),
        assets.clone(),
        repos.clone(),
        limits,
    )));
    tracing::info!(providers = ?registry.providers(), "reconciliation adapters registered");

    let events = EventBus::new();
    let engine = Arc::new(ScopedSyncEngine::new(registry, repos.clone(), events.clone()));
    events.subscribe(
        EventKind::ScopedSyncStarted,
        Arc::new(ScopedSyncHandler::new(engine.clone())),
    );

    let state = server::AppState {
        engine,
        repos,
        resolver: Arc::new(AssetResolver::new(networks.clone(), assets.clone())),
        networks,
        assets,
        anchorage: Some(anchorage),
        api_token: api_token.clone(),
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = HeaderValue::from_str(&format!("http://{bind_addr}"))
        .map_err(|e| eyre!("invalid bind address `{bind_addr}`: {e}"))?;
    let router = server::build_router(state, origin);

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is reachable from the network");
    }

    println!();
    println!("  Vaultlink is running:");
    println!("    URL:       http://{bind_addr}/api/v1");
    println!("    API token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    tracing::info!("server stopped");
    Ok(())
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
