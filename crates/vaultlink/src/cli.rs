use std::path::PathBuf;

use clap::Parser;

/// Vaultlink: custody provider integration broker with scoped reconciliation.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "127.0.0.1", env = "VAULTLINK_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "VAULTLINK_PORT")]
    pub port: u16,

    /// JSON seed file with networks, assets and connections to load at boot.
    #[arg(long, env = "VAULTLINK_SEED")]
    pub seed: Option<PathBuf>,

    /// Entries per catalog read-through cache.
    #[arg(long, default_value = "4096", env = "VAULTLINK_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Outbound Anchorage requests per second (0 disables limiting).
    #[arg(long, default_value = "10", env = "VAULTLINK_ANCHORAGE_RATE_LIMIT")]
    pub anchorage_rate_limit: u32,

    /// Wallet detail requests issued concurrently per batch.
    #[arg(long, default_value = "10", env = "VAULTLINK_WALLET_BATCH_SIZE")]
    pub wallet_batch_size: usize,

    /// Address listing requests issued concurrently per batch.
    #[arg(long, default_value = "5", env = "VAULTLINK_ADDRESS_BATCH_SIZE")]
    pub address_batch_size: usize,

    /// Timeout in seconds for each outbound provider request.
    #[arg(long, default_value = "30", env = "VAULTLINK_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,
}
