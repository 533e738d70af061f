pub mod cache;
pub mod catalog;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod types;

#[cfg(test)]
mod test_util;

pub use error::{CoreError, ProviderError};
pub use types::{CatalogConfig, Provider, SyncLimits};
