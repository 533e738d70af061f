//! Network and asset reference catalog.
//!
//! Each catalog builds its in-memory indexes once, at boot, in a single pass
//! over the store. Reads hit the index first; on an index miss they go
//! through a [`ReadThroughCache`](crate::cache::ReadThroughCache) to the
//! store. Entities written after boot are therefore visible through the
//! store fallback but not through the index until the next rebuild.
//!
//! Writes never touch the index. They delete the affected cache keys so the
//! following read repopulates from the store.

mod asset;
mod network;

pub use asset::AssetCatalog;
pub use network::NetworkCatalog;

use std::sync::{PoisonError, RwLock};

use crate::types::Provider;

const LIST_ALL: &str = "all";

fn list_key(prefix: &str, provider: Option<Provider>) -> String {
    match provider {
        Some(p) => format!("{prefix}:list:{p}"),
        None => format!("{prefix}:list:{LIST_ALL}"),
    }
}

/// Read a lock-guarded snapshot, tolerating poisoning: the guarded value is
/// only ever replaced wholesale, so a panicking writer cannot leave it torn.
fn read_snapshot<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace_snapshot<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}
