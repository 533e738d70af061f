use std::future::Future;

use quick_cache::sync::Cache;

// ==============================================================================
// Read-Through Cache
// ==============================================================================

/// A bounded string-keyed cache with read-through loading.
///
/// Misses fall through to the supplied loader and only `Some` results are
/// stored, so an entity that does not exist yet is looked up again next
/// time. Writers never update entries in place: they [`delete`](Self::delete)
/// the affected keys and the next read repopulates from the store.
pub struct ReadThroughCache<V: Clone> {
    entries: Cache<String, V>,
}

impl<V: Clone> ReadThroughCache<V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity.max(1)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Return the cached value for `key`, or run `load` and cache its
    /// result when it yields a value.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, load: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        if let Some(hit) = self.entries.get(key) {
            tracing::trace!(cache.key = key, "cache hit");
            return Ok(Some(hit));
        }

        tracing::trace!(cache.key = key, "cache miss");
        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.entries.insert(key.to_owned(), value.clone());
        }
        Ok(loaded)
    }
}
