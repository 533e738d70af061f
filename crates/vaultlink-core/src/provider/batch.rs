use std::future::Future;

use futures::future::join_all;
use tracing::debug;

use crate::error::ProviderError;

/// Outcome of a batched per-key fetch.
#[derive(Debug)]
pub(crate) struct Settled<K, T> {
    pub found: Vec<(K, T)>,
    /// Keys the provider reported as not found.
    pub missing: Vec<K>,
}

/// Fetch `keys` in concurrent batches of at most `batch_size` requests.
///
/// Every request in a batch settles before the next batch starts. Not-found
/// responses are collected into [`Settled::missing`]; any other error aborts
/// the whole fetch once its batch has settled, and no further batches run.
pub(crate) async fn fetch_in_batches<K, T, F, Fut>(
    keys: Vec<K>,
    batch_size: usize,
    fetch: F,
) -> Result<Settled<K, T>, ProviderError>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let batch_size = batch_size.max(1);
    let mut settled = Settled {
        found: Vec::with_capacity(keys.len()),
        missing: Vec::new(),
    };

    for (batch_no, chunk) in keys.chunks(batch_size).enumerate() {
        debug!(batch = batch_no, size = chunk.len(), "fetching remote batch");
        let results = join_all(chunk.iter().cloned().map(&fetch)).await;

        let mut abort: Option<ProviderError> = None;
        for (key, result) in chunk.iter().cloned().zip(results) {
            match result {
                Ok(value) => settled.found.push((key, value)),
                Err(err) if err.is_not_found() => settled.missing.push(key),
                Err(err) => {
                    abort.get_or_insert(err);
                }
            }
        }
        if let Some(err) = abort {
            return Err(err);
        }
    }

    Ok(settled)
}
