//! Bounded-concurrency fan-out over independent fetches.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{CrawlError, CrawlResult};

/// Run `f` for every item with at most `limit` calls in flight.
///
/// Results come back in input order, paired with their item, regardless of
/// completion order. Per-item failures are returned, not propagated; only a
/// panicked task fails the whole fan-out.
///
/// With `stop_on_error`, the first failed item halts the fan-out: no further
/// items are started and tasks still in flight are cancelled. The returned
/// results then cover only the items that completed.
pub async fn fan_out<K, V, F, Fut>(
    items: Vec<K>,
    limit: usize,
    stop_on_error: bool,
    f: F,
) -> CrawlResult<Vec<(K, CrawlResult<V>)>>
where
    K: Clone + Send + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = CrawlResult<V>> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let halted = Arc::new(AtomicBool::new(false));
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        if halted.load(Ordering::SeqCst) {
            break;
        }
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CrawlError::Task {
                message: e.to_string(),
            })?;
        // A task may have failed while we waited for the permit.
        if halted.load(Ordering::SeqCst) {
            break;
        }
        let fut = f(item.clone());
        let halted = halted.clone();
        join_set.spawn(async move {
            let _permit = permit;
            let result = fut.await;
            if stop_on_error && result.is_err() {
                halted.store(true, Ordering::SeqCst);
            }
            (index, item, result)
        });
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(entry) => {
                if stop_on_error && entry.2.is_err() {
                    join_set.abort_all();
                }
                results.push(entry);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                join_set.abort_all();
                return Err(CrawlError::Task {
                    message: e.to_string(),
                });
            }
        }
    }

    results.sort_by_key(|(index, _, _)| *index);
    Ok(results
        .into_iter()
        .map(|(_, item, result)| (item, result))
        .collect())
}
