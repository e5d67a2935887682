//! Batched, deduplicating fan-out over the content fetcher.
//!
//! One call resolves a whole listing: each unique entry is fetched on its
//! own task, tasks are grouped into physical batches of at most
//! `batch_capacity`, and every batch is joined before the next starts.
//! Results land in a key -> result map guarded by a mutex and are read back
//! in the caller's order, so completion timing never affects the output.

use crate::content::{ContentError, ContentFetcher};
use crate::feed::render::ItemRenderer;
use crate::feed::types::FeedItem;
use crate::listing::{FetchKey, ListingEntry};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

pub const DEFAULT_BATCH_CAPACITY: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Why one key did not resolve to an item.
///
/// Cloneable so duplicate keys can share a single outcome.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Content fetch failed: {0}")]
    Fetch(Arc<ContentError>),
    #[error("Content fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The fetch task panicked or was aborted by the runtime
    #[error("Content fetch task failed: {0}")]
    Task(String),
    #[error("Content fetch cancelled")]
    Cancelled,
}

/// Outcome for one requested key.
pub type FetchResult = Result<FeedItem, LoadError>;

type ResultMap = Arc<Mutex<HashMap<FetchKey, FetchResult>>>;

/// Resolves listing entries into rendered feed items, concurrently.
pub struct ArticleLoader {
    fetcher: Arc<dyn ContentFetcher>,
    renderer: Arc<ItemRenderer>,
    batch_capacity: usize,
    fetch_timeout: Duration,
}

impl ArticleLoader {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, renderer: ItemRenderer) -> Self {
        Self {
            fetcher,
            renderer: Arc::new(renderer),
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Maximum number of unique keys fetched concurrently. Clamped to at least 1.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn renderer(&self) -> &ItemRenderer {
        &self.renderer
    }

    /// Resolves every entry. `output[i]` is the outcome for `entries[i]`.
    ///
    /// Each unique key is fetched at most once; repeated keys receive a clone
    /// of the same result. A failed, slow or panicking fetch only affects its
    /// own key.
    pub async fn load_many(&self, entries: &[ListingEntry]) -> Vec<FetchResult> {
        self.load_many_until(entries, std::future::pending()).await
    }

    /// Like [`load_many`](Self::load_many), but gives up when `cancelled`
    /// completes.
    ///
    /// In-flight fetches are aborted on cancellation. Keys that had already
    /// resolved keep their results; the rest get [`LoadError::Cancelled`].
    pub async fn load_many_until<C>(&self, entries: &[ListingEntry], cancelled: C) -> Vec<FetchResult>
    where
        C: Future<Output = ()>,
    {
        let unique = unique_entries(entries);
        let results: ResultMap = Arc::new(Mutex::new(HashMap::with_capacity(unique.len())));

        let run = async {
            for (index, batch) in unique.chunks(self.batch_capacity).enumerate() {
                tracing::trace!(batch = index, keys = batch.len(), "Starting fetch batch");
                self.run_batch(batch, &results).await;
            }
        };

        tokio::select! {
            () = run => {}
            () = cancelled => {
                tracing::debug!(keys = unique.len(), "Load cancelled, abandoning in-flight fetches");
            }
        }

        let resolved = results.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|entry| {
                resolved
                    .get(&entry.key())
                    .cloned()
                    .unwrap_or(Err(LoadError::Cancelled))
            })
            .collect()
    }

    /// Fetches one batch, returning only once every task has finished.
    ///
    /// The `JoinSet` aborts whatever is still running if this future is
    /// dropped, which is how cancellation reaches the tasks.
    async fn run_batch(&self, batch: &[&ListingEntry], results: &ResultMap) {
        let mut tasks = JoinSet::new();
        let mut keys_by_task = HashMap::with_capacity(batch.len());

        for entry in batch {
            let entry = (*entry).clone();
            let key = entry.key();
            let fetcher = Arc::clone(&self.fetcher);
            let renderer = Arc::clone(&self.renderer);
            let results = Arc::clone(results);
            let timeout = self.fetch_timeout;

            let handle = tasks.spawn(async move {
                let result = resolve(fetcher.as_ref(), &renderer, &entry, timeout).await;
                store(&results, entry.key(), result);
            });
            keys_by_task.insert(handle.id(), key);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let Err(err) = joined else { continue };
            if let Some(key) = keys_by_task.remove(&err.id()) {
                tracing::warn!(key = %key, error = %err, "Content fetch task failed");
                store(results, key, Err(LoadError::Task(err.to_string())));
            }
        }
    }
}

async fn resolve(
    fetcher: &dyn ContentFetcher,
    renderer: &ItemRenderer,
    entry: &ListingEntry,
    timeout: Duration,
) -> FetchResult {
    match tokio::time::timeout(timeout, fetcher.fetch(entry)).await {
        Ok(Ok(body)) => Ok(renderer.render(entry, body.as_deref())),
        Ok(Err(e)) => Err(LoadError::Fetch(Arc::new(e))),
        Err(_) => Err(LoadError::Timeout(timeout)),
    }
}

/// First write for a key wins.
fn store(results: &ResultMap, key: FetchKey, result: FetchResult) {
    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(result);
}

/// Unique entries in first-seen order.
fn unique_entries(entries: &[ListingEntry]) -> Vec<&ListingEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .filter(|entry| seen.insert(entry.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher driven by the entry id: `fail*` errors, `slow<ms>` sleeps,
    /// `panic*` panics, anything else returns `body of <id>`.
    #[derive(Default)]
    struct ScriptedFetcher {
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn calls_for(&self, id: &str) -> usize {
            self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl ContentFetcher for ScriptedFetcher {
        async fn fetch(&self, entry: &ListingEntry) -> Result<Option<String>, ContentError> {
            *self.calls.lock().unwrap().entry(entry.id.clone()).or_default() += 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(ms) = entry.id.strip_prefix("slow") {
                let ms: u64 = ms.parse().unwrap_or(100);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            } else {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if entry.id.starts_with("fail") {
                return Err(ContentError::HttpStatus(502));
            }
            if entry.id.starts_with("panic") {
                panic!("scripted panic");
            }
            Ok(Some(format!("body of {}", entry.id)))
        }
    }

    fn entries(ids: &[&str]) -> Vec<ListingEntry> {
        ids.iter()
            .map(|id| ListingEntry {
                id: id.to_string(),
                title: format!("title {id}"),
                author: "someone".into(),
                permalink: format!("/r/test/comments/{id}/"),
                url: format!("https://example.com/{id}"),
                ..Default::default()
            })
            .collect()
    }

    fn loader(fetcher: Arc<ScriptedFetcher>) -> ArticleLoader {
        ArticleLoader::new(fetcher, ItemRenderer::new("https://old.reddit.com", "https://m.example"))
    }

    fn ids(results: &[FetchResult]) -> Vec<String> {
        results
            .iter()
            .map(|r| match r {
                Ok(item) => item.id.clone(),
                Err(_) => "ERR".to_string(),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_follows_input_not_completion() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["slow300", "slow10", "slow200", "fast", "slow50"]);

        let results = loader(fetcher.clone()).load_many(&input).await;

        assert_eq!(ids(&results), vec!["slow300", "slow10", "slow200", "fast", "slow50"]);
        let first = results[0].as_ref().unwrap();
        assert!(first.content.starts_with("body of slow300"));
    }

    #[tokio::test]
    async fn test_duplicates_fetched_once_and_share_result() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["a", "b", "a", "c", "b", "a"]);

        let results = loader(fetcher.clone()).load_many(&input).await;

        assert_eq!(results.len(), input.len());
        assert_eq!(fetcher.calls_for("a"), 1);
        assert_eq!(fetcher.calls_for("b"), 1);
        assert_eq!(fetcher.calls_for("c"), 1);
        assert_eq!(results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
        assert_eq!(results[0].as_ref().unwrap(), results[5].as_ref().unwrap());
        assert_eq!(results[1].as_ref().unwrap(), results[4].as_ref().unwrap());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["a", "fail_b", "c"]);

        let results = loader(fetcher).load_many(&input).await;

        assert_eq!(results[0].as_ref().unwrap().id, "a");
        assert!(matches!(&results[1], Err(LoadError::Fetch(e)) if matches!(**e, ContentError::HttpStatus(502))));
        assert_eq!(results[2].as_ref().unwrap().id, "c");
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["a", "panic_b", "c", "panic_b"]);

        let results = loader(fetcher).load_many(&input).await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LoadError::Task(_))));
        assert!(results[2].is_ok());
        assert!(matches!(results[3], Err(LoadError::Task(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out_alone() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["slow60000", "a"]);

        let results = loader(fetcher)
            .with_fetch_timeout(Duration::from_secs(5))
            .load_many(&input)
            .await;

        assert!(matches!(results[0], Err(LoadError::Timeout(d)) if d == Duration::from_secs(5)));
        assert!(results[1].is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_capacity_bounds_concurrency() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let ids_in: Vec<String> = (0..7).map(|i| format!("slow{}", 10 + i)).collect();
        let refs: Vec<&str> = ids_in.iter().map(String::as_str).collect();
        let input = entries(&refs);

        let results = loader(fetcher.clone())
            .with_batch_capacity(3)
            .load_many(&input)
            .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(fetcher.total_calls(), 7);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_resolved_results() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let input = entries(&["fast", "slow10000", "fast"]);

        let results = loader(fetcher)
            .load_many_until(&input, tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LoadError::Cancelled)));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let results = loader(fetcher.clone()).load_many(&[]).await;
        assert!(results.is_empty());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        assert_eq!(loader(fetcher).with_batch_capacity(0).batch_capacity, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_one_fetch_per_unique_key(keys in proptest::collection::vec("[a-e]|fail[xy]", 0..24)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let fetcher = Arc::new(ScriptedFetcher::default());
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let input = entries(&refs);

            let results = runtime.block_on(loader(fetcher.clone()).with_batch_capacity(4).load_many(&input));

            prop_assert_eq!(results.len(), input.len());
            let unique: HashSet<&str> = refs.iter().copied().collect();
            for id in &unique {
                prop_assert_eq!(fetcher.calls_for(id), 1);
            }
            prop_assert_eq!(fetcher.total_calls(), unique.len());
            for (entry, result) in input.iter().zip(&results) {
                match result {
                    Ok(item) => prop_assert_eq!(&item.id, &entry.id),
                    Err(_) => prop_assert!(entry.id.starts_with("fail")),
                }
            }
        }
    }
}
