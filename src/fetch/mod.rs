//! Upstream fetch subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler (cache miss)
//!     → Upstream::fetch(key)
//!         → inflight.rs (lead a new fetch, or follow a running one)
//!         → pool.rs (leader's fetch task spawned on the fetch runtime)
//!             → client.rs (GET, no redirects, fully buffered body)
//!             → success: Cache::insert, then publish
//!             → error:   publish only
//!     ← handler resumes with the published outcome
//! ```
//!
//! # Design Decisions
//! - The handler awaits a watch channel; no thread blocks on the upstream
//! - Cache insertion happens before publication, so anyone resumed by this
//!   fetch (or arriving later) sees the entry
//! - Every fetch runs under a deadline; an inbound disconnect of the last
//!   waiter abandons the fetch

pub mod client;
pub mod inflight;
pub mod pool;

#[cfg(test)]
pub(crate) mod stub;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::cache::{Cache, CacheEntry, CacheKey, HeaderList};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

pub use client::HttpFetcher;
pub use inflight::{Inflight, Join, Publisher, Waiter};
pub use pool::FetchPool;

/// One completed upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A cacheable response (status below 400).
    Success(CacheEntry),
    /// Upstream error status or transport failure. Never cached.
    Error(ErrorResponse),
}

impl FetchOutcome {
    fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::Error(_) => "error",
        }
    }
}

/// Status, headers and a textual body describing a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub headers: HeaderList,
    pub message: String,
}

/// Failures that happen before a complete upstream response exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("upstream fetch was abandoned")]
    Abandoned,
}

impl FetchError {
    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FetchError::Transport(_) | FetchError::BodyTooLarge { .. } | FetchError::Abandoned => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl From<FetchError> for FetchOutcome {
    fn from(err: FetchError) -> Self {
        FetchOutcome::Error(ErrorResponse {
            status: err.status(),
            headers: HeaderList::new(),
            message: err.to_string(),
        })
    }
}

/// Asynchronous GET of a single URL.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> FetchOutcome;
}

/// Dispatches fetches onto the pool and suspends callers until they finish.
pub struct Upstream {
    fetcher: Arc<dyn Fetcher>,
    pool: FetchPool,
    cache: Arc<Cache>,
    inflight: Inflight<CacheKey, FetchOutcome>,
    deadline: Duration,
}

impl Upstream {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        pool: FetchPool,
        cache: Arc<Cache>,
        deadline: Duration,
        coalesce: bool,
    ) -> Self {
        Self {
            fetcher,
            pool,
            cache,
            inflight: Inflight::new(coalesce),
            deadline,
        }
    }

    /// Fetch `key`, suspending until the outcome is available.
    ///
    /// Successful outcomes are already in the cache when this returns.
    pub async fn fetch(&self, key: &CacheKey) -> FetchOutcome {
        let waiter = match self.inflight.join(key.clone()) {
            Join::Leader(publisher, waiter) => {
                self.dispatch(publisher);
                waiter
            }
            Join::Follower(waiter) => {
                tracing::debug!(url = %key, "Joining in-flight fetch");
                metrics::record_inflight_joined();
                waiter
            }
        };

        waiter
            .wait()
            .await
            .unwrap_or_else(|| FetchOutcome::from(FetchError::Abandoned))
    }

    /// Keys with a fetch outstanding.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    fn dispatch(&self, publisher: Publisher<CacheKey, FetchOutcome>) {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let deadline = self.deadline;

        self.pool.spawn(async move {
            let key = publisher.key().clone();
            let start = Instant::now();

            let outcome = tokio::select! {
                _ = publisher.closed() => {
                    tracing::debug!(url = %key, "Every waiter disconnected; abandoning fetch");
                    metrics::record_upstream_fetch("abandoned", start);
                    return;
                }
                result = with_deadline(deadline, fetcher.fetch(key.url())) => match result {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(url = %key, error = %e, "Upstream fetch timed out");
                        FetchOutcome::from(FetchError::Timeout(e.0))
                    }
                },
            };

            metrics::record_upstream_fetch(outcome.label(), start);
            match &outcome {
                FetchOutcome::Success(entry) => {
                    tracing::debug!(url = %key, status = entry.status.as_u16(), elapsed = ?start.elapsed(), "Upstream fetch complete");
                    cache.insert(key, entry.clone());
                }
                FetchOutcome::Error(err) => {
                    tracing::info!(url = %key, status = err.status.as_u16(), "Upstream returned an error; not caching");
                }
            }
            publisher.publish(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubFetcher;
    use super::*;
    use bytes::Bytes;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(Url::parse(s).unwrap())
    }

    fn upstream(fetcher: Arc<StubFetcher>, cache: Arc<Cache>, coalesce: bool) -> Upstream {
        Upstream::new(
            fetcher,
            FetchPool::new(2).unwrap(),
            cache,
            Duration::from_secs(5),
            coalesce,
        )
    }

    #[tokio::test]
    async fn success_is_cached_before_resumption() {
        let fetcher = Arc::new(StubFetcher::ok("hello"));
        let cache = Arc::new(Cache::new());
        let upstream = upstream(fetcher.clone(), cache.clone(), true);
        let k = key("http://example.test/a");

        let outcome = upstream.fetch(&k).await;
        let FetchOutcome::Success(entry) = outcome else {
            panic!("expected success");
        };
        assert_eq!(entry.body, Bytes::from_static(b"hello"));
        assert_eq!(cache.lookup(&k), Some(entry));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(upstream.inflight_len(), 0);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let fetcher = Arc::new(StubFetcher::status(StatusCode::SERVICE_UNAVAILABLE, "down"));
        let cache = Arc::new(Cache::new());
        let upstream = upstream(fetcher, cache.clone(), true);
        let k = key("http://example.test/down");

        match upstream.fetch(&k).await {
            FetchOutcome::Error(e) => assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE),
            FetchOutcome::Success(_) => panic!("503 must be an error"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn slow_fetches_time_out_with_504() {
        let fetcher = Arc::new(StubFetcher::ok("late").with_delay(Duration::from_secs(5)));
        let cache = Arc::new(Cache::new());
        let upstream = Upstream::new(
            fetcher,
            FetchPool::new(1).unwrap(),
            cache.clone(),
            Duration::from_millis(50),
            true,
        );

        match upstream.fetch(&key("http://example.test/slow")).await {
            FetchOutcome::Error(e) => assert_eq!(e.status, StatusCode::GATEWAY_TIMEOUT),
            FetchOutcome::Success(_) => panic!("fetch should have timed out"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher::ok("shared").with_delay(Duration::from_millis(100)));
        let cache = Arc::new(Cache::new());
        let upstream = Arc::new(upstream(fetcher.clone(), cache, true));
        let k = key("http://example.test/shared");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let upstream = Arc::clone(&upstream);
                let k = k.clone();
                tokio::spawn(async move { upstream.fetch(&k).await })
            })
            .collect();

        for task in tasks {
            let FetchOutcome::Success(entry) = task.await.unwrap() else {
                panic!("expected success");
            };
            assert_eq!(entry.body, Bytes::from_static(b"shared"));
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn without_coalescing_each_miss_fetches() {
        let fetcher = Arc::new(StubFetcher::ok("dup").with_delay(Duration::from_millis(100)));
        let upstream = Arc::new(upstream(fetcher.clone(), Arc::new(Cache::new()), false));
        let k = key("http://example.test/dup");

        let a = tokio::spawn({
            let (upstream, k) = (Arc::clone(&upstream), k.clone());
            async move { upstream.fetch(&k).await }
        });
        let b = tokio::spawn({
            let (upstream, k) = (Arc::clone(&upstream), k.clone());
            async move { upstream.fetch(&k).await }
        });
        assert_eq!(a.await.unwrap(), b.await.unwrap());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn abandoned_fetch_caches_nothing() {
        let fetcher = Arc::new(StubFetcher::ok("never").with_delay(Duration::from_millis(300)));
        let cache = Arc::new(Cache::new());
        let upstream = upstream(fetcher, cache.clone(), true);
        let k = key("http://example.test/gone");

        // The caller gives up (client disconnect) long before upstream answers.
        let gave_up = tokio::time::timeout(Duration::from_millis(20), upstream.fetch(&k)).await;
        assert!(gave_up.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(cache.is_empty());
        assert_eq!(upstream.inflight_len(), 0);
    }
}
