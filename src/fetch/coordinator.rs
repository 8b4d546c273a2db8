//! Request coalescing in front of the result cache
//!
//! At most one resolution runs per key. The first caller to miss the cache
//! spawns it and registers a shared handle; callers arriving before it
//! finishes await that same handle. The resolution itself stores the result
//! and deregisters under the registry lock, so a caller never sees a miss
//! with nothing in flight while a result is being published.

use super::cache::{CacheConfig, CacheEntry, CacheKey, CacheStats, ResultCache};
use super::fanout::FanoutExecutor;
use crate::error::{FetchError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use std::{
    cmp::Reverse,
    collections::HashMap,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Instant};

type SharedResolution<T> = Shared<BoxFuture<'static, Result<Arc<Vec<T>>>>>;

/// A resolution that is currently running for `key`
pub struct InFlightRequest<T> {
    pub key: CacheKey,
    pub started_at: Instant,
    result: SharedResolution<T>,
}

impl<T> InFlightRequest<T> {
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Configuration for a fetch coordinator
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub cache: CacheConfig,
    /// Bounds the upstream fetch. Expiry fails the whole resolution.
    pub fetch_timeout: Option<Duration>,
    /// Bounds one caller's wait. Expiry leaves the resolution running.
    pub wait_timeout: Option<Duration>,
}

/// Coordinator statistics
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    pub resolutions: u64,
    pub cache_hits: u64,
    pub coalesced: u64,
    pub fetches: u64,
    pub failures: u64,
    pub wait_timeouts: u64,
}

impl CoordinatorStats {
    pub fn summary(&self) -> String {
        format!(
            "{} resolutions: {} cache hits, {} coalesced, {} fetches ({} failed), {} wait timeouts",
            self.resolutions,
            self.cache_hits,
            self.coalesced,
            self.fetches,
            self.failures,
            self.wait_timeouts
        )
    }
}

/// Serves ordered, transformed collections per key with at most one
/// upstream fetch in flight per key.
pub struct FetchCoordinator<T> {
    cache: Arc<ResultCache<Arc<Vec<T>>>>,
    in_flight: Arc<Mutex<HashMap<CacheKey, InFlightRequest<T>>>>,
    executor: Arc<FanoutExecutor>,
    config: CoordinatorConfig,
    stats: Arc<RwLock<CoordinatorStats>>,
}

impl<T> FetchCoordinator<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(config: CoordinatorConfig, executor: Arc<FanoutExecutor>) -> Self {
        info!(
            "Initializing FetchCoordinator (fetch timeout: {:?}, wait timeout: {:?})",
            config.fetch_timeout, config.wait_timeout
        );

        Self {
            cache: Arc::new(ResultCache::new(config.cache.clone())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            executor,
            config,
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
        }
    }

    /// Resolves `key` with the cache's default TTL.
    pub async fn resolve<R, F, Fut, E, X, XE, S, O>(
        &self,
        key: CacheKey,
        fetch: F,
        transform: X,
        sort_key: S,
    ) -> Result<Arc<Vec<T>>>
    where
        R: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Vec<R>, E>> + Send + 'static,
        E: Into<FetchError> + Send + 'static,
        X: Fn(R) -> std::result::Result<T, XE> + Send + Sync + 'static,
        XE: fmt::Display + Send + 'static,
        S: Fn(&T) -> O + Send + 'static,
        O: Ord,
    {
        let ttl = self.cache.default_ttl();
        self.resolve_with_ttl(key, ttl, fetch, transform, sort_key)
            .await
    }

    /// Returns the cached sequence for `key`, joins the resolution already
    /// running for it, or starts one: fetch, fan out `transform`, sort
    /// descending by `sort_key`, cache for `ttl`.
    ///
    /// Every caller attached to one resolution gets the same result or the
    /// same error. Failures are never cached.
    pub async fn resolve_with_ttl<R, F, Fut, E, X, XE, S, O>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
        transform: X,
        sort_key: S,
    ) -> Result<Arc<Vec<T>>>
    where
        R: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Vec<R>, E>> + Send + 'static,
        E: Into<FetchError> + Send + 'static,
        X: Fn(R) -> std::result::Result<T, XE> + Send + Sync + 'static,
        XE: fmt::Display + Send + 'static,
        S: Fn(&T) -> O + Send + 'static,
        O: Ord,
    {
        let resolution = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(entry) = self.cache.get(&key).await {
                drop(in_flight);
                debug!("Serving {} from cache ({:?} left)", key, entry.remaining_ttl());
                self.update_stats(|s| {
                    s.resolutions += 1;
                    s.cache_hits += 1;
                })
                .await;
                return Ok(entry.value);
            }

            match in_flight.get(&key) {
                Some(request) => {
                    debug!(
                        "Joining in-flight fetch for {} (started {:?} ago)",
                        key,
                        request.age()
                    );
                    let result = request.result.clone();
                    drop(in_flight);
                    self.update_stats(|s| {
                        s.resolutions += 1;
                        s.coalesced += 1;
                    })
                    .await;
                    result
                }
                None => {
                    let result =
                        self.spawn_resolution(key.clone(), ttl, fetch, transform, sort_key);
                    in_flight.insert(
                        key.clone(),
                        InFlightRequest {
                            key: key.clone(),
                            started_at: Instant::now(),
                            result: result.clone(),
                        },
                    );
                    drop(in_flight);
                    self.update_stats(|s| {
                        s.resolutions += 1;
                        s.fetches += 1;
                    })
                    .await;
                    result
                }
            }
        };

        self.await_resolution(&key, resolution).await
    }

    fn spawn_resolution<R, F, Fut, E, X, XE, S, O>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
        transform: X,
        sort_key: S,
    ) -> SharedResolution<T>
    where
        R: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Vec<R>, E>> + Send + 'static,
        E: Into<FetchError> + Send + 'static,
        X: Fn(R) -> std::result::Result<T, XE> + Send + Sync + 'static,
        XE: fmt::Display + Send + 'static,
        S: Fn(&T) -> O + Send + 'static,
        O: Ord,
    {
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);
        let fetch_timeout = self.config.fetch_timeout;

        debug!("Starting fetch for {}", key);

        // Spawned so that no caller dropping its wait can cancel the fetch.
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let pipeline = run_pipeline(&executor, fetch, transform, sort_key, fetch_timeout);
            let outcome = match AssertUnwindSafe(pipeline).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::Worker(format!("resolution for {} panicked", key))),
            };

            {
                let mut registry = in_flight.lock().await;
                if let Ok(items) = &outcome {
                    cache.put_with_ttl(key.clone(), Arc::clone(items), ttl).await;
                }
                registry.remove(&key);
            }

            match &outcome {
                Ok(items) => info!(
                    "Resolved {} ({} items) in {:?}",
                    key,
                    items.len(),
                    started.elapsed()
                ),
                Err(err) => {
                    warn!(
                        "Resolution for {} failed ({:?}): {}",
                        key,
                        err.categorize(),
                        err
                    );
                    stats.write().await.failures += 1;
                }
            }

            outcome
        });

        async move {
            task.await.unwrap_or_else(|join_error| {
                Err(FetchError::Worker(format!(
                    "resolution task failed: {}",
                    join_error
                )))
            })
        }
        .boxed()
        .shared()
    }

    async fn await_resolution(
        &self,
        key: &CacheKey,
        resolution: SharedResolution<T>,
    ) -> Result<Arc<Vec<T>>> {
        let Some(limit) = self.config.wait_timeout else {
            return resolution.await;
        };

        match timeout(limit, resolution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Stopped waiting on {} after {:?}; fetch keeps running",
                    key, limit
                );
                self.update_stats(|s| s.wait_timeouts += 1).await;
                Err(FetchError::Timeout(format!(
                    "waited more than {:?} for {}",
                    limit, key
                )))
            }
        }
    }

    async fn update_stats(&self, apply: impl FnOnce(&mut CoordinatorStats)) {
        let mut stats = self.stats.write().await;
        apply(&mut stats);
    }

    /// Drops the cached entry for `key`; a running resolution is unaffected.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.cache.invalidate(key).await
    }

    /// Looks up the cache without starting a fetch.
    pub async fn cached(&self, key: &CacheKey) -> Option<CacheEntry<Arc<Vec<T>>>> {
        self.cache.get(key).await
    }

    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub async fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().await.contains_key(key)
    }

    pub async fn stats(&self) -> CoordinatorStats {
        self.stats.read().await.clone()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn executor(&self) -> &Arc<FanoutExecutor> {
        &self.executor
    }
}

async fn run_pipeline<R, T, F, Fut, E, X, XE, S, O>(
    executor: &FanoutExecutor,
    fetch: F,
    transform: X,
    sort_key: S,
    fetch_timeout: Option<Duration>,
) -> Result<Arc<Vec<T>>>
where
    R: Send + 'static,
    T: Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<Vec<R>, E>>,
    E: Into<FetchError>,
    X: Fn(R) -> std::result::Result<T, XE> + Send + Sync + 'static,
    XE: fmt::Display + Send + 'static,
    S: Fn(&T) -> O,
    O: Ord,
{
    let fetched = match fetch_timeout {
        Some(limit) => timeout(limit, fetch()).await.map_err(|_| {
            FetchError::Timeout(format!("upstream fetch exceeded {:?}", limit))
        })?,
        None => fetch().await,
    };

    let raw = match fetched {
        Ok(raw) => raw,
        Err(err) => return Err(err.into()),
    };

    let mut items = executor.map(raw, transform).await?;
    // stable, so equal keys keep their fetched order
    items.sort_by_cached_key(|item| Reverse(sort_key(item)));

    Ok(Arc::new(items))
}
