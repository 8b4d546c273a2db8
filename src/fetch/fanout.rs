//! Bounded fan-out of a pure transform over a fetched collection
//!
//! At most `max_workers` items are in a blocking worker at any time. Each
//! result lands in the slot of its input index, so completion order never
//! reaches the output. The first failure stops scheduling and aborts work
//! that has not started yet.

use crate::error::{FetchError, Result};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

/// Configuration for fan-out execution
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    pub max_workers: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// Statistics for fan-out execution
#[derive(Debug, Clone, Default)]
pub struct FanoutStats {
    pub batches: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    pub max_task_duration: Duration,
    pub total_task_time: Duration,
}

impl FanoutStats {
    pub fn avg_task_duration(&self) -> Duration {
        if self.completed_tasks == 0 {
            Duration::ZERO
        } else {
            self.total_task_time / self.completed_tasks as u32
        }
    }
}

/// Per-call bookkeeping, folded into the shared stats once the call ends
#[derive(Default)]
struct BatchTally {
    completed: u64,
    failed: u64,
    cancelled: u64,
    max_duration: Duration,
    total_time: Duration,
}

pub struct FanoutExecutor {
    max_workers: usize,
    stats: Arc<RwLock<FanoutStats>>,
}

impl FanoutExecutor {
    pub fn new(config: FanoutConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        info!("Initializing FanoutExecutor with {} workers", max_workers);

        Self {
            max_workers,
            stats: Arc::new(RwLock::new(FanoutStats::default())),
        }
    }

    pub fn with_workers(max_workers: usize) -> Self {
        Self::new(FanoutConfig { max_workers })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Applies `transform` to every item using the configured worker count.
    pub async fn map<R, T, E, F>(&self, items: Vec<R>, transform: F) -> Result<Vec<T>>
    where
        R: Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(R) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        self.map_with_workers(items, transform, self.max_workers)
            .await
    }

    /// Applies `transform` to every item on at most `max_workers` workers.
    ///
    /// The output is in input order. On failure, completed results are
    /// discarded and the first error is returned.
    pub async fn map_with_workers<R, T, E, F>(
        &self,
        items: Vec<R>,
        transform: F,
        max_workers: usize,
    ) -> Result<Vec<T>>
    where
        R: Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(R) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let workers = max_workers.clamp(1, total);
        debug!("Fanning out {} items over {} workers", total, workers);

        let transform = Arc::new(transform);
        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut pending = items.into_iter().enumerate();
        let mut running = JoinSet::new();
        let mut tally = BatchTally::default();
        let mut failure: Option<FetchError> = None;

        loop {
            while running.len() < workers {
                let Some((index, item)) = pending.next() else {
                    break;
                };
                let transform = Arc::clone(&transform);
                running.spawn_blocking(move || {
                    let started = Instant::now();
                    let outcome = transform(item).map_err(|e| e.to_string());
                    (index, outcome, started.elapsed())
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };

            match joined {
                Ok((index, Ok(value), elapsed)) => {
                    slots[index] = Some(value);
                    tally.completed += 1;
                    tally.total_time += elapsed;
                    tally.max_duration = tally.max_duration.max(elapsed);
                }
                Ok((index, Err(message), _)) => {
                    tally.failed += 1;
                    failure = Some(FetchError::Transform { index, message });
                    break;
                }
                Err(join_error) => {
                    tally.failed += 1;
                    failure = Some(FetchError::Worker(format!(
                        "transform worker failed: {}",
                        join_error
                    )));
                    break;
                }
            }
        }

        if failure.is_some() {
            // Blocking transforms that already started run to completion;
            // their results are dropped with the set.
            tally.cancelled = pending.len() as u64;
            running.abort_all();
        }
        self.record(&tally).await;

        if let Some(err) = failure {
            warn!(
                "Fan-out aborted after {}/{} items ({} cancelled): {}",
                tally.completed, total, tally.cancelled, err
            );
            return Err(err);
        }

        debug!(
            "Fan-out of {} items done (slowest item {:?})",
            total, tally.max_duration
        );

        slots
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| FetchError::Worker("fan-in lost a transformed item".to_string()))
    }

    async fn record(&self, tally: &BatchTally) {
        let mut stats = self.stats.write().await;
        stats.batches += 1;
        stats.completed_tasks += tally.completed;
        stats.failed_tasks += tally.failed;
        stats.cancelled_tasks += tally.cancelled;
        stats.total_task_time += tally.total_time;
        stats.max_task_duration = stats.max_task_duration.max(tally.max_duration);
    }

    /// Get current execution statistics
    pub async fn get_stats(&self) -> FanoutStats {
        self.stats.read().await.clone()
    }
}
