//! CPU worker pool
//!
//! A persistent rayon pool sized once at startup and shared by every
//! estimator call. It is separate from the pool that serves connections, so a
//! heavy statistic can saturate it without stalling request handling.

use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::AnalyticsError;

/// Bounded pool for CPU-bound partition reductions
#[derive(Clone)]
pub struct CpuPool {
    pool: Arc<rayon::ThreadPool>,
    threads: usize,
}

impl std::fmt::Debug for CpuPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuPool").field("threads", &self.threads).finish()
    }
}

impl CpuPool {
    /// Create a pool with `threads` workers (at least one)
    pub fn new(threads: usize) -> Result<Self, AnalyticsError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tape-cpu-{}", i))
            .build()
            .map_err(|e| AnalyticsError::PoolBuild(e.to_string()))?;

        debug!("CPU pool started with {} threads", threads);

        Ok(Self {
            pool: Arc::new(pool),
            threads,
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Clamp a requested parallelism to what the pool can actually run
    pub fn effective_parallelism(&self, requested: usize) -> usize {
        requested.clamp(1, self.threads)
    }

    /// Map `f` over `items` on the pool, returning results in input order
    ///
    /// The input is split into at most `parallelism` contiguous runs. Output
    /// order never depends on which worker finishes first.
    pub fn map_ordered<T, R, F>(&self, items: Vec<T>, parallelism: usize, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let parts = self.effective_parallelism(parallelism);
        let min_len = items.len().div_ceil(parts);

        self.pool.install(|| {
            items
                .into_par_iter()
                .with_min_len(min_len)
                .map(f)
                .collect()
        })
    }

    /// Run `job` on the pool and await its result without blocking the caller's thread
    ///
    /// A panicking job surfaces as [`AnalyticsError::WorkerLost`].
    pub async fn run<F, R>(&self, job: F) -> Result<R, AnalyticsError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        self.pool.spawn(move || match catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => {
                // Receiver gone means the requester stopped waiting
                let _ = tx.send(result);
            }
            Err(_) => error!("CPU job panicked"),
        });

        rx.await.map_err(|_| AnalyticsError::WorkerLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_map_preserves_order() {
        let pool = CpuPool::new(4).unwrap();
        let items: Vec<usize> = (0..1000).collect();

        let doubled = pool.map_ordered(items, 8, |x| x * 2);

        let expected: Vec<usize> = (0..1000).map(|x| x * 2).collect();
        assert_eq!(doubled, expected);
    }

    #[test]
    fn test_parallelism_is_clamped() {
        let pool = CpuPool::new(2).unwrap();

        assert_eq!(pool.effective_parallelism(0), 1);
        assert_eq!(pool.effective_parallelism(1), 1);
        assert_eq!(pool.effective_parallelism(16), 2);
    }

    #[test]
    fn test_single_partition_runs_every_item() {
        let pool = CpuPool::new(3).unwrap();
        let seen = AtomicUsize::new(0);

        let out = pool.map_ordered((0..50).collect(), 1, |x: i32| {
            seen.fetch_add(1, Ordering::Relaxed);
            x + 1
        });

        assert_eq!(seen.load(Ordering::Relaxed), 50);
        assert_eq!(out.first(), Some(&1));
        assert_eq!(out.last(), Some(&50));
    }

    #[test]
    fn test_empty_input() {
        let pool = CpuPool::new(1).unwrap();
        let out: Vec<u8> = pool.map_ordered(Vec::<u8>::new(), 4, |x| x);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_returns_result() {
        let pool = CpuPool::new(2).unwrap();
        let inner = pool.clone();

        let sum = pool
            .run(move || inner.map_ordered((1..=10).collect(), 2, |x: u64| x).iter().sum::<u64>())
            .await
            .unwrap();

        assert_eq!(sum, 55);
    }

    #[tokio::test]
    async fn test_run_reports_panicking_job() {
        let pool = CpuPool::new(1).unwrap();

        let result: Result<(), _> = pool.run(|| panic!("boom")).await;

        assert_eq!(result, Err(AnalyticsError::WorkerLost));
    }
}
