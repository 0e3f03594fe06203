//! I/O worker pool
//!
//! Fixed-size tokio runtime that serves connections handed over by the
//! reactor. It never runs estimator work itself; that goes to the CPU pool.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

/// I/O pool errors
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to start I/O runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("I/O pool is shut down")]
    ShutDown,
}

/// Bounded pool of connection-serving workers
pub struct IoPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    closed: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    workers: usize,
}

impl IoPool {
    /// Start a pool with exactly `workers` threads (at least one)
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("tape-io")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        info!("I/O pool started with {} workers", workers);

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            closed: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
            workers,
        })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Handle for spawning background services onto the pool
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a task; fails once the pool has been shut down
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(PoolError::ShutDown);
        }

        let guard = InFlight::enter(Arc::clone(&self.in_flight));
        self.handle.spawn(async move {
            let _guard = guard;
            task.await;
        });
        Ok(())
    }

    /// Stop accepting tasks and release the workers without waiting for running ones
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            info!("Shutting down I/O pool with {} tasks in flight", self.in_flight());
            runtime.shutdown_background();
        }
    }
}

impl Drop for IoPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for IoPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoPool")
            .field("workers", &self.workers)
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Counts a task as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
