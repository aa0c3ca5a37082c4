//! Fixed-size pool of dispatch workers sharing one queue.
//!
//! Each worker owns a named OS thread running a single-threaded tokio
//! runtime, so per-thread setup (priority, accounting tags) can be applied
//! through [`DispatchPoolConfig::on_worker_start`].

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;

use super::delivery::Delivery;
use super::error::DispatchError;
use super::queue::RequestQueue;
use super::worker::Worker;
use crate::cache::Cache;
use crate::network::Transport;

/// Called once on each worker thread, with the worker index, before it
/// starts taking requests.
pub type WorkerStartHook = Arc<dyn Fn(usize) + Send + Sync>;

const DEFAULT_POOL_SIZE: usize = 4;

/// Dispatch pool configuration.
#[derive(Clone)]
pub struct DispatchPoolConfig {
    pub pool_size: NonZeroUsize,
    /// Worker thread stack size in bytes (0 = platform default).
    pub stack_size: usize,
    pub thread_name_prefix: String,
    pub on_worker_start: Option<WorkerStartHook>,
}

impl fmt::Debug for DispatchPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPoolConfig")
            .field("pool_size", &self.pool_size)
            .field("stack_size", &self.stack_size)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("on_worker_start", &self.on_worker_start.is_some())
            .finish()
    }
}

impl Default for DispatchPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: NonZeroUsize::new(DEFAULT_POOL_SIZE).unwrap_or(NonZeroUsize::MIN),
            stack_size: 0,
            thread_name_prefix: "fetch-dispatch".to_string(),
            on_worker_start: None,
        }
    }
}

impl DispatchPoolConfig {
    /// Config with a specific worker count (at least one).
    pub fn with_workers(count: usize) -> Self {
        Self {
            pool_size: NonZeroUsize::new(count).unwrap_or(NonZeroUsize::MIN),
            ..Default::default()
        }
    }

    pub fn on_worker_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_worker_start = Some(Arc::new(hook));
        self
    }
}

/// Running set of dispatch workers.
///
/// Dropping the pool stops it. Requests still queued when the workers exit
/// are left in the queue and never reported.
pub struct DispatchPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl DispatchPool {
    /// Spawn `config.pool_size` workers draining `queue`.
    pub fn start(
        config: &DispatchPoolConfig,
        queue: Arc<RequestQueue>,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn Cache>,
        delivery: Arc<dyn Delivery>,
    ) -> Result<Self, DispatchError> {
        let size = config.pool_size.get();
        let mut pool = Self {
            workers: Vec::with_capacity(size),
            shutdown: CancellationToken::new(),
        };

        for id in 0..size {
            let worker = Worker {
                id,
                queue: Arc::clone(&queue),
                transport: Arc::clone(&transport),
                cache: Arc::clone(&cache),
                delivery: Arc::clone(&delivery),
            };
            let shutdown = pool.shutdown.clone();
            let hook = config.on_worker_start.clone();

            let mut builder = thread::Builder::new().name(format!("{}-{id}", config.thread_name_prefix));
            if config.stack_size > 0 {
                builder = builder.stack_size(config.stack_size);
            }
            // On error the partially built pool is dropped, which stops the
            // workers already running.
            let handle = builder
                .spawn(move || run_worker_thread(worker, hook, shutdown))
                .map_err(|e| DispatchError::ThreadSpawn(e.to_string()))?;
            pool.workers.push(handle);
        }

        tracing::info!(workers = size, "dispatch pool started");
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_quitting(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signal every worker to exit without waiting. Parked workers wake
    /// immediately; busy workers finish their current request first.
    pub fn quit(&self) {
        self.shutdown.cancel();
    }

    /// Signal and wait for every worker thread to exit.
    pub fn stop(mut self) {
        self.quit();
        self.join();
    }

    /// Wait for every worker thread to exit. Blocks forever unless
    /// [`quit`](Self::quit) has been called.
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                tracing::error!(thread = ?name, "dispatch worker thread panicked");
            }
        }
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.quit();
        self.join();
    }
}

fn run_worker_thread(worker: Worker, hook: Option<WorkerStartHook>, shutdown: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(worker = worker.id, error = %e, "failed to build worker runtime");
            return;
        }
    };

    if let Some(hook) = hook {
        hook(worker.id);
    }

    runtime.block_on(worker.run(shutdown));
}
