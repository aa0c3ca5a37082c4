//! fetch-core
//!
//! Request dispatch core for an asynchronous HTTP client: a shared
//! priority-FIFO request queue drained by a fixed pool of dispatch workers,
//! and an HTTP cache freshness policy engine that turns response headers
//! into cache entries.
//!
//! # Collaborators
//!
//! The core never touches sockets or storage directly. Callers supply:
//!
//! - [`Transport`](network::Transport): executes one HTTP exchange
//! - [`Cache`](cache::Cache): stores entries by cache key ([`cache::MemoryCache`] is provided)
//! - [`Delivery`](dispatch::Delivery): marshals results to the caller's context
//!   ([`dispatch::ExecutorDelivery`] is provided)

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod network;
pub mod request;
pub mod telemetry;

use std::sync::Arc;

use cache::{Cache, MemoryCache, MemoryCacheConfig};
use dispatch::{Delivery, DispatchError, DispatchPool, DispatchPoolConfig, RequestQueue, RequestQueueConfig};
use network::Transport;
use request::Request;

/// Dispatcher configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub pool: DispatchPoolConfig,
    pub queue: RequestQueueConfig,
    /// Used by [`RequestDispatcher::start_with_memory_cache`] only.
    pub cache: MemoryCacheConfig,
}

/// A running request queue and its dispatch workers.
pub struct RequestDispatcher {
    queue: Arc<RequestQueue>,
    cache: Arc<dyn Cache>,
    pool: DispatchPool,
}

impl RequestDispatcher {
    /// Initialize the cache and start the worker pool.
    pub fn start(
        config: DispatcherConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn Cache>,
        delivery: Arc<dyn Delivery>,
    ) -> Result<Self, DispatchError> {
        cache.initialize();
        let queue = Arc::new(RequestQueue::new(config.queue));
        let pool = DispatchPool::start(
            &config.pool,
            Arc::clone(&queue),
            transport,
            Arc::clone(&cache),
            delivery,
        )?;
        Ok(Self { queue, cache, pool })
    }

    /// Start with a [`MemoryCache`] built from `config.cache`.
    pub fn start_with_memory_cache(
        config: DispatcherConfig,
        transport: Arc<dyn Transport>,
        delivery: Arc<dyn Delivery>,
    ) -> Result<Self, DispatchError> {
        let cache = Arc::new(MemoryCache::new(config.cache.clone()));
        Self::start(config, transport, cache, delivery)
    }

    /// Queue a request. Returns its sequence number.
    pub fn add(&self, request: Arc<Request>) -> u64 {
        self.queue.add(request)
    }

    /// Cancel every unfinished request matching `filter`.
    pub fn cancel_all<F>(&self, filter: F) -> usize
    where
        F: Fn(&Request) -> bool,
    {
        self.queue.cancel_all(filter)
    }

    pub fn cancel_tag(&self, tag: &str) -> usize {
        self.queue.cancel_tag(tag)
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Stop every worker and wait for them to exit. Requests still queued
    /// are never dispatched or delivered.
    pub fn stop(self) {
        tracing::info!(
            pending = self.queue.pending_len(),
            "stopping request dispatcher"
        );
        self.pool.stop();
    }
}
