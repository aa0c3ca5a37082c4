//! Shared request queue.
//!
//! Unbounded: producers never block. Workers suspend in [`RequestQueue::take`]
//! until a request arrives or the stop token fires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::priority::PendingQueue;
use crate::request::{FinishHook, Request};
use crate::telemetry;

/// Configuration for the request queue.
#[derive(Debug, Clone)]
pub struct RequestQueueConfig {
    /// Requests taking longer than this from add to finish are logged at warn.
    pub slow_request_threshold: Duration,
}

impl Default for RequestQueueConfig {
    fn default() -> Self {
        Self { slow_request_threshold: Duration::from_secs(3) }
    }
}

/// Why [`RequestQueue::take`] returned.
#[derive(Debug)]
pub enum Take {
    Request(Arc<Request>),
    /// The stop token fired; the worker should exit.
    Stopped,
}

/// Priority-FIFO queue shared by every dispatch worker.
pub struct RequestQueue {
    pending: Mutex<PendingQueue<Arc<Request>>>,
    notify: Notify,
    next_sequence: AtomicU64,
    /// Requests added but not yet finished, by sequence.
    in_flight: DashMap<u64, Arc<Request>>,
    config: RequestQueueConfig,
}

impl RequestQueue {
    pub fn new(config: RequestQueueConfig) -> Self {
        Self {
            pending: Mutex::new(PendingQueue::new()),
            notify: Notify::new(),
            next_sequence: AtomicU64::new(1),
            in_flight: DashMap::new(),
            config,
        }
    }

    /// Queue a request for dispatch. Returns its sequence number.
    ///
    /// Requests are single-use: one that was already queued or has finished
    /// is not queued again, and its existing sequence (`0` if never queued)
    /// is returned.
    pub fn add(self: &Arc<Self>, request: Arc<Request>) -> u64 {
        if request.sequence() != 0 || request.is_finished() {
            tracing::warn!(
                url = %request.url(),
                sequence = request.sequence(),
                "request already queued or finished, not re-added"
            );
            return request.sequence();
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        request.set_sequence(sequence);
        let weak: Weak<Self> = Arc::downgrade(self);
        let hook: Weak<dyn FinishHook> = weak;
        request.attach(hook);
        request.add_marker("add-to-queue");

        self.in_flight.insert(sequence, Arc::clone(&request));
        let depth = {
            let mut pending = self.pending.lock();
            let priority = request.priority();
            pending.push(request, priority, sequence);
            pending.len()
        };
        telemetry::record_queue_depth(depth);

        self.notify.notify_one();
        sequence
    }

    /// Pop the next request without waiting.
    pub fn poll(&self) -> Option<Arc<Request>> {
        self.pending.lock().pop()
    }

    /// Wait for the next request. Returns [`Take::Stopped`] once `stop` is
    /// cancelled, whether the caller was parked or not.
    pub async fn take(&self, stop: &CancellationToken) -> Take {
        loop {
            if stop.is_cancelled() {
                return Take::Stopped;
            }
            if let Some(request) = self.poll() {
                return Take::Request(request);
            }
            tokio::select! {
                biased;
                () = stop.cancelled() => return Take::Stopped,
                () = self.notify.notified() => {}
            }
        }
    }

    /// Cancel every added-but-unfinished request matching `filter`.
    /// Returns how many were cancelled.
    pub fn cancel_all<F>(&self, filter: F) -> usize
    where
        F: Fn(&Request) -> bool,
    {
        let mut cancelled = 0;
        for entry in self.in_flight.iter() {
            if filter(entry.value()) {
                entry.value().cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancel every unfinished request carrying `tag`.
    pub fn cancel_tag(&self, tag: &str) -> usize {
        self.cancel_all(|r| r.tag() == Some(tag))
    }

    /// Requests waiting for a worker.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Requests added and not yet finished, including those being dispatched.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Sequence numbers of the requests still waiting, in no particular order.
    pub fn pending_sequences(&self) -> Vec<u64> {
        self.pending.lock().iter().map(|r| r.sequence()).collect()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(RequestQueueConfig::default())
    }
}

impl FinishHook for RequestQueue {
    fn request_finished(&self, request: &Request, total: Duration) {
        self.in_flight.remove(&request.sequence());
        if total >= self.config.slow_request_threshold {
            tracing::warn!(
                url = %request.url(),
                sequence = request.sequence(),
                total_ms = total.as_millis() as u64,
                "slow request"
            );
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
