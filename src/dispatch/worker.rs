//! Dispatch worker: take a request, run it through the transport, cache and
//! deliver the result.
//!
//! Nothing a collaborator does (error or panic) ends the loop; only the stop
//! token does.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::delivery::Delivery;
use super::queue::{RequestQueue, Take};
use crate::cache::Cache;
use crate::network::{ErrorKind, RequestError, Transport};
use crate::request::{ParsedResponse, Request};
use crate::telemetry::{self, DispatchOutcome, DispatchSpan};

/// What a dispatch produced, before anything is posted.
enum Outcome {
    /// Cancelled before the transport was contacted.
    Cancelled,
    /// 304 for a request that already had a response delivered.
    NotModified,
    Respond(ParsedResponse),
    Fail(RequestError),
}

impl Outcome {
    fn label(&self) -> DispatchOutcome {
        match self {
            Self::Cancelled => DispatchOutcome::DiscardedCancelled,
            Self::NotModified => DispatchOutcome::DiscardedNotModified,
            Self::Respond(_) => DispatchOutcome::Delivered,
            Self::Fail(e) if matches!(e.kind(), ErrorKind::Unexpected(_)) => {
                DispatchOutcome::Unexpected
            }
            Self::Fail(_) => DispatchOutcome::Failed,
        }
    }
}

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) queue: Arc<RequestQueue>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Arc<dyn Cache>,
    pub(crate) delivery: Arc<dyn Delivery>,
}

impl Worker {
    /// Drain the queue until `shutdown` fires.
    pub(crate) async fn run(&self, shutdown: CancellationToken) {
        tracing::debug!(worker = self.id, "dispatch worker started");
        loop {
            match self.queue.take(&shutdown).await {
                Take::Request(request) => self.dispatch(request).await,
                Take::Stopped => break,
            }
        }
        tracing::debug!(worker = self.id, "dispatch worker stopped");
    }

    /// Dispatch one request to completion.
    pub(crate) async fn dispatch(&self, request: Arc<Request>) {
        let start = Instant::now();
        request.add_marker("network-queue-take");
        let span = DispatchSpan::new(self.id, request.sequence(), request.url());

        let guarded = AssertUnwindSafe(self.process(&request, start))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let outcome = guarded.unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            tracing::error!(
                parent: &span,
                worker = self.id,
                url = %request.url(),
                %reason,
                "unhandled fault while dispatching"
            );
            Outcome::Fail(RequestError::unexpected(reason).with_network_time(start.elapsed()))
        });

        let network_time = start.elapsed();
        let label = outcome.label();
        DispatchSpan::record_outcome(&span, label, network_time.as_millis() as u64);
        telemetry::record_dispatch(label, network_time);

        match outcome {
            Outcome::Cancelled => request.finish("network-discard-cancelled"),
            Outcome::NotModified => request.finish("not-modified"),
            Outcome::Respond(response) => {
                self.post(&request, |d, r| d.post_response(r, response));
            }
            Outcome::Fail(error) => {
                tracing::debug!(parent: &span, error = %error, "dispatch failed");
                self.post(&request, |d, r| d.post_error(r, error));
            }
        }
    }

    async fn process(&self, request: &Request, start: Instant) -> Outcome {
        if request.is_canceled() {
            return Outcome::Cancelled;
        }

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                let error = error.with_network_time(start.elapsed());
                return Outcome::Fail(request.parse_network_error(error));
            }
        };
        request.add_marker("network-http-complete");

        // A 304 for a request that was already answered (e.g. from cache)
        // would only repeat identical content.
        if response.not_modified && request.has_had_response_delivered() {
            return Outcome::NotModified;
        }

        let parsed = match request.parse_network_response(&response) {
            Ok(parsed) => parsed,
            Err(error) => {
                request.mark_delivered();
                return Outcome::Fail(error.with_network_time(start.elapsed()));
            }
        };
        request.add_marker("network-parse-complete");

        if request.should_cache() {
            if let Some(entry) = &parsed.cache_entry {
                self.cache.put(request.cache_key(), entry.clone());
                request.add_marker("network-cache-written");
                telemetry::record_cache_write();
            }
        }

        request.mark_delivered();
        Outcome::Respond(parsed)
    }

    /// Run one delivery call. A panicking delivery is logged and the request
    /// finished; it is never retried.
    fn post<F>(&self, request: &Arc<Request>, call: F)
    where
        F: FnOnce(&dyn Delivery, Arc<Request>),
    {
        let delivery = self.delivery.as_ref();
        let request_for_call = Arc::clone(request);
        let result = std::panic::catch_unwind(AssertUnwindSafe(move || call(delivery, request_for_call)));
        if let Err(panic) = result {
            tracing::error!(
                worker = self.id,
                url = %request.url(),
                reason = %panic_message(panic.as_ref()),
                "delivery panicked"
            );
            request.finish("delivery-panicked");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
