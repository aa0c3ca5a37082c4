//! Delivery collaborator: hands results back to the caller's context.

use std::sync::Arc;

use tokio::runtime::Handle;

use super::error::DispatchError;
use crate::network::RequestError;
use crate::request::{ParsedResponse, Payload, Request};

/// Posts results back to callers.
///
/// A worker makes at most one of these calls per dispatch.
pub trait Delivery: Send + Sync {
    fn post_response(&self, request: Arc<Request>, response: ParsedResponse);

    fn post_error(&self, request: Arc<Request>, error: RequestError);
}

/// Delivers on a tokio runtime, typically the application's own.
///
/// Results for requests cancelled before delivery runs are dropped.
#[derive(Debug, Clone)]
pub struct ExecutorDelivery {
    handle: Handle,
}

impl ExecutorDelivery {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Deliver on the runtime the caller is running in.
    pub fn current() -> Result<Self, DispatchError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| DispatchError::NoRuntime(e.to_string()))
    }
}

impl Delivery for ExecutorDelivery {
    fn post_response(&self, request: Arc<Request>, response: ParsedResponse) {
        request.mark_delivered();
        request.add_marker("post-response");
        self.handle.spawn(async move { deliver(&request, Ok(response.result)) });
    }

    fn post_error(&self, request: Arc<Request>, error: RequestError) {
        request.add_marker("post-error");
        self.handle.spawn(async move { deliver(&request, Err(error)) });
    }
}

fn deliver(request: &Request, outcome: Result<Payload, RequestError>) {
    if request.is_canceled() {
        request.finish("canceled-at-delivery");
        return;
    }

    match outcome {
        Ok(payload) => request.deliver_response(payload),
        Err(error) => request.deliver_error(error),
    }
    request.finish("done");
}
