//! Request entity shared between callers, the queue and dispatch workers.
//!
//! Flags are atomics owned by the request so that a producer cancelling a
//! request and a worker reading it never race.

mod handler;
mod markers;
mod string_handler;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use parking_lot::Mutex;

pub use handler::{ParsedResponse, Payload, RequestHandler, Response};
pub use markers::Marker;
pub use string_handler::{StringHandler, StringResult};

use crate::dispatch::Priority;
use crate::network::{NetworkResponse, RequestError};
use handler::ErasedHandler;
use markers::MarkerLog;

/// Notified once when a request finishes. Implemented by the request queue.
pub(crate) trait FinishHook: Send + Sync {
    fn request_finished(&self, request: &Request, total: Duration);
}

/// A queued network request.
pub struct Request {
    method: Method,
    url: String,
    cache_key: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    priority: Priority,
    tag: Option<String>,
    should_cache: bool,
    sequence: AtomicU64,
    canceled: Arc<AtomicBool>,
    delivered: AtomicBool,
    markers: Mutex<MarkerLog>,
    handler: Box<dyn ErasedHandler>,
    finish_hook: OnceLock<Weak<dyn FinishHook>>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("sequence", &self.sequence())
            .field("priority", &self.priority)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl Request {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Shorthand for a cacheable `GET` with default settings.
    pub fn get<H: RequestHandler>(url: impl Into<String>, handler: H) -> Arc<Self> {
        Self::builder(Method::GET, url).build(handler)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Key under which successful responses are cached.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn should_cache(&self) -> bool {
        self.should_cache
    }

    /// Queue-assigned sequence number, `0` before the request is queued.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub(crate) fn set_sequence(&self, sequence: u64) {
        self.sequence.store(sequence, Ordering::Release);
    }

    pub(crate) fn attach(&self, hook: Weak<dyn FinishHook>) {
        let _ = self.finish_hook.set(hook);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Mark the request cancelled. Workers that have not started it will drop it.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Shared cancellation flag, for transports that poll it mid-exchange.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.canceled)
    }

    pub fn has_had_response_delivered(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    pub fn mark_delivered(&self) {
        self.delivered.store(true, Ordering::Release);
    }

    pub fn add_marker(&self, label: impl Into<String>) {
        let label = label.into();
        if !self.markers.lock().add(label.as_str()) {
            tracing::warn!(url = %self.url, %label, "marker added to finished request");
        }
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.markers.lock().snapshot()
    }

    /// Whether [`finish`](Self::finish) has run.
    pub fn is_finished(&self) -> bool {
        self.markers.lock().is_sealed()
    }

    /// Terminal step: record `reason`, seal and emit the marker log, and
    /// release the request from its queue. Later calls are no-ops.
    pub fn finish(&self, reason: &str) {
        let (total, rendered) = {
            let mut log = self.markers.lock();
            log.add(reason);
            if !log.seal() {
                return;
            }
            (log.total(), log.to_string())
        };

        tracing::debug!(
            url = %self.url,
            sequence = self.sequence(),
            reason,
            total_ms = total.as_millis() as u64,
            markers = %rendered,
            "request finished"
        );

        if let Some(hook) = self.finish_hook.get().and_then(Weak::upgrade) {
            hook.request_finished(self, total);
        }
    }

    pub fn parse_network_response(
        &self,
        response: &NetworkResponse,
    ) -> Result<ParsedResponse, RequestError> {
        self.handler.erased_parse(response)
    }

    pub fn parse_network_error(&self, error: RequestError) -> RequestError {
        self.handler.erased_parse_error(error)
    }

    /// Hand a parsed result to the caller. Called by [`Delivery`](crate::dispatch::Delivery)
    /// implementations on their target context.
    pub fn deliver_response(&self, payload: Payload) {
        self.handler.erased_deliver(payload);
    }

    pub fn deliver_error(&self, error: RequestError) {
        self.handler.erased_deliver_error(error);
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    cache_key: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    priority: Priority,
    tag: Option<String>,
    should_cache: bool,
}

impl RequestBuilder {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            cache_key: None,
            headers: HeaderMap::new(),
            body: None,
            priority: Priority::Normal,
            tag: None,
            should_cache: true,
        }
    }

    /// Override the derived cache key.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn should_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = should_cache;
        self
    }

    pub fn build<H: RequestHandler>(self, handler: H) -> Arc<Request> {
        let cache_key = self
            .cache_key
            .unwrap_or_else(|| derive_cache_key(&self.method, &self.url));
        Arc::new(Request {
            method: self.method,
            url: self.url,
            cache_key,
            headers: self.headers,
            body: self.body,
            priority: self.priority,
            tag: self.tag,
            should_cache: self.should_cache,
            sequence: AtomicU64::new(0),
            canceled: Arc::new(AtomicBool::new(false)),
            delivered: AtomicBool::new(false),
            markers: Mutex::new(MarkerLog::default()),
            handler: Box::new(handler),
            finish_hook: OnceLock::new(),
        })
    }
}

/// `GET` requests are keyed by URL alone; other methods are prefixed.
fn derive_cache_key(method: &Method, url: &str) -> String {
    if *method == Method::GET {
        url.to_owned()
    } else {
        format!("{method}:{url}")
    }
}
