//! End-to-end dispatch through a running worker pool.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::Mutex;
use tokio::time::timeout;

use fetch_core::cache::{Cache, MemoryCache};
use fetch_core::dispatch::{DispatchPoolConfig, ExecutorDelivery, Priority};
use fetch_core::network::{ErrorKind, NetworkResponse, RequestError, Transport};
use fetch_core::request::{Request, StringHandler};
use fetch_core::{DispatcherConfig, RequestDispatcher};

/// Echoes the request URL as the body, cacheable for a minute.
#[derive(Default)]
struct EchoTransport {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    delay: Duration,
}

impl EchoTransport {
    fn slow(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn execute(&self, request: &Request) -> Result<NetworkResponse, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.url().to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.url().ends_with("/missing") {
            return Err(RequestError::network("connection reset"));
        }
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static("max-age=60"));
        headers.insert("content-type", HeaderValue::from_static("text/plain; charset=utf-8"));
        Ok(NetworkResponse::from_data(request.url().to_string(), headers))
    }
}

fn config(workers: usize) -> DispatcherConfig {
    DispatcherConfig { pool: DispatchPoolConfig::with_workers(workers), ..Default::default() }
}

fn start(
    workers: usize,
    transport: Arc<EchoTransport>,
) -> (RequestDispatcher, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::default());
    let delivery = Arc::new(ExecutorDelivery::current().expect("inside a runtime"));
    let dispatcher = RequestDispatcher::start(config(workers), transport, cache.clone(), delivery)
        .expect("pool starts");
    (dispatcher, cache)
}

async fn stop(dispatcher: RequestDispatcher) {
    tokio::task::spawn_blocking(move || dispatcher.stop()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivers_response_and_caches_it() {
    let transport = Arc::new(EchoTransport::default());
    let (dispatcher, cache) = start(2, transport.clone());

    let (handler, mut rx) = StringHandler::channel();
    let request = Request::get("http://example.test/a", handler);
    dispatcher.add(Arc::clone(&request));

    let body = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivered in time")
        .expect("channel open")
        .expect("successful response");
    assert_eq!(body, "http://example.test/a");

    let entry = cache.get("http://example.test/a").expect("cached");
    assert!(entry.soft_ttl > 0);
    assert!(request.has_had_response_delivered());

    stop(dispatcher).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transport_failure_reaches_caller() {
    let (dispatcher, _cache) = start(1, Arc::new(EchoTransport::default()));

    let (handler, mut rx) = StringHandler::channel();
    dispatcher.add(Request::get("http://example.test/missing", handler));

    let result = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    let error = result.expect_err("transport failed");
    assert_eq!(error.kind(), &ErrorKind::Network("connection reset".into()));

    stop(dispatcher).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_distinct_keys_are_all_cached() {
    let transport = Arc::new(EchoTransport::slow(Duration::from_millis(10)));
    let (dispatcher, cache) = start(4, transport.clone());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let urls: Vec<String> = (0..16).map(|i| format!("http://example.test/item/{i}")).collect();
    for url in &urls {
        dispatcher.add(Request::get(url.clone(), StringHandler::new(tx.clone())));
    }

    let mut delivered = HashSet::new();
    for _ in 0..urls.len() {
        let body = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap().unwrap();
        delivered.insert(body);
    }

    assert_eq!(delivered.len(), urls.len());
    for url in &urls {
        let entry = cache.get(url).expect("every key cached");
        assert_eq!(entry.data, url.as_bytes());
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), urls.len());

    stop(dispatcher).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_requests_never_reach_transport() {
    let transport = Arc::new(EchoTransport::default());
    let (dispatcher, _cache) = start(1, transport.clone());

    let (handler, mut rx) = StringHandler::channel();
    let cancelled = Request::builder(Method::GET, "http://example.test/skip")
        .tag("batch")
        .build(handler.clone());
    cancelled.cancel();
    dispatcher.add(cancelled);

    let kept = Request::get("http://example.test/keep", handler);
    dispatcher.add(kept);

    let body = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(body, "http://example.test/keep");
    assert_eq!(*transport.seen.lock(), vec!["http://example.test/keep".to_string()]);

    stop(dispatcher).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_leaves_queued_requests_undelivered() {
    let transport = Arc::new(EchoTransport::slow(Duration::from_millis(200)));
    let (dispatcher, _cache) = start(1, transport.clone());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for i in 0..5 {
        dispatcher.add(Request::get(
            format!("http://example.test/{i}"),
            StringHandler::new(tx.clone()),
        ));
    }
    drop(tx);

    // Let the single worker pick up the first request, then stop.
    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let queue = Arc::clone(dispatcher.queue());
    timeout(Duration::from_secs(5), stop(dispatcher)).await.expect("workers exit");

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending_len(), 4);

    // At most the in-progress request is delivered.
    let mut delivered = 0;
    while let Ok(Some(_)) = timeout(Duration::from_millis(200), rx.recv()).await {
        delivered += 1;
    }
    assert!(delivered <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn higher_priority_is_dispatched_first() {
    let transport = Arc::new(EchoTransport::slow(Duration::from_millis(50)));
    let (dispatcher, _cache) = start(1, transport.clone());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let add = |url: &str, priority| {
        dispatcher.add(
            Request::builder(Method::GET, url)
                .priority(priority)
                .build(StringHandler::new(tx.clone())),
        );
    };
    // The first request occupies the worker while the rest queue up.
    add("http://example.test/first", Priority::Normal);
    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    add("http://example.test/low", Priority::Low);
    add("http://example.test/normal", Priority::Normal);
    add("http://example.test/immediate", Priority::Immediate);

    let mut order = Vec::new();
    for _ in 0..4 {
        order.push(timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap().unwrap());
    }
    assert_eq!(
        order,
        vec![
            "http://example.test/first",
            "http://example.test/immediate",
            "http://example.test/normal",
            "http://example.test/low",
        ]
    );

    stop(dispatcher).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_tag_drops_results_at_delivery() {
    let transport = Arc::new(EchoTransport::slow(Duration::from_millis(100)));
    let (dispatcher, _cache) = start(1, transport.clone());

    let (handler, mut rx) = StringHandler::channel();
    let request = Request::builder(Method::GET, "http://example.test/tagged")
        .tag("screen-1")
        .build(handler);
    dispatcher.add(Arc::clone(&request));

    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(dispatcher.cancel_tag("screen-1"), 1);

    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());
    assert!(request.is_canceled());

    stop(dispatcher).await;
}

#[tokio::test]
async fn worker_start_hook_runs_once_per_worker() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let pool = {
        let started = Arc::clone(&started);
        DispatchPoolConfig::with_workers(3).on_worker_start(move |id| started.lock().push(id))
    };
    let config = DispatcherConfig { pool, ..Default::default() };
    let delivery = Arc::new(ExecutorDelivery::current().unwrap());
    let dispatcher = RequestDispatcher::start_with_memory_cache(
        config,
        Arc::new(EchoTransport::default()),
        delivery,
    )
    .unwrap();
    assert_eq!(dispatcher.num_workers(), 3);

    stop(dispatcher).await;

    let mut ids = started.lock().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2]);
}
