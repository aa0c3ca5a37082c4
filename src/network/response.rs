//! Raw result of one HTTP exchange.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Status, body and headers as returned by the transport.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub status: StatusCode,
    pub data: Bytes,
    /// Case-insensitive header lookup.
    pub headers: HeaderMap,
    /// The server answered a conditional request with 304.
    pub not_modified: bool,
    /// Time spent on the network for this exchange.
    pub network_time: Duration,
}

impl NetworkResponse {
    pub fn new(
        status: StatusCode,
        data: Bytes,
        headers: HeaderMap,
        not_modified: bool,
        network_time: Duration,
    ) -> Self {
        Self { status, data, headers, not_modified, network_time }
    }

    /// A 200 response with the given body and headers.
    pub fn from_data(data: impl Into<Bytes>, headers: HeaderMap) -> Self {
        Self::new(StatusCode::OK, data.into(), headers, false, Duration::ZERO)
    }

    /// A 304 response carrying the headers the server re-sent.
    pub fn not_modified(headers: HeaderMap) -> Self {
        Self::new(StatusCode::NOT_MODIFIED, Bytes::new(), headers, true, Duration::ZERO)
    }
}
