//! Failure record delivered to callers.

use std::time::Duration;

use thiserror::Error;

use super::response::NetworkResponse;

/// What went wrong during a dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("no connection: {0}")]
    NoConnection(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failure")]
    AuthFailure,

    #[error("server error")]
    Server,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

/// A dispatch failure with the elapsed network time at the point of failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct RequestError {
    kind: ErrorKind,
    response: Option<NetworkResponse>,
    network_time: Duration,
}

impl RequestError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, response: None, network_time: Duration::ZERO }
    }

    pub fn no_connection(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoConnection(reason.into()))
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network(reason.into()))
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse(reason.into()))
    }

    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected(reason.into()))
    }

    /// A failure caused by an error status, keeping the response for inspection.
    pub fn server(response: NetworkResponse) -> Self {
        let kind = match response.status.as_u16() {
            401 | 403 => ErrorKind::AuthFailure,
            _ => ErrorKind::Server,
        };
        Self::new(kind).with_response(response)
    }

    pub fn with_response(mut self, response: NetworkResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_network_time(mut self, network_time: Duration) -> Self {
        self.network_time = network_time;
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn response(&self) -> Option<&NetworkResponse> {
        self.response.as_ref()
    }

    pub fn network_time(&self) -> Duration {
        self.network_time
    }

    /// Failures raised by the transport, as opposed to parse or internal faults.
    pub fn is_transport(&self) -> bool {
        !matches!(self.kind, ErrorKind::Parse(_) | ErrorKind::Unexpected(_))
    }
}
