//! Transport collaborator.

use async_trait::async_trait;

use super::error::RequestError;
use super::response::NetworkResponse;
use crate::request::Request;

/// Performs one HTTP exchange for a request.
///
/// Implementations should check [`Request::is_canceled`] where they can and
/// own their retry and timeout policy; the dispatch core never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<NetworkResponse, RequestError>;
}
