//! Caller-supplied parsing and delivery contract.

use std::any::Any;

use crate::cache::CacheEntry;
use crate::network::{NetworkResponse, RequestError};

/// Type-erased parse result carried between worker and delivery.
pub type Payload = Box<dyn Any + Send>;

/// A parsed result and the cache entry derived for it.
#[derive(Debug)]
pub struct Response<T> {
    pub result: T,
    /// `None` when the response must not be cached.
    pub cache_entry: Option<CacheEntry>,
}

impl<T> Response<T> {
    pub fn success(result: T, cache_entry: Option<CacheEntry>) -> Self {
        Self { result, cache_entry }
    }
}

/// A parsed response as seen by workers and delivery.
pub type ParsedResponse = Response<Payload>;

/// Per-request behaviour: how to parse the response and where results go.
///
/// Parsing runs on a dispatch worker; delivery runs wherever the
/// [`Delivery`](crate::dispatch::Delivery) implementation marshals it.
pub trait RequestHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    fn parse_network_response(
        &self,
        response: &NetworkResponse,
    ) -> Result<Response<Self::Output>, RequestError>;

    /// Rewrite a transport failure before delivery, e.g. to decode an error body.
    fn parse_network_error(&self, error: RequestError) -> RequestError {
        error
    }

    fn deliver_response(&self, output: Self::Output);

    fn deliver_error(&self, error: RequestError);
}

pub(crate) trait ErasedHandler: Send + Sync {
    fn erased_parse(&self, response: &NetworkResponse) -> Result<ParsedResponse, RequestError>;
    fn erased_parse_error(&self, error: RequestError) -> RequestError;
    fn erased_deliver(&self, payload: Payload);
    fn erased_deliver_error(&self, error: RequestError);
}

impl<H: RequestHandler> ErasedHandler for H {
    fn erased_parse(&self, response: &NetworkResponse) -> Result<ParsedResponse, RequestError> {
        let parsed = self.parse_network_response(response)?;
        Ok(Response {
            result: Box::new(parsed.result),
            cache_entry: parsed.cache_entry,
        })
    }

    fn erased_parse_error(&self, error: RequestError) -> RequestError {
        self.parse_network_error(error)
    }

    fn erased_deliver(&self, payload: Payload) {
        match payload.downcast::<H::Output>() {
            Ok(output) => self.deliver_response(*output),
            Err(_) => {
                tracing::error!("delivered payload does not match the handler's output type");
                RequestHandler::deliver_error(
                    self,
                    RequestError::unexpected("payload type mismatch"),
                );
            }
        }
    }

    fn erased_deliver_error(&self, error: RequestError) {
        RequestHandler::deliver_error(self, error);
    }
}
