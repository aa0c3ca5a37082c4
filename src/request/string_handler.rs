//! Handler that decodes the response body as text.

use encoding_rs::{Encoding, UTF_8};
use tokio::sync::mpsc;

use super::handler::{RequestHandler, Response};
use crate::cache::{parse_cache_headers, parse_charset_or_default};
use crate::network::{NetworkResponse, RequestError};

/// What a [`StringHandler`] sends to its receiver.
pub type StringResult = Result<String, RequestError>;

/// Decodes bodies using the `Content-Type` charset and forwards results to a channel.
#[derive(Debug, Clone)]
pub struct StringHandler {
    tx: mpsc::UnboundedSender<StringResult>,
}

impl StringHandler {
    pub fn new(tx: mpsc::UnboundedSender<StringResult>) -> Self {
        Self { tx }
    }

    /// Handler plus the receiver its results arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StringResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl RequestHandler for StringHandler {
    type Output = String;

    fn parse_network_response(
        &self,
        response: &NetworkResponse,
    ) -> Result<Response<String>, RequestError> {
        let charset = parse_charset_or_default(&response.headers);
        // Unknown labels fall back to UTF-8.
        let encoding = Encoding::for_label(charset.as_bytes()).unwrap_or(UTF_8);
        let text = encoding
            .decode_without_bom_handling(&response.data)
            .0
            .into_owned();
        Ok(Response::success(text, parse_cache_headers(response)))
    }

    fn deliver_response(&self, output: String) {
        // Receiver gone means the caller stopped listening.
        let _ = self.tx.send(Ok(output));
    }

    fn deliver_error(&self, error: RequestError) {
        let _ = self.tx.send(Err(error));
    }
}
