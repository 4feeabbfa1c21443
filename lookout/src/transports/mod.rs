//! The deliveries a [Client](../struct.Client.html) can open a feed over.

use crate::{Delivery, HeaderPair, QueryError, Request, TransportError};
use futures::stream::BoxStream;
use serde_json::Value;
use std::time::Duration;

mod fetch;
mod sse;
#[cfg(feature = "websocket")]
mod ws;

pub(crate) use fetch::{FetchTransport, StreamingFetchTransport};
pub(crate) use sse::EventSourceTransport;
#[cfg(feature = "websocket")]
pub(crate) use ws::WebSocketTransport;

/// A feed of payloads. The end of the stream is the completion signal and an `Err` item is
/// terminal.
pub(crate) type FeedStream = BoxStream<'static, Result<Value, QueryError>>;

pub(crate) struct TransportContext {
    pub http: reqwest::Client,
    pub headers: Vec<HeaderPair>,
    pub capacity: usize,
    pub ack_timeout: Duration
}

#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn open(
        &self,
        request: &Request,
        context: &TransportContext
    ) -> Result<FeedStream, QueryError>;
}

pub(crate) async fn open(
    request: &Request,
    context: &TransportContext
) -> Result<FeedStream, QueryError> {
    match request.delivery() {
        Delivery::Fetch => FetchTransport.open(request, context).await,
        Delivery::StreamingFetch => StreamingFetchTransport.open(request, context).await,
        Delivery::EventSource => EventSourceTransport.open(request, context).await,
        #[cfg(feature = "websocket")]
        Delivery::WebSocket => WebSocketTransport.open(request, context).await,
        #[cfg(not(feature = "websocket"))]
        Delivery::WebSocket => Err(TransportError::Disabled(Delivery::WebSocket).into())
    }
}

/// Attach `headers` to a request, then each default whose name isn't among them.
pub(crate) fn with_headers(
    mut builder: reqwest::RequestBuilder,
    headers: &[HeaderPair],
    defaults: &[(&str, &str)]
) -> reqwest::RequestBuilder {
    for HeaderPair(key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    for &(key, value) in defaults {
        if !headers.iter().any(|HeaderPair(name, _)| name.eq_ignore_ascii_case(key)) {
            builder = builder.header(key, value);
        }
    }
    builder
}

/// Fail with the status and body of a response that isn't a success.
pub(crate) async fn ensure_success(
    response: reqwest::Response
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::NotOk {
        status: status.as_u16(),
        body
    })
}
