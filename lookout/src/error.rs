use crate::types::{Delivery, Method};
use std::{error::Error, fmt, sync::Arc};
use thiserror::Error;

/// A cheaply cloneable, type-erased error. Every failure that reaches an observer is
/// wrapped in one of these, so a single error can be fanned out without requiring `Clone`
/// on the underlying error type.
#[derive(Clone, Debug)]
pub struct QueryError {
    inner: Arc<Box<dyn Error + Send + Sync>>
}

#[derive(Debug)]
pub struct QueryErrorCompat(QueryError);

impl Error for QueryErrorCompat {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl fmt::Display for QueryErrorCompat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl QueryError {
    pub fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    pub fn compat(self) -> QueryErrorCompat {
        QueryErrorCompat(self)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<T: Error + Send + Sync + 'static> From<T> for QueryError {
    fn from(e: T) -> Self {
        QueryError {
            inner: Arc::new(Box::new(e))
        }
    }
}

/// Raised while turning a [RequestTemplate](../struct.RequestTemplate.html) into a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("invalid endpoint `{endpoint}`: {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError
    },
    #[error("scheme `{scheme}` is not supported by {delivery}")]
    UnsupportedScheme { scheme: String, delivery: Delivery },
    #[error("query text is empty")]
    EmptyQuery,
    #[error("variables must be an object or null, got {0}")]
    InvalidVariables(String),
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
    #[error("{delivery} does not support method {method}")]
    UnsupportedMethod { method: Method, delivery: Delivery },
    #[error("no-cors mode does not allow {0}")]
    UnsupportedOption(String),
    #[error("endpoint origin `{endpoint}` differs from `{origin}` in same-origin mode")]
    CrossOrigin { endpoint: String, origin: String },
    #[error("same-origin mode requires an origin")]
    MissingOrigin
}

/// Raised by the transports once a request is on the wire.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("fetch error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned error code: {status}\n{body}")]
    NotOk { status: u16, body: String },
    #[error("subscription was created without a location")]
    MissingLocation,
    #[error("server created a subscription at `{0}`; fetch delivery can't follow it, use streaming fetch")]
    SubscriptionCreated(String),
    #[error("invalid location `{0}`")]
    InvalidLocation(String),
    #[error("decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no tokio runtime is available to drive the subscription")]
    NoRuntime,
    #[error("{0} delivery is not enabled")]
    Disabled(Delivery),
    #[cfg(feature = "websocket")]
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("timed out waiting for connection_ack")]
    AckTimeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{}", .0.as_deref().unwrap_or(""))]
    Remote(Option<String>),
    #[error("connection closed before the subscription completed")]
    Closed
}
