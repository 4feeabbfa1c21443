use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// The mechanism used to deliver results for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delivery {
    /// A single request/response round trip. Emits one payload, then completes.
    Fetch,
    /// A `POST` that either answers directly or hands back the location of an event stream.
    StreamingFetch,
    /// A server-sent event stream opened directly on the endpoint.
    EventSource,
    /// A `graphql-ws` socket subscription.
    WebSocket
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Fetch
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Delivery::Fetch => "fetch",
            Delivery::StreamingFetch => "streaming fetch",
            Delivery::EventSource => "event source",
            Delivery::WebSocket => "websocket"
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST")
        }
    }
}

/// Mirrors the `mode` option of a browser fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Cors,
    SameOrigin,
    NoCors
}

impl Default for RequestMode {
    fn default() -> Self {
        RequestMode::Cors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPair(pub String, pub String);

impl HeaderPair {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        HeaderPair(key.into(), value.into())
    }
}

pub type HeaderFn = Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>;

/// Transport options for a single request. Which of these are recognized depends on the
/// [Delivery](./enum.Delivery.html) in use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub delivery: Delivery,
    /// `None` picks the delivery's default method.
    pub method: Option<Method>,
    pub mode: RequestMode,
    pub headers: Vec<HeaderPair>,
    /// The origin the request is made from. Required by `SameOrigin` mode.
    pub origin: Option<String>
}

impl RequestOptions {
    pub fn new(delivery: Delivery) -> Self {
        RequestOptions {
            delivery,
            ..RequestOptions::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push(HeaderPair::new(key, value));
        self
    }

    pub fn with_origin<O: Into<String>>(mut self, origin: O) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
