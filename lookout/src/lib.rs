//! A GraphQL subscription client that binds long-lived data feeds to the lifetime of a view.
//!
//! # Getting Started
//!
//! Describe the request with a [RequestTemplate](./struct.RequestTemplate.html), pick how
//! results should be delivered, and hand both to a [ViewController](./struct.ViewController.html)
//! backed by a [Client](./struct.Client.html):
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use lookout::{Client, Delivery, Presentation, RequestTemplate, ViewController};
//!
//! let client = Client::builder().build();
//! let template = RequestTemplate::new(
//!     "http://localhost:9009/test/graphql",
//!     "subscription { system { cpu } }"
//! )
//! .with_delivery(Delivery::WebSocket);
//!
//! let mut view = ViewController::new(client, template)
//!     .on_refresh(|state| println!("{}", Presentation::from(state)));
//!
//! view.activate();
//! // ... notifications update the view state as they arrive ...
//! view.deactivate();
//! # });
//! ```
//!
//! # Lifecycle
//!
//! A view controller holds at most one subscription handle. `activate` builds the request,
//! subscribes and stores the handle; `deactivate` releases it exactly once. Dropping the
//! controller (or the [Mounted](./struct.Mounted.html) guard returned by `mount`) deactivates
//! it, so a feed is never leaked, even while unwinding.
//!
//! Every notification goes through the view's [Observer](./struct.Observer.html). Once the view
//! is deactivated the observer is closed and anything still in flight is discarded. Completion
//! and errors are terminal: the first one wins and later notifications are ignored.
//!
//! Failures never escape `activate`. A request that can't be built, a missing runtime or a
//! transport error all end up in the view state's `last_error`.
//!
//! # Deliveries
//!
//! ## Fetch
//!
//! A single JSON round trip. Emits the response body, then completes.
//!
//! ## StreamingFetch
//!
//! `POST`s the query. Plain queries are answered directly; subscriptions are answered with
//! `201 Created` and the location of an event stream, which is then followed.
//!
//! ## EventSource
//!
//! Opens a server-sent event stream with the query encoded into the URL.
//!
//! ## WebSocket
//!
//! Speaks the `graphql-ws` protocol. Requires the `websocket` feature.
//!
//! # Features
//!
//! * `websocket` **(default)** - Include the socket transport. Pulls in `tokio-tungstenite`.

#[macro_use]
extern crate async_trait;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, fmt::Display};

pub mod client;
mod error;
mod request;
mod router;
mod source;
pub(crate) mod transports;
pub(crate) mod types;
pub mod utils;
mod view;

pub use client::{Client, ClientBuilder, Observable};
pub use error::{QueryError, QueryErrorCompat, RequestError, TransportError};
pub use request::{Request, RequestTemplate};
pub use router::{RouteError, Router, View};
pub use source::{Notification, SubscriptionHandle, SubscriptionSource};
pub use types::{Delivery, HeaderFn, HeaderPair, Method, RequestMode, RequestOptions};
pub use view::{Mounted, Observer, Presentation, ViewController, ViewError, ViewState};

/// The form in which queries are sent over the wire by every delivery.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryBody {
    /// The GraphQL query, as a string.
    pub query: String,
    /// The values for the variables declared in the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    /// Selects an operation when the query contains more than one.
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>
}

/// A decoded GraphQL response, as returned by [Client::query](./struct.Client.html#method.query).
///
/// ```
/// # use serde_json::json;
/// # use serde::Deserialize;
/// #
/// # #[derive(Debug, Deserialize, PartialEq)]
/// # struct System {
/// #     cpu: u32
/// # }
/// #
/// # #[derive(Debug, Deserialize, PartialEq)]
/// # struct ResponseData {
/// #     system: System
/// # }
/// #
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use lookout::{Location, Response};
///
/// let body: Response<ResponseData> = serde_json::from_value(json!({
///     "data": { "system": { "cpu": 42 } },
///     "errors": [{ "message": "memory sensor failed", "locations": [{ "line": 1, "column": 24 }] }]
/// }))?;
///
/// assert_eq!(body.data, Some(ResponseData { system: System { cpu: 42 } }));
/// let errors = body.errors.unwrap_or_default();
/// assert_eq!(errors[0].locations, Some(vec![Location { line: 1, column: 24 }]));
/// assert_eq!(errors[0].to_string(), "<query>:1:24: memory sensor failed");
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Response<Data> {
    /// The absent, partial or complete response data.
    pub data: Option<Data>,
    /// The top-level errors returned by the server.
    pub errors: Option<Vec<Error>>
}

/// An element in the top-level `errors` array of a response body. Displays as
/// `path:line:column: message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Error {
    /// The human-readable error message. This is the only required field.
    pub message: String,
    /// Which locations in the query the error applies to.
    pub locations: Option<Vec<Location>>,
    /// Which path in the query the error applies to, e.g. `["users", 0, "email"]`.
    pub path: Option<Vec<PathFragment>>,
    /// Additional errors. Their exact format is defined by the server.
    pub extensions: Option<HashMap<String, serde_json::Value>>
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.path {
            Some(ref fragments) => fragments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("/"),
            None => "<query>".to_string()
        };
        let location = self
            .locations
            .as_ref()
            .and_then(|locations| locations.first())
            .copied()
            .unwrap_or_default();

        write!(f, "{}:{}:{}: {}", path, location.line, location.column, self.message)
    }
}

/// Part of a path in a query. It can be an object key or an array index. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathFragment {
    /// A key inside an object
    Key(String),
    /// An index inside an array
    Index(i32)
}

/// Represents a location inside a query string. Used in errors. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// The line number in the query string where the error originated (starting from 1).
    pub line: i32,
    /// The column number in the query string where the error originated (starting from 1).
    pub column: i32
}

impl Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathFragment::Key(ref key) => write!(f, "{}", key),
            PathFragment::Index(ref idx) => write!(f, "{}", idx)
        }
    }
}
