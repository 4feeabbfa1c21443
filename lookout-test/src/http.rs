use crate::{Counter, SyncCounter};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response
    },
    Router
};
use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{convert::Infallible, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{debug, trace};
use url::Url;

const CHUNK_DELAY: Duration = Duration::from_millis(5);
const KEEP_ALIVE: Duration = Duration::from_millis(50);

/// A request as it arrived at a loopback server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    /// Every value sent under `name`, in order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    /// Decoded query parameters, in order.
    pub fn query_params(&self) -> Vec<(String, String)> {
        Url::parse(&format!("http://localhost{}", self.target))
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug)]
pub enum ReplyBody {
    Text(String),
    /// Written chunk by chunk, exactly as given.
    Chunks(Vec<String>),
    Events(Vec<Event>)
}

/// What a loopback server writes back.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ReplyBody,
    /// Keep the response open after the last chunk until the client goes away.
    pub hold_open: bool
}

impl Reply {
    /// An empty reply.
    pub fn status(status: u16) -> Self {
        Reply {
            status,
            headers: Vec::new(),
            body: ReplyBody::Text(String::new()),
            hold_open: false
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Reply {
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: ReplyBody::Text(body.to_string()),
            ..Reply::status(status)
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply {
            body: ReplyBody::Text(body.to_string()),
            ..Reply::status(status)
        }
    }

    pub fn created(location: &str) -> Self {
        Reply {
            headers: vec![("Location".to_string(), location.to_string())],
            ..Reply::status(201)
        }
    }

    /// A raw event stream, so tests can split events across reads.
    pub fn event_stream<S: Into<String>>(chunks: Vec<S>) -> Self {
        Reply {
            headers: vec![
                ("Content-Type".to_string(), "text/event-stream".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
            ],
            body: ReplyBody::Chunks(chunks.into_iter().map(Into::into).collect()),
            ..Reply::status(200)
        }
    }

    /// Server-sent events, encoded by axum.
    pub fn events(events: Vec<Event>) -> Self {
        Reply {
            body: ReplyBody::Events(events),
            ..Reply::status(200)
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    fn respond(self, disconnects: &SyncCounter) -> Response {
        let guard = if self.hold_open {
            Some(DisconnectGuard(disconnects.clone()))
        } else {
            None
        };

        let mut response = match self.body {
            ReplyBody::Text(text) => text.into_response(),
            ReplyBody::Chunks(chunks) => {
                let chunks = stream::iter(chunks).then(|chunk| async move {
                    tokio::time::sleep(CHUNK_DELAY).await;
                    Ok::<_, Infallible>(chunk)
                });
                let kept_alive = stream::repeat(()).then(|_| async {
                    tokio::time::sleep(KEEP_ALIVE).await;
                    Ok::<_, Infallible>(":\n".to_string())
                });
                Body::from_stream(hold(chunks, kept_alive, guard)).into_response()
            }
            ReplyBody::Events(events) => {
                let events = stream::iter(events.into_iter().map(Ok::<_, Infallible>));
                Sse::new(hold(events, stream::pending(), guard))
                    .keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
                    .into_response()
            }
        };

        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        for (key, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&value)
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Counts a disconnect when the response body it rides in is dropped.
struct DisconnectGuard(SyncCounter);

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        trace!("held response released");
        Counter::inc_sync(&self.0);
    }
}

/// Without a guard the body ends after `body`. With one it continues with `rest`, which never
/// ends, and the guard lives as long as the response does.
fn hold<S, R>(body: S, rest: R, guard: Option<DisconnectGuard>) -> BoxStream<'static, S::Item>
where
    S: Stream + Send + 'static,
    R: Stream<Item = S::Item> + Send + 'static,
    S::Item: Send
{
    match guard {
        Some(guard) => body
            .chain(rest)
            .map(move |item| {
                let _held = &guard;
                item
            })
            .boxed(),
        None => body.boxed()
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    handler: Handler,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    disconnects: SyncCounter
}

async fn handle(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes
) -> Response {
    let target = uri
        .path_and_query()
        .map(|target| target.to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request = RecordedRequest {
        method: method.to_string(),
        target,
        headers: headers
            .iter()
            .map(|(key, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (key.to_string(), value)
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned()
    };
    trace!(method = %request.method, target = %request.target, "loopback request");

    let reply = (state.handler)(&request);
    state.requests.lock().push(request);
    reply.respond(&state.disconnects)
}

/// An HTTP server on a random loopback port that answers every route with `handler`.
pub struct HttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    disconnects: SyncCounter,
    task: JoinHandle<()>
}

impl HttpServer {
    pub async fn start<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = ServerState {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            disconnects: Counter::sync()
        };
        let requests = state.requests.clone();
        let disconnects = state.disconnects.clone();

        let app = Router::new().fallback(handle).with_state(state);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!(error = %e, "loopback server stopped");
            }
        });

        Ok(HttpServer {
            addr,
            requests,
            disconnects,
            task
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// How many held-open responses the client has abandoned.
    pub fn disconnects(&self) -> u32 {
        Counter::get_sync(&self.disconnects)
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
