use super::{FeedStream, Transport, TransportContext};
use crate::{HeaderPair, QueryBody, QueryError, Request, TransportError};
use futures::{
    channel::mpsc,
    task::{Context, Poll},
    Sink, SinkExt, Stream, StreamExt
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use tokio::sync::oneshot;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
        Error as SocketError, Message
    }
};
use tracing::{debug, trace, warn};

const PROTOCOL: &str = "graphql-ws";
/// Each connection carries exactly one operation.
const OPERATION_ID: &str = "1";

/// Speaks the `graphql-ws` protocol over a dedicated connection.
pub(crate) struct WebSocketTransport;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage<'a> {
    ConnectionInit {},
    Start { id: &'a str, payload: &'a QueryBody },
    Stop { id: &'a str },
    ConnectionTerminate
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
enum ServerMessage {
    #[serde(rename = "connection_ack")]
    ConnectionAck,
    #[serde(rename = "connection_error")]
    ConnectionError {
        #[serde(default)]
        payload: Option<Value>
    },
    #[serde(rename = "ka")]
    KeepAlive,
    #[serde(rename = "data")]
    Data {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Value
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Option<Value>
    },
    #[serde(rename = "complete")]
    Complete {
        #[serde(default)]
        id: Option<String>
    }
}

impl ServerMessage {
    fn parse(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text)
            .map_err(|e| TransportError::Protocol(format!("malformed message: {}", e)))
    }
}

/// Servers report errors either as `{ "message": ... }` or as a bare string.
fn message_of(payload: Option<Value>) -> Option<String> {
    match payload? {
        Value::String(message) => Some(message),
        Value::Object(mut object) => match object.remove("message") {
            Some(Value::String(message)) => Some(message),
            _ => None
        },
        _ => None
    }
}

async fn send<S>(sink: &mut S, message: &ClientMessage<'_>) -> Result<(), TransportError>
where
    S: Sink<Message, Error = SocketError> + Unpin
{
    let text = serde_json::to_string(message)?;
    trace!(%text, "sending");
    sink.send(Message::Text(text)).await?;
    Ok(())
}

fn client_request(
    request: &Request,
    headers: &[HeaderPair]
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, TransportError> {
    let mut client_request = request.url().as_str().into_client_request()?;
    let header_map = client_request.headers_mut();
    header_map.insert("Sec-WebSocket-Protocol", HeaderValue::from_static(PROTOCOL));
    for HeaderPair(key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| TransportError::Protocol(format!("invalid header `{}`", key)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::Protocol(format!("invalid header `{}`", key)))?;
        header_map.append(name, value);
    }
    Ok(client_request)
}

/// Wait for the server to accept the connection. Keep-alives may arrive before the ack.
async fn await_ack<S>(read: &mut S) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Message, SocketError>> + Unpin
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match ServerMessage::parse(&text)? {
                ServerMessage::ConnectionAck => return Ok(()),
                ServerMessage::KeepAlive => continue,
                ServerMessage::ConnectionError { payload } => {
                    let message = message_of(payload).unwrap_or_default();
                    return Err(TransportError::ConnectionRejected(message));
                }
                other => {
                    return Err(TransportError::Protocol(format!(
                        "expected connection_ack, got {:?}",
                        other
                    )))
                }
            },
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(_)) => {
                return Err(TransportError::Protocol(
                    "expected a text frame".to_string()
                ))
            }
            Some(Err(e)) => return Err(e.into())
        }
    }
}

type Events = mpsc::Sender<Result<Value, QueryError>>;

/// Forward frames until the operation finishes, the server goes away or the feed is dropped.
/// Dropping `events` ends the feed.
async fn connection_loop<W, R>(
    mut write: W,
    mut read: R,
    mut events: Events,
    mut shutdown: oneshot::Receiver<()>
) where
    W: Sink<Message, Error = SocketError> + Unpin,
    R: Stream<Item = Result<Message, SocketError>> + Unpin
{
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("feed released, stopping operation");
                let _ = send(&mut write, &ClientMessage::Stop { id: OPERATION_ID }).await;
                break;
            }

            frame = read.next() => {
                let result: Result<(), TransportError> = match frame {
                    Some(Ok(Message::Text(text))) => match ServerMessage::parse(&text) {
                        Ok(ServerMessage::Data { payload, .. }) => {
                            if events.send(Ok(payload)).await.is_err() {
                                let _ = send(&mut write, &ClientMessage::Stop { id: OPERATION_ID }).await;
                                break;
                            }
                            continue;
                        }
                        Ok(ServerMessage::Complete { .. }) => {
                            debug!("operation complete");
                            break;
                        }
                        Ok(ServerMessage::KeepAlive) | Ok(ServerMessage::ConnectionAck) => continue,
                        Ok(ServerMessage::Error { payload, .. }) => {
                            Err(TransportError::Remote(message_of(payload)))
                        }
                        Ok(ServerMessage::ConnectionError { payload }) => Err(
                            TransportError::ConnectionRejected(message_of(payload).unwrap_or_default())
                        ),
                        Err(e) => Err(e)
                    },
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => Err(TransportError::Closed),
                    Some(Ok(_)) => Err(TransportError::Protocol("expected a text frame".to_string())),
                    Some(Err(e)) => Err(TransportError::from(e))
                };

                if let Err(e) = result {
                    warn!(error = %e, "socket subscription failed");
                    let _ = events.send(Err(e.into())).await;
                    break;
                }
            }
        }
    }

    let _ = send(&mut write, &ClientMessage::ConnectionTerminate).await;
    let _ = write.send(Message::Close(None)).await;
}

/// The receiving end of a socket feed. Dropping it signals the connection loop to stop the
/// operation and close the socket.
struct SocketFeed {
    events: mpsc::Receiver<Result<Value, QueryError>>,
    _shutdown: oneshot::Sender<()>
}

impl Stream for SocketFeed {
    type Item = Result<Value, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let events = &mut self.get_mut().events;
        Pin::new(events).poll_next(cx)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &self,
        request: &Request,
        context: &TransportContext
    ) -> Result<FeedStream, QueryError> {
        debug!(url = %request.url(), "connecting socket");
        let client_request = client_request(request, &context.headers)?;
        let (socket, _) = connect_async(client_request)
            .await
            .map_err(TransportError::from)?;
        let (mut write, mut read) = socket.split();

        send(&mut write, &ClientMessage::ConnectionInit {}).await?;
        tokio::time::timeout(context.ack_timeout, await_ack(&mut read))
            .await
            .map_err(|_| TransportError::AckTimeout)??;

        send(
            &mut write,
            &ClientMessage::Start {
                id: OPERATION_ID,
                payload: request.body()
            }
        )
        .await?;

        let (events_tx, events_rx) = mpsc::channel(context.capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(connection_loop(write, read, events_tx, shutdown_rx));

        Ok(SocketFeed {
            events: events_rx,
            _shutdown: shutdown_tx
        }
        .boxed())
    }
}
