use crate::{Counter, SyncCounter};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::HeaderValue,
        Message
    }
};
use tracing::debug;

/// How the server answers `connection_init`.
#[derive(Debug, Clone)]
pub enum Handshake {
    Ack,
    Reject(String),
    /// Never answer, to exercise the ack timeout.
    Silent
}

/// A `graphql-ws` server on a random loopback port. Answers `start` with a scripted list of
/// messages and records everything the client sends.
pub struct SocketServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    closed: SyncCounter,
    task: JoinHandle<()>
}

impl SocketServer {
    pub async fn start(handshake: Handshake, replies: Vec<Value>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let closed = Counter::sync();

        let task = {
            let received = received.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let handshake = handshake.clone();
                    let replies = replies.clone();
                    let received = received.clone();
                    let closed = closed.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, handshake, replies, received).await {
                            debug!(error = %e, "loopback socket failed");
                        }
                        Counter::inc_sync(&closed);
                    });
                }
            })
        };

        Ok(SocketServer {
            addr,
            received,
            closed,
            task
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Every text message received, in order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// The `type` of every message received, in order.
    pub fn received_types(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter_map(|message| message["type"].as_str().map(str::to_string))
            .collect()
    }

    /// How many connections have ended.
    pub fn closed(&self) -> u32 {
        Counter::get_sync(&self.closed)
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn select_protocol(_: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    response
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("graphql-ws"));
    Ok(response)
}

async fn serve(
    stream: TcpStream,
    handshake: Handshake,
    replies: Vec<Value>,
    received: Arc<Mutex<Vec<Value>>>
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut socket = accept_hdr_async(stream, select_protocol).await?;

    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue
        };
        let message: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        received.lock().push(message.clone());

        match message["type"].as_str() {
            Some("connection_init") => match handshake {
                Handshake::Ack => {
                    socket
                        .send(Message::Text(json!({ "type": "connection_ack" }).to_string()))
                        .await?;
                    socket
                        .send(Message::Text(json!({ "type": "ka" }).to_string()))
                        .await?;
                }
                Handshake::Reject(ref reason) => {
                    let reply = json!({ "type": "connection_error", "payload": { "message": reason } });
                    socket.send(Message::Text(reply.to_string())).await?;
                }
                Handshake::Silent => {}
            },
            Some("start") => {
                for reply in &replies {
                    socket.send(Message::Text(reply.to_string())).await?;
                }
            }
            Some("connection_terminate") => break,
            _ => {}
        }
    }

    Ok(())
}
