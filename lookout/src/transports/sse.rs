use super::{ensure_success, with_headers, FeedStream, Transport, TransportContext};
use crate::{HeaderPair, QueryError, Request, TransportError};
use futures::{
    stream::{self, BoxStream},
    StreamExt
};
use serde_json::Value;
use std::{collections::VecDeque, mem};
use tracing::{debug, trace, warn};
use url::Url;

/// Longest line the parser buffers while waiting for its newline.
pub(crate) const MAX_LINE: usize = 1 << 20;

/// Opens a server-sent event stream with the query encoded into the URL.
pub(crate) struct EventSourceTransport;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Event {
    pub event: String,
    pub data: String
}

/// Incremental parser for `text/event-stream` bodies. Chunks may split lines anywhere.
#[derive(Debug, Default)]
pub(crate) struct EventStreamParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>
}

impl EventStreamParser {
    /// Feed the next chunk of the body. Only the new bytes are scanned for line ends, and a
    /// line longer than [MAX_LINE](constant.MAX_LINE.html) fails the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Event>, TransportError> {
        let mut search = self.buffer.len();
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[search..].iter().position(|byte| *byte == b'\n') {
            let end = search + offset;
            let mut line = &self.buffer[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(event) = self.line(&line) {
                events.push(event);
            }
            start = end + 1;
            search = start;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE {
            warn!(bytes = self.buffer.len(), "event stream line too long");
            self.buffer.clear();
            return Err(TransportError::Protocol(format!(
                "event stream line exceeds {} bytes",
                MAX_LINE
            )));
        }
        Ok(events)
    }

    /// Reset once the body ends. An event without its closing blank line is dropped, as a
    /// browser would.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "discarding unterminated line");
            self.buffer.clear();
        }
        self.event = None;
        self.data.clear();
    }

    fn line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, "")
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => trace!(field, "ignoring event stream field")
        }
        None
    }

    fn dispatch(&mut self) -> Option<Event> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = mem::take(&mut self.data).join("\n");
        Some(Event {
            event: event.unwrap_or_else(|| "message".to_string()),
            data
        })
    }
}

/// `message` events carry a payload, `ping` events are keep-alives.
fn decode(event: Event) -> Result<Option<Value>, TransportError> {
    match event.event.as_str() {
        "message" => Ok(Some(serde_json::from_str(&event.data)?)),
        "ping" => {
            trace!(data = %event.data, "ping");
            Ok(None)
        }
        other => {
            trace!(event = other, "ignoring unknown event");
            Ok(None)
        }
    }
}

struct EventStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: EventStreamParser,
    pending: VecDeque<Event>,
    ended: bool
}

impl EventStream {
    async fn next_payload(&mut self) -> Option<Result<Value, QueryError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                match decode(event) {
                    Ok(Some(payload)) => return Some(Ok(payload)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.ended = true;
                        self.pending.clear();
                        return Some(Err(e.into()));
                    }
                }
            }
            if self.ended {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => match self.parser.push(&chunk) {
                    Ok(events) => self.pending.extend(events),
                    Err(e) => {
                        self.ended = true;
                        return Some(Err(e.into()));
                    }
                },
                Some(Err(e)) => {
                    self.ended = true;
                    return Some(Err(TransportError::from(e).into()));
                }
                None => {
                    self.ended = true;
                    self.parser.finish();
                }
            }
        }
    }
}

pub(crate) fn event_stream(response: reqwest::Response) -> FeedStream {
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed();
    let state = EventStream {
        body,
        parser: EventStreamParser::default(),
        pending: VecDeque::new(),
        ended: false
    };

    stream::unfold(state, |mut state| async move {
        if state.ended && state.pending.is_empty() {
            return None;
        }
        let item = state.next_payload().await?;
        Some((item, state))
    })
    .boxed()
}

/// `GET` an event stream and turn it into a feed.
pub(crate) async fn connect(
    http: &reqwest::Client,
    url: Url,
    headers: &[HeaderPair]
) -> Result<FeedStream, QueryError> {
    let builder = with_headers(
        http.get(url),
        headers,
        &[("Accept", "text/event-stream"), ("Cache-Control", "no-cache")]
    );

    let response = builder.send().await.map_err(TransportError::from)?;
    let response = ensure_success(response).await?;
    Ok(event_stream(response))
}

/// Every field is JSON-encoded, the query text included.
fn subscription_url(request: &Request) -> Url {
    let body = request.body();
    let mut url = request.url().clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("query", &Value::String(body.query.clone()).to_string());
        if let Some(ref variables) = body.variables {
            pairs.append_pair("variables", &Value::Object(variables.clone()).to_string());
        }
        if let Some(ref operation_name) = body.operation_name {
            pairs.append_pair(
                "operationName",
                &Value::String(operation_name.clone()).to_string()
            );
        }
    }
    url
}

#[async_trait]
impl Transport for EventSourceTransport {
    async fn open(
        &self,
        request: &Request,
        context: &TransportContext
    ) -> Result<FeedStream, QueryError> {
        let url = subscription_url(request);
        debug!(%url, "opening event source");
        connect(&context.http, url, &context.headers).await
    }
}
