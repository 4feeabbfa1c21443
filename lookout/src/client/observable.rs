use crate::{client::ClientImpl, transports::FeedStream, Delivery, QueryError};
use futures::{
    task::{Context, Poll},
    Stream
};
use serde_json::Value;
use std::{fmt, pin::Pin, sync::Arc};

/// A registered entry in the client's feed list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeedEntry {
    pub key: u64,
    pub delivery: Delivery
}

/// An open feed. Yields payloads until the feed completes; an `Err` item is the last one.
///
/// The feed stays registered with its client until this is dropped, at which point the
/// transport is torn down.
pub struct Observable {
    inner: FeedStream,
    client: Arc<ClientImpl>,
    key: u64,
    index: usize
}

impl Observable {
    pub(crate) fn new(key: u64, inner: FeedStream, client: Arc<ClientImpl>, index: usize) -> Self {
        Observable {
            inner,
            client,
            key,
            index
        }
    }

    /// The key of the request this feed was opened for.
    pub fn key(&self) -> u64 {
        self.key
    }
}

impl Stream for Observable {
    type Item = Result<Value, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = &mut self.get_mut().inner;
        inner.as_mut().poll_next(cx)
    }
}

impl Drop for Observable {
    fn drop(&mut self) {
        self.client.clear_feed(self.key, self.index)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("key", &self.key)
            .field("index", &self.index)
            .finish()
    }
}
