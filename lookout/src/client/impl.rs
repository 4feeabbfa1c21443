use crate::{
    client::observable::{FeedEntry, Observable},
    transports::{self, TransportContext},
    HeaderFn, HeaderPair, QueryError, Request, Response, TransportError
};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use stable_vec::StableVec;
use std::{sync::Arc, time::Duration};
use tracing::{debug, trace};

pub struct ClientImpl {
    pub(crate) http: reqwest::Client,
    pub(crate) extra_headers: Option<HeaderFn>,
    pub(crate) capacity: usize,
    pub(crate) ack_timeout: Duration,
    pub(crate) active_feeds: Arc<Mutex<StableVec<FeedEntry>>>
}

impl ClientImpl {
    pub(crate) fn clear_feed(&self, key: u64, index: usize) {
        let mut feeds = self.active_feeds.lock();
        if feeds.remove(index).is_some() {
            trace!(key, index, remaining = feeds.num_elements(), "feed closed");
        }
    }

    /// The number of feeds that are currently open.
    pub fn active_feeds(&self) -> usize {
        self.active_feeds.lock().num_elements()
    }

    /// Client headers go first so a request can override them.
    fn context(&self, request: &Request) -> TransportContext {
        let mut headers: Vec<HeaderPair> = self
            .extra_headers
            .as_ref()
            .map(|header_fn| header_fn())
            .unwrap_or_default();
        headers.extend(request.headers().iter().cloned());

        TransportContext {
            http: self.http.clone(),
            headers,
            capacity: self.capacity,
            ack_timeout: self.ack_timeout
        }
    }

    pub async fn observe(self: &Arc<Self>, request: &Request) -> Result<Observable, QueryError> {
        let context = self.context(request);
        let stream = transports::open(request, &context).await?;

        let index = self.active_feeds.lock().push(FeedEntry {
            key: request.key(),
            delivery: request.delivery()
        });
        debug!(key = request.key(), index, delivery = %request.delivery(), "feed opened");

        Ok(Observable::new(request.key(), stream, self.clone(), index))
    }

    pub async fn query<T: DeserializeOwned>(
        self: &Arc<Self>,
        request: &Request
    ) -> Result<Response<T>, QueryError> {
        let mut observable = self.observe(request).await?;
        let payload = observable.next().await.ok_or(TransportError::Closed)??;
        let response = serde_json::from_value(payload).map_err(TransportError::from)?;
        Ok(response)
    }
}
