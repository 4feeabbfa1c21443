use std::sync::Arc;

mod builder;
mod r#impl;
mod observable;

use crate::{
    Observer, QueryError, Request, Response, SubscriptionHandle, SubscriptionSource,
    TransportError
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tracing::{debug, trace};

pub use builder::ClientBuilder;
pub use observable::Observable;
pub use r#impl::ClientImpl;

/// A GraphQL client that opens feeds over any [Delivery](../enum.Delivery.html).
#[derive(Clone)]
#[repr(transparent)]
pub struct Client(pub Arc<ClientImpl>);

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Run a request and decode its first payload. Subscriptions are closed after the first
    /// event.
    pub async fn query<T: DeserializeOwned>(
        &self,
        request: &Request
    ) -> Result<Response<T>, QueryError> {
        self.0.query(request).await
    }

    /// Open a feed for the request.
    pub async fn observe(&self, request: &Request) -> Result<Observable, QueryError> {
        self.0.observe(request).await
    }

    /// The number of feeds that are currently open.
    pub fn active_feeds(&self) -> usize {
        self.0.active_feeds()
    }
}

/// Feeds are driven by a task on the current tokio runtime. Releasing the handle aborts the
/// task, which drops the feed and closes its transport.
impl SubscriptionSource for Client {
    fn subscribe(
        &self,
        request: Request,
        observer: Observer
    ) -> Result<SubscriptionHandle, QueryError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let key = request.key();
        let client = self.0.clone();

        let task = runtime.spawn(async move {
            let mut observable = match client.observe(&request).await {
                Ok(observable) => observable,
                Err(e) => {
                    debug!(key, error = %e, "failed to open feed");
                    observer.error(e);
                    return;
                }
            };

            loop {
                match observable.next().await {
                    Some(Ok(payload)) => {
                        trace!(key, "payload received");
                        if !observer.next(payload) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(key, error = %e, "feed failed");
                        observer.error(e);
                        break;
                    }
                    None => {
                        debug!(key, "feed completed");
                        observer.complete();
                        break;
                    }
                }
            }
        });

        Ok(SubscriptionHandle::new(key, move || task.abort()))
    }
}
