use crate::{view::Observer, QueryError, Request};
use serde_json::Value;
use std::fmt;
use tracing::trace;

/// A single event delivered by a feed.
#[derive(Debug, Clone)]
pub enum Notification {
    Next(Value),
    Complete,
    Error(QueryError)
}

/// Something that can open a data feed for a request.
///
/// Implementations deliver every event to the observer they are given and return a handle
/// that stops the feed when released. Events delivered after the observer has been closed
/// are dropped by the observer itself, so a source doesn't need to synchronize its release
/// with deliveries that are already in flight.
pub trait SubscriptionSource: Send + Sync + 'static {
    fn subscribe(
        &self,
        request: Request,
        observer: Observer
    ) -> Result<SubscriptionHandle, QueryError>;
}

impl<S: SubscriptionSource + ?Sized> SubscriptionSource for std::sync::Arc<S> {
    fn subscribe(
        &self,
        request: Request,
        observer: Observer
    ) -> Result<SubscriptionHandle, QueryError> {
        (**self).subscribe(request, observer)
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// An open feed. Releasing consumes the handle, and a handle that is dropped without being
/// released releases itself.
pub struct SubscriptionHandle {
    key: u64,
    release: Option<ReleaseFn>
}

impl SubscriptionHandle {
    pub fn new<F: FnOnce() + Send + 'static>(key: u64, release: F) -> Self {
        SubscriptionHandle {
            key,
            release: Some(Box::new(release))
        }
    }

    /// A handle with nothing to release, for feeds that finish on their own.
    pub fn noop(key: u64) -> Self {
        SubscriptionHandle { key, release: None }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(release) = self.release.take() {
            trace!(key = self.key, "releasing subscription handle");
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::SubscriptionHandle;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc
    };

    #[test]
    fn releases_once_when_released_explicitly() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = {
            let count = count.clone();
            SubscriptionHandle::new(1, move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        handle.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn releases_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            let _handle = SubscriptionHandle::new(1, move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
