use crate::{Counter, SyncCounter};
use lookout::{Observer, QueryError, Request, SubscriptionHandle, SubscriptionSource};
use parking_lot::Mutex;
use std::{io, sync::Arc};

/// A source that records every subscription and lets the test drive the observers by hand.
#[derive(Clone, Default)]
pub struct MockSource {
    inner: Arc<MockInner>
}

#[derive(Default)]
struct MockInner {
    subscriptions: Mutex<Vec<(Request, Observer)>>,
    releases: SyncCounter,
    fail_with: Option<String>
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose `subscribe` always fails with `message`.
    pub fn failing<M: Into<String>>(message: M) -> Self {
        MockSource {
            inner: Arc::new(MockInner {
                fail_with: Some(message.into()),
                ..MockInner::default()
            })
        }
    }

    /// The number of successful `subscribe` calls.
    pub fn subscriptions(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// The number of handles that have been released.
    pub fn releases(&self) -> u32 {
        Counter::get_sync(&self.inner.releases)
    }

    pub fn last_observer(&self) -> Option<Observer> {
        self.inner
            .subscriptions
            .lock()
            .last()
            .map(|(_, observer)| observer.clone())
    }

    pub fn last_request(&self) -> Option<Request> {
        self.inner
            .subscriptions
            .lock()
            .last()
            .map(|(request, _)| request.clone())
    }
}

impl SubscriptionSource for MockSource {
    fn subscribe(
        &self,
        request: Request,
        observer: Observer
    ) -> Result<SubscriptionHandle, QueryError> {
        if let Some(ref message) = self.inner.fail_with {
            return Err(io::Error::new(io::ErrorKind::Other, message.clone()).into());
        }

        let key = request.key();
        self.inner.subscriptions.lock().push((request, observer));
        let releases = self.inner.releases.clone();
        Ok(SubscriptionHandle::new(key, move || Counter::inc_sync(&releases)))
    }
}
