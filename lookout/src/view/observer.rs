use super::{ViewError, ViewState};
use crate::{Notification, QueryError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};
use tracing::{trace, warn};

pub(crate) type RefreshFn = Arc<dyn Fn(&ViewState) + Send + Sync>;

/// The receiving end of a feed.
///
/// Sources call [next](#method.next), [complete](#method.complete) and [error](#method.error)
/// from whichever task they run on. Deliveries are serialized through the view's state lock.
/// Once the observer is closed, or the state is terminal, deliveries are discarded and the
/// methods return `false`.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>
}

struct ObserverInner {
    state: Arc<Mutex<ViewState>>,
    closed: AtomicBool,
    refresh: Option<RefreshFn>
}

impl Observer {
    /// An observer with its own state and no refresh hook.
    pub fn new() -> Self {
        Observer::attached(Arc::new(Mutex::new(ViewState::default())), None)
    }

    pub(crate) fn attached(state: Arc<Mutex<ViewState>>, refresh: Option<RefreshFn>) -> Self {
        Observer {
            inner: Arc::new(ObserverInner {
                state,
                closed: AtomicBool::new(false),
                refresh
            })
        }
    }

    pub fn notify(&self, notification: Notification) -> bool {
        let mut state = self.inner.state.lock();
        if self.is_closed() {
            trace!(?notification, "discarding notification after release");
            return false;
        }
        if state.is_terminal() {
            warn!(?notification, "discarding notification after terminal state");
            return false;
        }

        match notification {
            Notification::Next(payload) => state.set_payload(payload),
            Notification::Complete => state.set_complete(),
            Notification::Error(e) => state.set_error(ViewError::from(&e))
        }

        if let Some(ref refresh) = self.inner.refresh {
            refresh(&state);
        }
        true
    }

    pub fn next(&self, payload: Value) -> bool {
        self.notify(Notification::Next(payload))
    }

    pub fn complete(&self) -> bool {
        self.notify(Notification::Complete)
    }

    pub fn error<E: Into<QueryError>>(&self, error: E) -> bool {
        self.notify(Notification::Error(error.into()))
    }

    /// Whether the feed has been released. Sources may use this to stop early.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// A snapshot of the observed state.
    pub fn state(&self) -> ViewState {
        self.inner.state.lock().clone()
    }

    /// Taking the state lock means any delivery already past the closed check finishes
    /// first, and none can start afterwards.
    pub(crate) fn close(&self) {
        let _state = self.inner.state.lock();
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

impl Default for Observer {
    fn default() -> Self {
        Observer::new()
    }
}
