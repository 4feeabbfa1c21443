mod observer;
mod presentation;
mod state;

use crate::{RequestTemplate, SubscriptionHandle, SubscriptionSource};
use observer::RefreshFn;
use parking_lot::Mutex;
use std::{
    ops::{Deref, DerefMut},
    sync::Arc
};
use tracing::{debug, warn};

pub use observer::Observer;
pub use presentation::Presentation;
pub use state::{ViewError, ViewState};

struct ActiveFeed {
    observer: Observer,
    handle: Option<SubscriptionHandle>
}

/// Binds the active lifetime of a view to exactly one subscription.
pub struct ViewController<S: SubscriptionSource> {
    source: S,
    template: RequestTemplate,
    state: Arc<Mutex<ViewState>>,
    refresh: Option<RefreshFn>,
    active: Option<ActiveFeed>
}

impl<S: SubscriptionSource> ViewController<S> {
    pub fn new(source: S, template: RequestTemplate) -> Self {
        ViewController {
            source,
            template,
            state: Arc::new(Mutex::new(ViewState::default())),
            refresh: None,
            active: None
        }
    }

    /// Called after every accepted notification, with the state lock held. The callback must
    /// not call back into the controller.
    pub fn on_refresh<F: Fn(&ViewState) + Send + Sync + 'static>(mut self, refresh: F) -> Self {
        self.refresh = Some(Arc::new(refresh));
        self
    }

    /// Build the request and subscribe. Failures are recorded in the state, never returned.
    /// Does nothing if the view is already active.
    pub fn activate(&mut self) {
        if self.active.is_some() {
            warn!("activate called on an active view");
            return;
        }

        *self.state.lock() = ViewState::default();
        let observer = Observer::attached(self.state.clone(), self.refresh.clone());

        let handle = match self.template.build() {
            Ok(request) => {
                debug!(
                    key = request.key(),
                    delivery = %request.delivery(),
                    url = %request.url(),
                    "activating view"
                );
                match self.source.subscribe(request, observer.clone()) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        debug!(error = %e, "subscription failed");
                        observer.error(e);
                        None
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "failed to build request");
                observer.error(e);
                None
            }
        };

        self.active = Some(ActiveFeed { observer, handle });
    }

    /// Release the subscription, if any. Safe to call any number of times.
    pub fn deactivate(&mut self) {
        if let Some(ActiveFeed { observer, handle }) = self.active.take() {
            observer.close();
            if let Some(handle) = handle {
                debug!(key = handle.key(), "releasing view subscription");
                handle.release();
            }
        }
    }

    /// Activate and return a guard that deactivates when it goes out of scope.
    pub fn mount(&mut self) -> Mounted<'_, S> {
        self.activate();
        Mounted { view: self }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a subscription handle is currently held.
    pub fn has_subscription(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |active| active.handle.is_some())
    }

    pub fn state(&self) -> ViewState {
        self.state.lock().clone()
    }

    pub fn presentation(&self) -> Presentation {
        Presentation::from(&*self.state.lock())
    }

    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: SubscriptionSource> Drop for ViewController<S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// An activated view. Deactivates the view when dropped.
pub struct Mounted<'a, S: SubscriptionSource> {
    view: &'a mut ViewController<S>
}

impl<'a, S: SubscriptionSource> Deref for Mounted<'a, S> {
    type Target = ViewController<S>;

    fn deref(&self) -> &Self::Target {
        self.view
    }
}

impl<'a, S: SubscriptionSource> DerefMut for Mounted<'a, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.view
    }
}

impl<'a, S: SubscriptionSource> Drop for Mounted<'a, S> {
    fn drop(&mut self) {
        self.view.deactivate();
    }
}
