use crate::{SubscriptionSource, ViewController};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Anything with an activation lifetime that a [Router](./struct.Router.html) can switch between.
pub trait View: Send {
    fn activate(&mut self);
    fn deactivate(&mut self);
    fn is_active(&self) -> bool;
}

impl<S: SubscriptionSource> View for ViewController<S> {
    fn activate(&mut self) {
        ViewController::activate(self)
    }

    fn deactivate(&mut self) {
        ViewController::deactivate(self)
    }

    fn is_active(&self) -> bool {
        ViewController::is_active(self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no view is registered for route `{0}`")]
    UnknownRoute(String)
}

/// Selects which of its views is active. At most one view is active at a time, and the
/// current view is always deactivated before the next one is activated.
#[derive(Default)]
pub struct Router {
    views: HashMap<String, Box<dyn View>>,
    current: Option<String>
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Register a view. Replacing the current route deactivates the view it replaces.
    pub fn route<N: Into<String>, V: View + 'static>(mut self, name: N, view: V) -> Self {
        let name = name.into();
        if self.current.as_ref() == Some(&name) {
            self.shutdown();
        }
        self.views.insert(name, Box::new(view));
        self
    }

    pub fn navigate(&mut self, name: &str) -> Result<(), RouteError> {
        if !self.views.contains_key(name) {
            return Err(RouteError::UnknownRoute(name.to_string()));
        }
        if self.current.as_deref() == Some(name) {
            return Ok(());
        }

        self.shutdown();
        debug!(route = name, "navigating");
        if let Some(view) = self.views.get_mut(name) {
            view.activate();
            self.current = Some(name.to_string());
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn view(&self, name: &str) -> Option<&dyn View> {
        self.views.get(name).map(|view| view.as_ref())
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Deactivate the current view, if any.
    pub fn shutdown(&mut self) {
        if let Some(name) = self.current.take() {
            debug!(route = %name, "leaving route");
            if let Some(view) = self.views.get_mut(&name) {
                view.deactivate();
            }
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::{RouteError, Router, View};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Page {
        name: &'static str,
        active: bool,
        log: Log
    }

    impl View for Page {
        fn activate(&mut self) {
            self.active = true;
            self.log.lock().push(format!("+{}", self.name));
        }

        fn deactivate(&mut self) {
            self.active = false;
            self.log.lock().push(format!("-{}", self.name));
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn page(name: &'static str, log: &Log) -> Page {
        Page {
            name,
            active: false,
            log: log.clone()
        }
    }

    #[test]
    fn switches_views_in_order() {
        let log = Log::default();
        let mut router = Router::new()
            .route("query", page("query", &log))
            .route("socket", page("socket", &log));

        router.navigate("query").unwrap();
        router.navigate("socket").unwrap();
        assert_eq!(router.current(), Some("socket"));
        assert!(router.view("socket").unwrap().is_active());
        assert!(!router.view("query").unwrap().is_active());
        assert_eq!(*log.lock(), vec!["+query", "-query", "+socket"]);
    }

    #[test]
    fn navigating_to_the_current_route_is_a_noop() {
        let log = Log::default();
        let mut router = Router::new().route("query", page("query", &log));
        router.navigate("query").unwrap();
        router.navigate("query").unwrap();
        assert_eq!(*log.lock(), vec!["+query"]);
    }

    #[test]
    fn unknown_routes_leave_the_current_view_alone() {
        let log = Log::default();
        let mut router = Router::new().route("query", page("query", &log));
        router.navigate("query").unwrap();
        assert_eq!(
            router.navigate("missing"),
            Err(RouteError::UnknownRoute("missing".to_string()))
        );
        assert_eq!(router.current(), Some("query"));
    }

    #[test]
    fn drop_deactivates_the_current_view() {
        let log = Log::default();
        {
            let mut router = Router::new().route("query", page("query", &log));
            router.navigate("query").unwrap();
        }
        assert_eq!(*log.lock(), vec!["+query", "-query"]);
    }
}
