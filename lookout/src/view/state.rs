use crate::QueryError;
use serde::Serialize;
use serde_json::Value;

/// What a view displays. Only the view's [Observer](./struct.Observer.html) mutates this;
/// everyone else gets a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    last_payload: Option<Value>,
    is_complete: bool,
    last_error: Option<ViewError>
}

impl ViewState {
    pub fn last_payload(&self) -> Option<&Value> {
        self.last_payload.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn last_error(&self) -> Option<&ViewError> {
        self.last_error.as_ref()
    }

    /// Complete or failed. No further payloads are accepted.
    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.last_error.is_some()
    }

    pub(crate) fn set_payload(&mut self, payload: Value) {
        self.last_payload = Some(payload);
    }

    pub(crate) fn set_complete(&mut self) {
        self.is_complete = true;
    }

    pub(crate) fn set_error(&mut self, error: ViewError) {
        self.last_error = Some(error);
    }
}

/// A displayable description of an error. The message may be missing, e.g. when a server
/// reports an error without one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewError {
    pub message: Option<String>
}

impl ViewError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        let message = message.into();
        ViewError {
            message: if message.is_empty() { None } else { Some(message) }
        }
    }
}

impl From<&QueryError> for ViewError {
    fn from(e: &QueryError) -> Self {
        ViewError::new(e.to_string())
    }
}
