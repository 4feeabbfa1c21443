use super::ViewState;
use std::fmt;

/// The text a view renders for its current state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub payload: String,
    pub complete: String,
    pub error: String
}

impl From<&ViewState> for Presentation {
    fn from(state: &ViewState) -> Self {
        let payload = state
            .last_payload()
            .map(|payload| serde_json::to_string_pretty(payload).unwrap_or_default())
            .unwrap_or_default();
        let error = state
            .last_error()
            .and_then(|error| error.message.clone())
            .unwrap_or_default();

        Presentation {
            payload,
            complete: state.is_complete().to_string(),
            error
        }
    }
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "response: {}", self.payload)?;
        writeln!(f, "complete: {}", self.complete)?;
        write!(f, "error: {}", self.error)
    }
}

#[cfg(test)]
mod test {
    use super::Presentation;
    use crate::{view::ViewError, ViewState};
    use serde_json::json;

    #[test]
    fn renders_empty_state() {
        let presentation = Presentation::from(&ViewState::default());
        assert_eq!(presentation.payload, "");
        assert_eq!(presentation.complete, "false");
        assert_eq!(presentation.error, "");
    }

    #[test]
    fn renders_payload_and_flags() {
        let mut state = ViewState::default();
        state.set_payload(json!({ "cpu": 42 }));
        state.set_complete();
        let presentation = Presentation::from(&state);
        assert_eq!(presentation.payload, "{\n  \"cpu\": 42\n}");
        assert_eq!(presentation.complete, "true");
        assert_eq!(
            presentation.to_string(),
            "response: {\n  \"cpu\": 42\n}\ncomplete: true\nerror: "
        );
    }

    #[test]
    fn renders_error_without_message() {
        let mut state = ViewState::default();
        state.set_error(ViewError::default());
        assert_eq!(Presentation::from(&state).error, "");

        let mut state = ViewState::default();
        state.set_error(ViewError::new("socket closed"));
        assert_eq!(Presentation::from(&state).error, "socket closed");
    }
}
