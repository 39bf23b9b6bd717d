use crate::error::AgentError;

/// The room a view ended up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedRoom {
    pub session_id: i64,
    pub room: String,
    pub identity: String,
}

/// What the voice-agent view is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    NoChildSelected,
    Validating,
    Starting,
    Connected(ConnectedRoom),
    Error(AgentError),
}

impl ViewState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoChildSelected => "no_child_selected",
            Self::Validating => "validating",
            Self::Starting => "starting",
            Self::Connected(_) => "connected",
            Self::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// User actions offered alongside a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Retry,
    BackToDashboard,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Self::Retry => "Try Again",
            Self::BackToDashboard => "Back to Dashboard",
        }
    }
}

/// Text and actions for one [`ViewState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub title: &'static str,
    pub message: String,
    pub actions: Vec<Action>,
}

pub fn present(state: &ViewState) -> Presentation {
    match state {
        ViewState::NoChildSelected => Presentation {
            title: "No Child Selected",
            message: AgentError::NoChildSelected.to_string(),
            actions: vec![Action::BackToDashboard],
        },
        ViewState::Validating | ViewState::Starting => Presentation {
            title: "Starting Your Speech Session",
            message: "Connecting you with your AI speech therapist...".to_string(),
            actions: vec![Action::BackToDashboard],
        },
        ViewState::Connected(_) => Presentation {
            title: "Connected",
            message: "Your AI speech therapist is ready to help you!".to_string(),
            actions: vec![Action::BackToDashboard],
        },
        ViewState::Error(e) => Presentation {
            title: "Connection Error",
            message: e.to_string(),
            actions: vec![Action::Retry, Action::BackToDashboard],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_errors_offer_retry() {
        let states = [
            ViewState::NoChildSelected,
            ViewState::Validating,
            ViewState::Starting,
            ViewState::Connected(ConnectedRoom {
                session_id: 1,
                room: "r".into(),
                identity: "me".into(),
            }),
        ];
        for state in &states {
            assert!(!present(state).actions.contains(&Action::Retry), "{state:?}");
        }

        let failed = present(&ViewState::Error(AgentError::connection_lost()));
        assert_eq!(failed.actions, vec![Action::Retry, Action::BackToDashboard]);
        assert_eq!(failed.message, "Connection lost. Please try reconnecting.");
    }

    #[test]
    fn error_message_carries_the_cause() {
        let p = present(&ViewState::Error(AgentError::TokenFetchFailed(
            "No token received from server".into(),
        )));
        assert_eq!(p.title, "Connection Error");
        assert_eq!(p.message, "Failed to fetch token: No token received from server");
    }
}
