use thiserror::Error;

/// Failures shown to the user on the voice-agent view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Please select a child from the dashboard first.")]
    NoChildSelected,

    #[error("{0}")]
    EnvironmentMisconfigured(String),

    #[error("Failed to start session: {0}")]
    SessionStartFailed(String),

    #[error("Failed to fetch token: {0}")]
    TokenFetchFailed(String),

    #[error("{0}")]
    ConnectionLost(String),
}

impl AgentError {
    pub(crate) const CONNECTION_LOST: &'static str = "Connection lost. Please try reconnecting.";

    pub(crate) fn connection_lost() -> Self {
        Self::ConnectionLost(Self::CONNECTION_LOST.to_string())
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoChildSelected => "no_child_selected",
            Self::EnvironmentMisconfigured(_) => "environment_misconfigured",
            Self::SessionStartFailed(_) => "session_start_failed",
            Self::TokenFetchFailed(_) => "token_fetch_failed",
            Self::ConnectionLost(_) => "connection_lost",
        }
    }
}
