use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("media server URL not configured, set LLE_MEDIA_URL or [media].url")]
    MissingServerUrl,

    #[error("invalid media server URL '{0}', must start with wss:// or ws://")]
    InvalidServerUrl(String),

    #[error("failed to join room: {0}")]
    Connect(String),
}
