use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Media server settings as read from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// WebSocket URL of the media server.
    #[serde(default)]
    pub url: String,
}

impl MediaConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Checks that the URL is present and uses a WebSocket scheme.
    ///
    /// # Errors
    ///
    /// `VoiceError::MissingServerUrl` for an empty URL,
    /// `VoiceError::InvalidServerUrl` for any other scheme.
    pub fn validate(&self) -> Result<MediaUrl, VoiceError> {
        MediaUrl::parse(&self.url)
    }
}

/// A media server URL known to start with `ws://` or `wss://`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MediaUrl(String);

impl MediaUrl {
    /// # Errors
    ///
    /// See [`MediaConfig::validate`].
    pub fn parse(raw: &str) -> Result<Self, VoiceError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(VoiceError::MissingServerUrl);
        }
        let lower = url.to_ascii_lowercase();
        let host = lower
            .strip_prefix("wss://")
            .or_else(|| lower.strip_prefix("ws://"))
            .ok_or_else(|| VoiceError::InvalidServerUrl(url.to_string()))?;
        if host.is_empty() || host.starts_with('/') {
            return Err(VoiceError::InvalidServerUrl(url.to_string()));
        }
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_secure(&self) -> bool {
        self.0
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("wss://"))
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
