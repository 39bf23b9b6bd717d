//! Room access tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lle_api::{ApiClient, ApiError};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Number of `.`-separated segments in a signed token.
const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("room and identity are required to request a token")]
    InvalidRequest,

    /// The backend answered with an `error` field.
    #[error("{0}")]
    Backend(String),

    #[error("No token received from server")]
    MissingToken,

    #[error("Invalid token format received: expected 3 segments, got {segments}")]
    Malformed { segments: usize },

    #[error("token is scoped to {field} '{actual}', expected '{expected}'")]
    ScopeMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("token expired before it could be used")]
    Expired,

    #[error("failed to fetch token: {0}")]
    Request(#[from] ApiError),
}

/// Claims the client inspects when a token's payload is a readable JWT body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Participant identity.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as a Unix timestamp.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub video: Option<VideoGrant>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VideoGrant {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default, rename = "roomJoin")]
    pub room_join: bool,
}

/// A short-lived credential for joining one room as one identity.
///
/// Only constructed through [`MediaAccessToken::parse`], so every value has
/// exactly three non-empty, dot-separated segments. Never persisted, and
/// its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaAccessToken(String);

impl MediaAccessToken {
    /// # Errors
    ///
    /// `TokenError::MissingToken` for an empty string and
    /// `TokenError::Malformed` unless it splits into exactly three non-empty
    /// segments.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TokenError::MissingToken);
        }
        let segments = raw.split('.').count();
        if segments != TOKEN_SEGMENTS || raw.split('.').any(str::is_empty) {
            return Err(TokenError::Malformed { segments });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the payload segment. Returns `None` for opaque tokens whose
    /// payload is not base64url-encoded JSON.
    pub fn claims(&self) -> Option<TokenClaims> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Rejects a readable token whose grants name a different room or
    /// identity, or which has already expired. Opaque tokens pass.
    ///
    /// # Errors
    ///
    /// `TokenError::ScopeMismatch` or `TokenError::Expired`.
    pub fn check_scope(&self, room: &str, identity: &str) -> Result<(), TokenError> {
        let Some(claims) = self.claims() else {
            return Ok(());
        };
        if let Some(granted) = claims.video.as_ref().and_then(|v| v.room.as_deref()) {
            if granted != room {
                return Err(TokenError::ScopeMismatch {
                    field: "room",
                    expected: room.to_string(),
                    actual: granted.to_string(),
                });
            }
        }
        if let Some(sub) = claims.sub.as_deref() {
            if sub != identity {
                return Err(TokenError::ScopeMismatch {
                    field: "identity",
                    expected: identity.to_string(),
                    actual: sub.to_string(),
                });
            }
        }
        if let Some(exp) = claims.exp {
            if exp <= chrono::Utc::now().timestamp() {
                return Err(TokenError::Expired);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MediaAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MediaAccessToken")
            .field(&format_args!("[REDACTED; {} bytes]", self.0.len()))
            .finish()
    }
}

/// Fetches room tokens from the backend.
///
/// One request per call; nothing is retried or cached here.
#[derive(Debug, Clone)]
pub struct TokenFetcher {
    api: ApiClient,
}

impl TokenFetcher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Requests a token for `(room, identity)` and validates it.
    ///
    /// # Errors
    ///
    /// Any [`TokenError`]: an empty argument, a transport or status failure,
    /// an `error` field in the payload, a missing token, a token of the
    /// wrong shape, or one scoped to another room or identity.
    pub async fn fetch(&self, room: &str, identity: &str) -> Result<MediaAccessToken, TokenError> {
        if room.trim().is_empty() || identity.trim().is_empty() {
            return Err(TokenError::InvalidRequest);
        }
        tracing::info!(room, identity, "fetching room token");

        let response = self.api.media_token(room, identity).await?;
        tracing::debug!(
            has_token = response.token.is_some(),
            has_error = response.error.is_some(),
            source = response.source.as_deref().unwrap_or("unknown"),
            "token response received"
        );

        if let Some(error) = response.error {
            return Err(TokenError::Backend(error));
        }
        let raw = response.token.ok_or(TokenError::MissingToken)?;
        let token = MediaAccessToken::parse(&raw)?;
        token.check_scope(room, identity)?;
        Ok(token)
    }
}
