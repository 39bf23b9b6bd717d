//! Media access token endpoint.

use crate::client::{error_message, ApiClient};
use crate::error::ApiError;
use reqwest::Method;
use serde::Deserialize;

/// Raw body of `GET /livekit-token/`.
///
/// Shape checks on `token` belong to the caller.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    /// Where the backend got the token from (`cache` or `generated`).
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("has_token", &self.token.is_some())
            .field("source", &self.source)
            .field("error", &self.error)
            .finish()
    }
}

impl ApiClient {
    /// Requests a room token for `(room, identity)`.
    ///
    /// Error statuses whose body still carries an `error` field are returned
    /// as a `TokenResponse` so the caller sees the backend's reason.
    pub async fn media_token(&self, room: &str, identity: &str) -> Result<TokenResponse, ApiError> {
        let call = self.call(
            Method::GET,
            "livekit-token/",
            &[("room", room), ("identity", identity)],
        )?;
        let response = self.send(&call).await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }
        match serde_json::from_str::<TokenResponse>(&text) {
            Ok(body) if body.error.is_some() => Ok(body),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            }),
        }
    }
}
