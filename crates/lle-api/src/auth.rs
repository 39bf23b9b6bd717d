//! Login, registration, refresh and logout.

use crate::client::{decode, ensure_success, ApiClient};
use crate::error::ApiError;
use lle_types::{AuthTokens, LoginRequest, RegisterRequest};
use reqwest::Method;

impl ApiClient {
    /// Exchanges credentials for a token pair and stores it.
    ///
    /// # Errors
    ///
    /// `ApiError::Status` with the backend's message for bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let call = self.call_with_body(
            Method::POST,
            "auth/login/",
            &LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            },
        )?;
        let response = self.send_anonymous(&call).await?;
        let tokens: AuthTokens = decode(response).await?;
        self.store().save_tokens(&tokens)?;
        tracing::info!(username, "logged in");
        Ok(tokens)
    }

    /// Creates a parent account with its first child, then logs in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthTokens, ApiError> {
        request.validate()?;
        let call = self.call_with_body(Method::POST, "auth/register/", request)?;
        let response = self.send_anonymous(&call).await?;
        ensure_success(response).await?;
        tracing::info!(username = %request.username, "registered account");
        self.login(&request.username, &request.password).await
    }

    /// Refreshes the access token using the stored refresh token.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthorized` when no refresh token is stored.
    pub async fn refresh(&self) -> Result<AuthTokens, ApiError> {
        let refresh = self
            .store()
            .refresh_token()?
            .ok_or(ApiError::Unauthorized)?;
        self.refresh_with(&refresh).await
    }

    /// Forgets stored credentials. Never fails: a store error is logged and
    /// the client behaves as logged out.
    pub fn logout(&self) {
        if let Err(e) = self.store().clear_tokens() {
            tracing::warn!(error = %e, "failed to clear credentials on logout");
        } else {
            tracing::info!("logged out");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.store().access_token(), Ok(Some(_)))
    }
}
