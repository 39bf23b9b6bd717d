use crate::error::ApiError;
use lle_store::LocalStore;
use lle_types::{AuthTokens, Paginated, RefreshRequest, RefreshResponse};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest backend error text carried into an [`ApiError::Status`].
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

const REFRESH_PATH: &str = "auth/token/refresh/";

fn default_timeout_secs() -> u64 {
    15
}

/// Connection settings for the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A request description that can be sent more than once.
pub(crate) struct Call {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
}

/// List endpoints answer either with a page envelope or a bare array
/// depending on backend pagination settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Page(Paginated<T>),
    Bare(Vec<T>),
}

/// Authenticated client for the LLE REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: LocalStore,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::BaseUrl` if `config.base_url` is not an absolute
    /// http(s) URL, or `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, store: LocalStore) -> Result<Self, ApiError> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ApiError::BaseUrl(format!("{base}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::BaseUrl(format!(
                "{base}: scheme must be http or https"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::BaseUrl(format!("{path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub(crate) fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Call, ApiError> {
        Ok(Call {
            method,
            url: self.url(path, query)?,
            body: None,
        })
    }

    pub(crate) fn call_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Call, ApiError> {
        Ok(Call {
            method,
            url: self.url(path, &[])?,
            body: Some(serde_json::to_vec(body)?),
        })
    }

    async fn send_once(
        &self,
        call: &Call,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.http.request(call.method.clone(), call.url.clone());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &call.body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }
        Ok(request.send().await?)
    }

    /// Sends `call` without credentials or refresh handling.
    pub(crate) async fn send_anonymous(&self, call: &Call) -> Result<reqwest::Response, ApiError> {
        self.send_once(call, None).await
    }

    /// Sends `call` with the stored bearer token, refreshing once on `401`.
    ///
    /// Returns the raw response for any status other than `401`.
    pub(crate) async fn send(&self, call: &Call) -> Result<reqwest::Response, ApiError> {
        let access = self.store.access_token()?;
        tracing::debug!(
            method = %call.method,
            url = %call.url,
            authenticated = access.is_some(),
            "sending API request"
        );
        let response = self.send_once(call, access.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(refresh) = self.store.refresh_token()? else {
            tracing::info!(url = %call.url, "request unauthorized and no refresh token stored");
            self.drop_credentials();
            return Err(ApiError::Unauthorized);
        };

        let access = match self.refresh_with(&refresh).await {
            Ok(tokens) => tokens.access,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, clearing credentials");
                self.drop_credentials();
                return Err(ApiError::Unauthorized);
            }
        };

        let retried = self.send_once(call, Some(&access)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.drop_credentials();
            return Err(ApiError::Unauthorized);
        }
        Ok(retried)
    }

    /// Exchanges `refresh` for a new access token and persists the pair.
    ///
    /// The old refresh token is kept when the backend does not rotate it.
    pub(crate) async fn refresh_with(&self, refresh: &str) -> Result<AuthTokens, ApiError> {
        let call = self.call_with_body(
            Method::POST,
            REFRESH_PATH,
            &RefreshRequest {
                refresh: refresh.to_string(),
            },
        )?;
        let response = self.send_anonymous(&call).await?;
        let body: RefreshResponse = decode(response).await?;
        let tokens = AuthTokens {
            access: body.access,
            refresh: body.refresh.unwrap_or_else(|| refresh.to_string()),
        };
        self.store.save_tokens(&tokens)?;
        tracing::debug!("access token refreshed");
        Ok(tokens)
    }

    fn drop_credentials(&self) {
        if let Err(e) = self.store.clear_tokens() {
            tracing::warn!(error = %e, "failed to clear stored credentials");
        }
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(&self, call: &Call) -> Result<T, ApiError> {
        let response = self.send(call).await?;
        decode(response).await
    }

    pub(crate) async fn send_list<T: DeserializeOwned>(
        &self,
        call: &Call,
    ) -> Result<Paginated<T>, ApiError> {
        let body: ListBody<T> = self.send_json(call).await?;
        Ok(match body {
            ListBody::Page(page) => page,
            ListBody::Bare(results) => Paginated {
                count: results.len() as u64,
                results,
                ..Paginated::default()
            },
        })
    }

    pub(crate) async fn send_empty(&self, call: &Call) -> Result<(), ApiError> {
        let response = self.send(call).await?;
        ensure_success(response).await.map(|_| ())
    }
}

/// Turns a non-success response into [`ApiError::Status`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let text = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&text),
    })
}

pub(crate) async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extracts a readable message from a backend error body.
///
/// Looks for the `error`, `detail` and `message` keys used by the backend,
/// falling back to the (truncated) raw text.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(serde_json::Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no error details".to_string();
    }
    trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> Result<ApiClient, ApiError> {
        ApiClient::new(&ApiConfig::new(base), LocalStore::in_memory().unwrap())
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let api = client("http://localhost:8000/api").unwrap();
        let url = api.url("/children/", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/children/");
    }

    #[test]
    fn query_is_encoded() {
        let api = client("http://localhost:8000/api/").unwrap();
        let url = api
            .url("livekit-token/", &[("room", "child a"), ("identity", "x&y")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/livekit-token/?room=child+a&identity=x%26y"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(client("ftp://host/api"), Err(ApiError::BaseUrl(_))));
        assert!(matches!(client("not a url"), Err(ApiError::BaseUrl(_))));
    }

    #[test]
    fn error_message_prefers_backend_fields() {
        assert_eq!(error_message(r#"{"error": "boom"}"#), "boom");
        assert_eq!(error_message(r#"{"detail": "nope"}"#), "nope");
        assert_eq!(error_message("plain text"), "plain text");
        assert_eq!(error_message(""), "no error details");
        assert_eq!(error_message(&"x".repeat(1000)).len(), MAX_ERROR_MESSAGE_CHARS);
    }
}
