use crate::error::AgentError;
use lle_api::{ApiClient, ApiError};
use lle_types::{Child, SessionStart};
use lle_voice::{MediaAccessToken, TokenError, TokenFetcher};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Backend session lifecycle, as needed by the voice-agent view.
pub trait SessionApi: Send + Sync + 'static {
    fn start_session(
        &self,
        child_id: Uuid,
    ) -> impl Future<Output = Result<SessionStart, ApiError>> + Send;

    fn end_session(&self, session_id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Source of validated room tokens.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch_token(
        &self,
        room: &str,
        identity: &str,
    ) -> impl Future<Output = Result<MediaAccessToken, TokenError>> + Send;
}

impl SessionApi for ApiClient {
    async fn start_session(&self, child_id: Uuid) -> Result<SessionStart, ApiError> {
        ApiClient::start_session(self, child_id).await
    }

    async fn end_session(&self, session_id: i64) -> Result<(), ApiError> {
        ApiClient::end_session(self, session_id).await
    }
}

impl TokenSource for TokenFetcher {
    async fn fetch_token(&self, room: &str, identity: &str) -> Result<MediaAccessToken, TokenError> {
        self.fetch(room, identity).await
    }
}

/// Starts a session for a child and obtains the token for its room.
///
/// Session creation is latched: once `start` has been entered, further
/// calls are skipped until [`reset`](Self::reset).
#[derive(Debug)]
pub struct SessionInitializer<S, T> {
    sessions: Arc<S>,
    tokens: Arc<T>,
    started: AtomicBool,
}

impl<S: SessionApi, T: TokenSource> SessionInitializer<S, T> {
    pub fn new(sessions: Arc<S>, tokens: Arc<T>) -> Self {
        Self {
            sessions,
            tokens,
            started: AtomicBool::new(false),
        }
    }

    pub fn sessions(&self) -> &Arc<S> {
        &self.sessions
    }

    /// Requests a new session for `child`.
    ///
    /// Returns `Ok(None)` without touching the backend when a start has
    /// already been issued since the last reset.
    ///
    /// # Errors
    ///
    /// `AgentError::SessionStartFailed` with the backend's reason. A session
    /// acknowledged without a room is ended here before the error returns.
    pub async fn start(&self, child: &Child) -> Result<Option<SessionStart>, AgentError> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(child_id = %child.id, "session already initialized, skipping");
            return Ok(None);
        }
        tracing::info!(child_id = %child.id, "starting session");
        match self.sessions.start_session(child.id).await {
            Ok(start) if start.livekit_room.trim().is_empty() => {
                tracing::warn!(session_id = start.session_id, "session acknowledged without a room");
                if let Err(e) = self.sessions.end_session(start.session_id).await {
                    tracing::warn!(session_id = start.session_id, error = %e, "failed to end roomless session");
                }
                Err(AgentError::SessionStartFailed("backend returned no room".to_string()))
            }
            Ok(start) => Ok(Some(start)),
            Err(e) => {
                tracing::warn!(child_id = %child.id, error = %e, "session start failed");
                Err(AgentError::SessionStartFailed(e.to_string()))
            }
        }
    }

    /// Fetches the token for the room acknowledged by `start`.
    ///
    /// # Errors
    ///
    /// `AgentError::TokenFetchFailed`, including for malformed tokens.
    pub async fn fetch_token(
        &self,
        start: &SessionStart,
        identity: &str,
    ) -> Result<MediaAccessToken, AgentError> {
        self.tokens
            .fetch_token(&start.livekit_room, identity)
            .await
            .map_err(|e| {
                tracing::warn!(room = %start.livekit_room, error = %e, "token fetch failed");
                AgentError::TokenFetchFailed(e.to_string())
            })
    }

    /// Clears the latch so the next `start` reaches the backend again.
    pub fn reset(&self) {
        self.started.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lle_types::NativeLanguage;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSessions {
        starts: AtomicUsize,
        fail: bool,
        no_room: bool,
        ended: Mutex<Vec<i64>>,
    }

    impl SessionApi for CountingSessions {
        async fn start_session(&self, child_id: Uuid) -> Result<SessionStart, ApiError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Status {
                    status: 400,
                    message: "Authenticated user does not have a child profile.".into(),
                });
            }
            Ok(SessionStart {
                session_id: 1,
                livekit_room: if self.no_room { " ".into() } else { "room-1".into() },
                child_id,
                started_at: Utc::now(),
            })
        }

        async fn end_session(&self, session_id: i64) -> Result<(), ApiError> {
            self.ended.lock().unwrap().push(session_id);
            Ok(())
        }
    }

    struct StaticTokens(&'static str);

    impl TokenSource for StaticTokens {
        async fn fetch_token(&self, _room: &str, _identity: &str) -> Result<MediaAccessToken, TokenError> {
            MediaAccessToken::parse(self.0)
        }
    }

    fn child() -> Child {
        Child {
            id: Uuid::new_v4(),
            parent: None,
            name: "Ava".into(),
            age: 4,
            native_language: NativeLanguage::English,
            conversation_prompt: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_is_latched_until_reset() {
        let sessions = Arc::new(CountingSessions::default());
        let init = SessionInitializer::new(sessions.clone(), Arc::new(StaticTokens("a.b.c")));
        let child = child();

        assert!(init.start(&child).await.unwrap().is_some());
        assert!(init.start(&child).await.unwrap().is_none());
        assert_eq!(sessions.starts.load(Ordering::SeqCst), 1);

        init.reset();
        assert!(init.start(&child).await.unwrap().is_some());
        assert_eq!(sessions.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_failure_is_reported() {
        let sessions = Arc::new(CountingSessions {
            fail: true,
            ..Default::default()
        });
        let init = SessionInitializer::new(sessions, Arc::new(StaticTokens("a.b.c")));
        let err = init.start(&child()).await.unwrap_err();
        assert_eq!(err.kind(), "session_start_failed");
        assert!(err.to_string().contains("does not have a child profile"));
    }

    #[tokio::test]
    async fn roomless_acknowledgment_ends_its_session() {
        let sessions = Arc::new(CountingSessions {
            no_room: true,
            ..Default::default()
        });
        let init = SessionInitializer::new(sessions.clone(), Arc::new(StaticTokens("a.b.c")));

        let err = init.start(&child()).await.unwrap_err();
        assert_eq!(
            err,
            AgentError::SessionStartFailed("backend returned no room".into())
        );
        assert_eq!(*sessions.ended.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn malformed_token_is_a_token_failure() {
        let sessions = Arc::new(CountingSessions::default());
        let init = SessionInitializer::new(sessions, Arc::new(StaticTokens("not-a-token")));
        let child = child();
        let start = init.start(&child).await.unwrap().unwrap();

        let err = init.fetch_token(&start, &child.identity()).await.unwrap_err();
        assert_eq!(err.kind(), "token_fetch_failed");
        assert!(err.to_string().contains("Invalid token format"));
    }
}
