//! Session lifecycle endpoints.

use crate::client::ApiClient;
use crate::error::ApiError;
use lle_types::{Session, SessionStart, StartSessionRequest};
use reqwest::Method;
use uuid::Uuid;

impl ApiClient {
    pub async fn list_sessions(&self, child_id: Uuid) -> Result<Vec<Session>, ApiError> {
        let child_id = child_id.to_string();
        let call = self.call(Method::GET, "sessions/", &[("child_id", child_id.as_str())])?;
        Ok(self.send_list(&call).await?.results)
    }

    /// Asks the backend to open a session and its room for `child_id`.
    ///
    /// The returned acknowledgment carries the room identifier. The session
    /// is also written to the local session log so it can be ended later if
    /// this process dies before doing so.
    pub async fn start_session(&self, child_id: Uuid) -> Result<SessionStart, ApiError> {
        let call = self.call_with_body(
            Method::POST,
            "sessions/start/",
            &StartSessionRequest { child_id },
        )?;
        let start: SessionStart = self.send_json(&call).await?;
        tracing::info!(
            session_id = start.session_id,
            room = %start.livekit_room,
            "session started"
        );
        if let Err(e) = self.store().record_session_started(&start) {
            tracing::warn!(error = %e, session_id = start.session_id, "failed to log started session");
        }
        Ok(start)
    }

    pub async fn end_session(&self, session_id: i64) -> Result<(), ApiError> {
        let call = self.call(Method::POST, &format!("sessions/{session_id}/end"), &[])?;
        self.send_empty(&call).await?;
        tracing::info!(session_id, "session ended");
        if let Err(e) = self.store().record_session_ended(session_id) {
            tracing::warn!(error = %e, session_id, "failed to log ended session");
        }
        Ok(())
    }
}
