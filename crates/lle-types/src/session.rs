//! Therapy session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session as listed in a child's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    /// Owning child.
    pub child: Uuid,
    #[serde(default)]
    pub child_username: Option<String>,
    /// Room the session was held in.
    pub livekit_room: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Wall-clock length of a finished session.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

/// Body of `POST /sessions/start/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub child_id: Uuid,
}

/// Acknowledgment returned once the backend has created a session.
///
/// Receiving this is the signal that the room exists and a token may be
/// requested for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: i64,
    pub livekit_room: String,
    pub child_id: Uuid,
    pub started_at: DateTime<Utc>,
}
