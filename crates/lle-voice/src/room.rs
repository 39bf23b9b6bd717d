//! The seam between the client and a real-time media SDK.

use crate::config::MediaUrl;
use crate::error::VoiceError;
use crate::token::MediaAccessToken;
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::info;

/// Capacity of the per-room event broadcast channel.
const ROOM_EVENT_CAPACITY: usize = 64;

/// A simulcast video layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoLayer {
    pub width: u32,
    pub height: u32,
}

impl VideoLayer {
    pub const H180: Self = Self {
        width: 320,
        height: 180,
    };
    pub const H360: Self = Self {
        width: 640,
        height: 360,
    };
}

/// Room settings handed to the SDK, tuned for a voice agent with an
/// optional avatar video track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomOptions {
    pub audio: bool,
    pub video: bool,
    pub adaptive_stream: bool,
    pub dynacast: bool,
    pub video_capture: VideoLayer,
    pub simulcast_layers: Vec<VideoLayer>,
    pub audio_max_bitrate: u32,
    /// Leave the room when the hosting view goes away.
    pub disconnect_on_exit: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            adaptive_stream: true,
            dynacast: true,
            video_capture: VideoLayer::H360,
            simulcast_layers: vec![VideoLayer::H180, VideoLayer::H360],
            audio_max_bitrate: 48_000,
            disconnect_on_exit: true,
        }
    }
}

/// Everything needed to join a room. Both the URL and the token have
/// already been validated by construction.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub server_url: MediaUrl,
    pub token: MediaAccessToken,
    pub room: String,
    pub identity: String,
    pub options: RoomOptions,
}

/// Serializable form of a [`JoinRequest`] for an external client.
#[derive(Debug, Clone, Serialize)]
pub struct JoinTicket<'a> {
    pub server_url: &'a str,
    pub token: &'a str,
    pub room: &'a str,
    pub identity: &'a str,
    pub options: &'a RoomOptions,
}

impl JoinRequest {
    pub fn ticket(&self) -> JoinTicket<'_> {
        JoinTicket {
            server_url: self.server_url.as_str(),
            token: self.token.as_str(),
            room: &self.room,
            identity: &self.identity,
            options: &self.options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

/// Why the SDK left a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local user or view chose to leave.
    ClientInitiated,
    DuplicateIdentity,
    ServerShutdown,
    ParticipantRemoved,
    RoomDeleted,
    SignalClosed,
    Unknown,
}

impl DisconnectReason {
    pub fn is_client_initiated(self) -> bool {
        matches!(self, Self::ClientInitiated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    StateChanged(ConnectionState),
    Disconnected(DisconnectReason),
    Error(String),
}

#[derive(Debug)]
struct RoomInner {
    room: String,
    identity: String,
    connected: AtomicBool,
    events: broadcast::Sender<RoomEvent>,
}

/// A joined room as seen by the client.
///
/// Connectors keep a clone to report SDK events through [`RoomHandle::emit`];
/// consumers read them through [`RoomHandle::subscribe`].
#[derive(Debug, Clone)]
pub struct RoomHandle {
    inner: Arc<RoomInner>,
}

impl RoomHandle {
    pub fn new(room: impl Into<String>, identity: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(ROOM_EVENT_CAPACITY);
        Self {
            inner: Arc::new(RoomInner {
                room: room.into(),
                identity: identity.into(),
                connected: AtomicBool::new(true),
                events,
            }),
        }
    }

    pub fn room(&self) -> &str {
        &self.inner.room
    }

    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inner.events.subscribe()
    }

    /// Publishes an SDK event. A disconnect marks the handle as closed.
    pub fn emit(&self, event: RoomEvent) {
        if let RoomEvent::Disconnected(reason) = &event {
            if !self.inner.connected.swap(false, Ordering::SeqCst) {
                return;
            }
            info!(room = %self.inner.room, ?reason, "left room");
        }
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Leaves the room on the client's own initiative. Idempotent.
    pub fn disconnect(&self) {
        self.emit(RoomEvent::Disconnected(DisconnectReason::ClientInitiated));
    }
}

/// Joins rooms on behalf of the client.
pub trait RoomConnector: Send + Sync + 'static {
    fn connect(
        &self,
        request: JoinRequest,
    ) -> impl Future<Output = Result<RoomHandle, VoiceError>> + Send;
}

/// Connector that writes the join ticket as one JSON line for an external
/// client to pick up, then reports the room as connected.
///
/// The ticket contains the token, so the sink must not be a log.
#[derive(Clone)]
pub struct HandoffConnector {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl HandoffConnector {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn write_ticket(&self, request: &JoinRequest) -> Result<(), VoiceError> {
        let line = serde_json::to_string(&request.ticket())
            .map_err(|e| VoiceError::Connect(format!("failed to encode join ticket: {e}")))?;
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| VoiceError::Connect("join ticket sink poisoned".to_string()))?;
        writeln!(sink, "{line}")
            .and_then(|()| sink.flush())
            .map_err(|e| VoiceError::Connect(format!("failed to write join ticket: {e}")))
    }
}

impl std::fmt::Debug for HandoffConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffConnector").finish_non_exhaustive()
    }
}

impl RoomConnector for HandoffConnector {
    async fn connect(&self, request: JoinRequest) -> Result<RoomHandle, VoiceError> {
        info!(
            room = %request.room,
            server = %request.server_url,
            token_len = request.token.as_str().len(),
            "handing off room join"
        );
        self.write_ticket(&request)?;
        let handle = RoomHandle::new(request.room, request.identity);
        handle.emit(RoomEvent::StateChanged(ConnectionState::Connected));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn request() -> JoinRequest {
        JoinRequest {
            server_url: MediaUrl::parse("wss://media.example.com").unwrap(),
            token: MediaAccessToken::parse("aaa.bbb.ccc").unwrap(),
            room: "child_1_abc".into(),
            identity: "child-1".into(),
            options: RoomOptions::default(),
        }
    }

    #[test]
    fn disconnect_is_reported_once() {
        let handle = RoomHandle::new("r", "me");
        let mut rx = handle.subscribe();
        handle.disconnect();
        handle.disconnect();
        assert!(!handle.is_connected());
        assert_eq!(
            rx.try_recv().unwrap(),
            RoomEvent::Disconnected(DisconnectReason::ClientInitiated)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handoff_writes_ticket_line() {
        let buf = SharedBuf::default();
        let connector = HandoffConnector::new(buf.clone());

        let handle = connector.connect(request()).await.unwrap();
        assert!(handle.is_connected());
        assert_eq!(handle.room(), "child_1_abc");

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let ticket: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(ticket["server_url"], "wss://media.example.com");
        assert_eq!(ticket["token"], "aaa.bbb.ccc");
        assert_eq!(ticket["options"]["audio_max_bitrate"], 48_000);
        assert_eq!(ticket["options"]["simulcast_layers"][0]["height"], 180);
    }
}
