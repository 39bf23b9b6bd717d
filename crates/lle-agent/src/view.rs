use crate::error::AgentError;
use crate::initializer::{SessionApi, SessionInitializer, TokenSource};
use crate::presenter::{present, ConnectedRoom, Presentation, ViewState};
use lle_store::ChildSelection;
use lle_types::{Child, SessionStart};
use lle_voice::{JoinRequest, MediaConfig, MediaUrl, RoomConnector, RoomEvent, RoomHandle, RoomOptions};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Media and lifecycle switches for the voice-agent view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentViewOptions {
    pub audio: bool,
    pub video: bool,
    /// End the backend session when the view is left or retried.
    pub end_session_on_exit: bool,
}

impl Default for AgentViewOptions {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            end_session_on_exit: true,
        }
    }
}

impl AgentViewOptions {
    fn room_options(&self) -> RoomOptions {
        RoomOptions {
            audio: self.audio,
            video: self.video,
            ..RoomOptions::default()
        }
    }
}

/// Collaborators of an [`AgentView`].
pub struct AgentDeps<S, T, C> {
    pub sessions: Arc<S>,
    pub tokens: Arc<T>,
    pub connector: Arc<C>,
    pub selection: Arc<dyn ChildSelection>,
    pub media: MediaConfig,
}

/// Bookkeeping for the live attempt. Every spawned step carries the
/// generation it was started for and is ignored once that has moved on.
#[derive(Default)]
struct Attempt {
    mounted: bool,
    generation: u64,
    session: Option<SessionStart>,
    room: Option<RoomHandle>,
}

struct Shared<S, T, C> {
    initializer: SessionInitializer<S, T>,
    connector: Arc<C>,
    selection: Arc<dyn ChildSelection>,
    media: MediaConfig,
    options: AgentViewOptions,
    state: watch::Sender<ViewState>,
    attempt: Mutex<Attempt>,
}

impl<S, T, C> Shared<S, T, C> {
    fn attempt(&self) -> MutexGuard<'_, Attempt> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to a new generation and hands back what the old one owned.
    fn invalidate(&self, stay_mounted: bool) -> (u64, Option<SessionStart>, Option<RoomHandle>) {
        let mut attempt = self.attempt();
        attempt.generation += 1;
        attempt.mounted = stay_mounted;
        (attempt.generation, attempt.session.take(), attempt.room.take())
    }

    /// Writes `state` unless the view is gone or `generation` is stale.
    ///
    /// The check and the write happen under the attempt lock, so nothing is
    /// published after [`invalidate`](Self::invalidate) returns.
    fn publish(&self, generation: u64, state: ViewState) -> bool {
        let attempt = self.attempt();
        if !attempt.mounted || attempt.generation != generation {
            tracing::debug!(generation, state = state.label(), "dropping stale view state");
            return false;
        }
        tracing::info!(state = state.label(), "voice agent state");
        self.state.send_replace(state);
        true
    }

    fn fail(&self, generation: u64, error: AgentError) {
        tracing::warn!(kind = error.kind(), %error, "voice agent failed");
        self.publish(generation, ViewState::Error(error));
    }

    fn adopt_session(&self, generation: u64, start: &SessionStart) -> bool {
        let mut attempt = self.attempt();
        if !attempt.mounted || attempt.generation != generation {
            return false;
        }
        attempt.session = Some(start.clone());
        true
    }

    fn adopt_room(&self, generation: u64, handle: &RoomHandle) -> bool {
        let mut attempt = self.attempt();
        if !attempt.mounted || attempt.generation != generation || attempt.room.is_some() {
            return false;
        }
        attempt.room = Some(handle.clone());
        true
    }
}

impl<S: SessionApi, T: TokenSource, C: RoomConnector> Shared<S, T, C> {
    /// Checks the child and the media URL, then spawns the async steps.
    fn launch(self: &Arc<Self>, generation: u64) -> Option<JoinHandle<()>> {
        let child = match self.selection.selected_child() {
            Ok(Some(child)) => child,
            Ok(None) => {
                self.publish(generation, ViewState::NoChildSelected);
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read selected child");
                self.publish(generation, ViewState::NoChildSelected);
                return None;
            }
        };
        self.publish(generation, ViewState::Validating);
        let url = match self.media.validate() {
            Ok(url) => url,
            Err(e) => {
                self.fail(generation, AgentError::EnvironmentMisconfigured(e.to_string()));
                return None;
            }
        };
        Some(tokio::spawn(Arc::clone(self).run(generation, child, url)))
    }

    async fn run(self: Arc<Self>, generation: u64, child: Child, url: MediaUrl) {
        if !self.publish(generation, ViewState::Starting) {
            return;
        }

        let start = match self.initializer.start(&child).await {
            Ok(Some(start)) => start,
            Ok(None) => return,
            Err(e) => {
                self.fail(generation, e);
                return;
            }
        };
        if !self.adopt_session(generation, &start) {
            self.end_session(start.session_id).await;
            return;
        }

        let identity = child.identity();
        let token = match self.initializer.fetch_token(&start, &identity).await {
            Ok(token) => token,
            Err(e) => {
                self.fail(generation, e);
                return;
            }
        };

        let request = JoinRequest {
            server_url: url,
            token,
            room: start.livekit_room.clone(),
            identity: identity.clone(),
            options: self.options.room_options(),
        };
        let handle = match self.connector.connect(request).await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(generation, AgentError::ConnectionLost(e.to_string()));
                return;
            }
        };
        let mut events = handle.subscribe();
        if !self.adopt_room(generation, &handle) {
            handle.disconnect();
            return;
        }
        if !handle.is_connected() {
            self.fail(generation, AgentError::connection_lost());
            return;
        }

        let connected = ConnectedRoom {
            session_id: start.session_id,
            room: start.livekit_room,
            identity,
        };
        if self.publish(generation, ViewState::Connected(connected)) {
            self.watch_room(generation, &mut events).await;
        }
    }

    async fn watch_room(&self, generation: u64, events: &mut broadcast::Receiver<RoomEvent>) {
        loop {
            match events.recv().await {
                Ok(RoomEvent::StateChanged(state)) => {
                    tracing::debug!(?state, "room connection state changed");
                }
                Ok(RoomEvent::Disconnected(reason)) => {
                    if !reason.is_client_initiated() {
                        tracing::warn!(?reason, "room disconnected");
                        self.fail(generation, AgentError::connection_lost());
                    }
                    return;
                }
                Ok(RoomEvent::Error(message)) => {
                    self.fail(generation, AgentError::ConnectionLost(message));
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "room events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Best effort; a failure is logged and otherwise ignored.
    async fn end_session(&self, session_id: i64) {
        if !self.options.end_session_on_exit {
            return;
        }
        if let Err(e) = self.initializer.sessions().end_session(session_id).await {
            tracing::warn!(session_id, error = %e, "failed to end session");
        }
    }

    async fn release(&self, session: Option<SessionStart>, room: Option<RoomHandle>) {
        if let Some(room) = room {
            room.disconnect();
        }
        if let Some(session) = session {
            self.end_session(session.session_id).await;
        }
    }
}

/// The voice-agent view: owns one attempt at a time and publishes its state.
///
/// Must be mounted inside a Tokio runtime. Dropping the view without
/// [`unmount`](Self::unmount) stops it and leaves the room, but cannot end
/// the backend session.
pub struct AgentView<S, T, C> {
    shared: Arc<Shared<S, T, C>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S, T, C> AgentView<S, T, C> {
    fn abort_task(&self) {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl<S: SessionApi, T: TokenSource, C: RoomConnector> AgentView<S, T, C> {
    pub fn mount(deps: AgentDeps<S, T, C>, options: AgentViewOptions) -> Self {
        let (state, _) = watch::channel(ViewState::Validating);
        let shared = Arc::new(Shared {
            initializer: SessionInitializer::new(deps.sessions, deps.tokens),
            connector: deps.connector,
            selection: deps.selection,
            media: deps.media,
            options,
            state,
            attempt: Mutex::new(Attempt {
                mounted: true,
                ..Attempt::default()
            }),
        });
        tracing::info!(?options, "voice agent view mounted");
        let task = shared.launch(0);
        Self {
            shared,
            task: Mutex::new(task),
        }
    }

    pub fn state(&self) -> ViewState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.state.subscribe()
    }

    pub fn presentation(&self) -> Presentation {
        present(&self.state())
    }

    /// Tears down the failed attempt and runs the whole sequence again.
    ///
    /// Only honoured from [`ViewState::Error`]; returns whether it was.
    pub async fn retry(&self) -> bool {
        if !self.state().is_error() {
            tracing::debug!(state = self.state().label(), "retry ignored");
            return false;
        }
        tracing::info!("retrying voice agent");
        self.restart().await;
        true
    }

    /// Starts over for a newly selected child.
    ///
    /// [`ViewState::NoChildSelected`] is terminal for this view, so the call
    /// is ignored there; returns whether a restart happened.
    pub async fn child_changed(&self) -> bool {
        if self.state() == ViewState::NoChildSelected {
            tracing::debug!("child change ignored, view has no child");
            return false;
        }
        tracing::info!("selected child changed");
        self.restart().await;
        true
    }

    async fn restart(&self) {
        let (generation, session, room) = self.shared.invalidate(true);
        self.abort_task();
        self.shared.release(session, room).await;
        self.shared.initializer.reset();
        let task = self.shared.launch(generation);
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = task;
    }

    /// Leaves the view. No state is published after this begins.
    pub async fn unmount(self) {
        let (_, session, room) = self.shared.invalidate(false);
        self.abort_task();
        self.shared.release(session, room).await;
        tracing::info!("voice agent view unmounted");
    }
}

impl<S, T, C> Drop for AgentView<S, T, C> {
    fn drop(&mut self) {
        let (_, _, room) = self.shared.invalidate(false);
        self.abort_task();
        if let Some(room) = room {
            room.disconnect();
        }
    }
}
