//! Voice-agent session orchestration.
//!
//! Entering the voice-agent view runs one fixed sequence: check that a child
//! is selected, validate the media server URL, start a backend session,
//! fetch a room token for the session's room, and join the room through a
//! [`RoomConnector`](lle_voice::RoomConnector). [`AgentView`] drives that
//! sequence and publishes a [`ViewState`] for a front-end to render;
//! [`present`] turns a state into the text and actions to show.
//!
//! Nothing is retried automatically. A failure leaves the view in
//! [`ViewState::Error`] until the user retries, which tears down whatever
//! the failed attempt left behind and starts over.

mod error;
mod initializer;
mod presenter;
mod view;

pub use error::AgentError;
pub use initializer::{SessionApi, SessionInitializer, TokenSource};
pub use presenter::{present, Action, ConnectedRoom, Presentation, ViewState};
pub use view::{AgentDeps, AgentView, AgentViewOptions};
