//! Media-room plumbing for the LLE client.
//!
//! Validates the media server URL, fetches and checks short-lived room
//! access tokens, and defines the seam ([`RoomConnector`]) behind which the
//! real-time SDK joins a room. The SDK itself is not part of this crate;
//! [`HandoffConnector`] passes the validated join parameters to an external
//! client instead.
//!
//! A join can only be described with a [`MediaUrl`] that passed validation
//! and a [`MediaAccessToken`] that passed the shape checks, so nothing can
//! attempt a join with an empty token or a non-WebSocket URL.

pub mod config;
pub mod error;
pub mod room;
pub mod token;

pub use config::{MediaConfig, MediaUrl};
pub use error::VoiceError;
pub use room::{
    ConnectionState, DisconnectReason, HandoffConnector, JoinRequest, JoinTicket, RoomConnector,
    RoomEvent, RoomHandle, RoomOptions, VideoLayer,
};
pub use token::{MediaAccessToken, TokenClaims, TokenError, TokenFetcher};
