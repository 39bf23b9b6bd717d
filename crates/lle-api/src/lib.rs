//! REST client for the LLE backend.
//!
//! [`ApiClient`] wraps a `reqwest::Client` and the [`LocalStore`] that holds
//! the auth token pair. Every request carries the stored access token as a
//! bearer credential; a `401` triggers one refresh-and-retry before the
//! stored credentials are dropped.
//!
//! Endpoint groups live in their own modules and extend `ApiClient` with
//! inherent methods.
//!
//! [`LocalStore`]: lle_store::LocalStore

mod analytics;
mod auth;
mod children;
mod client;
mod error;
mod media;
mod sessions;

pub use client::{ApiClient, ApiConfig};
pub use error::ApiError;
pub use media::TokenResponse;
