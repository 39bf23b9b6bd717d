//! Shared types, validation errors, and constants for the LLE client.
//!
//! This crate provides the domain records exchanged with the LLE REST
//! backend (children, sessions, analytics, auth payloads) together with the
//! client-side validation rules applied before anything is sent.
//!
//! Every other crate in the workspace depends on `lle-types` for these
//! definitions, which keeps the dependency graph flat.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod analytics;
mod auth;
mod child;
mod session;

pub use analytics::AnalyticsRecord;
pub use auth::{AuthTokens, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest};
pub use child::{Child, ChildProfile, ChildUpdate};
pub use session::{Session, SessionStart, StartSessionRequest};

/// Youngest age accepted for a child profile.
pub const MIN_CHILD_AGE: u32 = 1;

/// Oldest age accepted for a child profile.
pub const MAX_CHILD_AGE: u32 = 8;

/// Maximum length of a child's display name, in characters.
pub const MAX_CHILD_NAME_CHARS: usize = 128;

/// Maximum length of a conversation prompt, in characters.
pub const MAX_CONVERSATION_PROMPT_CHARS: usize = 2000;

/// Languages a child profile may declare as native.
///
/// The service currently supports a single language; the enum keeps the wire
/// value (an ISO 639-1 code) typed so unsupported codes are rejected on
/// deserialization rather than passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NativeLanguage {
    /// English.
    #[default]
    #[serde(rename = "en")]
    English,
}

impl NativeLanguage {
    /// Returns the ISO 639-1 code sent to the backend.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
        }
    }

    /// Parses an ISO 639-1 code. Returns `None` for unsupported languages.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::English),
            _ => None,
        }
    }
}

/// A page of results in the backend's pagination envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Total number of records across all pages.
    #[serde(default)]
    pub count: u64,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any.
    #[serde(default)]
    pub previous: Option<String>,
    /// Records on this page.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

/// Client-side validation failures for outgoing records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Age outside the supported range.
    #[error("age must be between 1 and 8, got {0}")]
    AgeOutOfRange(u32),

    /// Name is empty after trimming.
    #[error("child name must not be empty")]
    EmptyName,

    /// Name exceeds [`MAX_CHILD_NAME_CHARS`].
    #[error("child name exceeds 128 characters")]
    NameTooLong,

    /// Conversation prompt exceeds [`MAX_CONVERSATION_PROMPT_CHARS`].
    #[error("conversation prompt exceeds 2000 characters")]
    PromptTooLong,

    /// A required credential field is empty.
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

pub(crate) fn validate_age(age: u32) -> Result<(), ValidationError> {
    if (MIN_CHILD_AGE..=MAX_CHILD_AGE).contains(&age) {
        Ok(())
    } else {
        Err(ValidationError::AgeOutOfRange(age))
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_CHILD_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }
    Ok(())
}

pub(crate) fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.chars().count() > MAX_CONVERSATION_PROMPT_CHARS {
        return Err(ValidationError::PromptTooLong);
    }
    Ok(())
}
