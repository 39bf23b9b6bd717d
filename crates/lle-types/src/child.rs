//! Child profile records.

use crate::{validate_age, validate_name, validate_prompt, NativeLanguage, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A child as stored by the backend, owned by a parent account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    /// Backend identifier. Also used as the participant identity in rooms.
    pub id: Uuid,
    /// Parent account that owns this child.
    #[serde(default)]
    pub parent: Option<i64>,
    pub name: String,
    pub age: u32,
    pub native_language: NativeLanguage,
    /// Free-text guidance for the voice agent.
    #[serde(default)]
    pub conversation_prompt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Child {
    /// Returns the participant identity used when joining a room.
    pub fn identity(&self) -> String {
        self.id.to_string()
    }
}

/// The editable part of a child, sent on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub native_language: NativeLanguage,
    #[serde(default)]
    pub conversation_prompt: String,
}

impl ChildProfile {
    pub fn new(name: impl Into<String>, age: u32) -> Self {
        Self {
            name: name.into(),
            age,
            native_language: NativeLanguage::default(),
            conversation_prompt: String::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation_prompt = prompt.into();
        self
    }

    /// Checks the profile against the client-side bounds.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_age(self.age)?;
        validate_prompt(&self.conversation_prompt)
    }
}

/// A partial update. Absent fields are left unchanged on the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_language: Option<NativeLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_prompt: Option<String>,
}

impl ChildUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.native_language.is_none()
            && self.conversation_prompt.is_none()
    }

    /// Validates only the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(age) = self.age {
            validate_age(age)?;
        }
        if let Some(prompt) = &self.conversation_prompt {
            validate_prompt(prompt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_CONVERSATION_PROMPT_CHARS;

    #[test]
    fn profile_validation() {
        assert!(ChildProfile::new("Sam", 5).validate().is_ok());
        assert_eq!(
            ChildProfile::new("  ", 5).validate(),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            ChildProfile::new("Sam", 12).validate(),
            Err(ValidationError::AgeOutOfRange(12))
        );
        let long = "a".repeat(MAX_CONVERSATION_PROMPT_CHARS + 1);
        assert_eq!(
            ChildProfile::new("Sam", 3).with_prompt(long).validate(),
            Err(ValidationError::PromptTooLong)
        );
    }

    #[test]
    fn update_serializes_only_present_fields() {
        let update = ChildUpdate {
            age: Some(6),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"age":6}"#);
        assert!(ChildUpdate::default().is_empty());
    }

    #[test]
    fn child_deserializes_backend_shape() {
        let json = r#"{
            "id": "4b6f0f9e-2f5c-4d0a-9d6e-0c2a1b7f3e11",
            "parent": 3,
            "name": "Ava",
            "age": 4,
            "native_language": "en",
            "conversation_prompt": "Talk about animals",
            "created_at": "2025-03-01T10:00:00.123456Z",
            "updated_at": "2025-03-02T10:00:00Z"
        }"#;
        let child: Child = serde_json::from_str(json).unwrap();
        assert_eq!(child.name, "Ava");
        assert_eq!(child.identity(), "4b6f0f9e-2f5c-4d0a-9d6e-0c2a1b7f3e11");
    }
}
