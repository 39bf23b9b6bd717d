//! Read-only per-session analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregates extracted from one session's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub id: String,
    /// Session these numbers describe.
    pub session: i64,
    #[serde(default)]
    pub child_vocalizations: u32,
    #[serde(default)]
    pub assistant_responses: u32,
    /// Average words per child utterance.
    #[serde(default)]
    pub avg_child_utterance_length: Option<f64>,
    #[serde(default)]
    pub unique_child_words: u32,
    #[serde(default)]
    pub encouragements_given: u32,
    #[serde(default)]
    pub child_to_ai_ratio: Option<f64>,
    #[serde(default)]
    pub topics_detected: Vec<String>,
    #[serde(default)]
    pub best_utterance: String,
    #[serde(default)]
    pub conversation_summary: String,
    pub created_at: DateTime<Utc>,
}
