//! Conversation and message types as exchanged with the chat backend.
//!
//! Field names follow the backend's JSON (`_id`, `senderType`, `createdAt`, ...).
//! Unknown fields are ignored so backend additions do not break the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned conversation identifier (opaque string).
pub type ConversationId = String;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Assistant,
}

impl SenderType {
    /// Role name used by the completion API.
    pub fn as_role(self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
        }
    }
}

/// One message of a conversation, as confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
}

/// A titled conversation with its ordered messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// History list label: "Updated ... ago" once edited, otherwise "Created ... ago".
    pub fn activity_label(&self, now: DateTime<Utc>) -> String {
        if self.updated_at != self.created_at {
            format!("Updated {} ago", relative_age(self.updated_at, now))
        } else {
            format!("Created {} ago", relative_age(self.created_at, now))
        }
    }
}

/// Message body sent to `POST /chats/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub content: String,
    pub sender_type: SenderType,
}

impl MessageDraft {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender_type: SenderType::User,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender_type: SenderType::Assistant,
        }
    }
}

/// Coarse human-readable age ("less than a minute", "5 minutes", "2 days").
/// Timestamps in the future count as zero.
pub fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let (n, unit) = match secs {
        s if s < 60 => return "less than a minute".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
