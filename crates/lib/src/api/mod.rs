//! Chat backend: conversation CRUD, message append, and user login/registration.
//!
//! `ChatApi` and `AuthApi` are the seams the client talks through; `HttpBackend`
//! implements both over the REST endpoints. Every chat call carries the bearer token.

mod http;

use crate::model::{Conversation, Message, MessageDraft};
use async_trait::async_trait;

pub use http::HttpBackend;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Non-success status. `reason` is the human-readable message from the body, when it had one.
    #[error("backend returned {status}: {}", reason.as_deref().unwrap_or("no message"))]
    Status {
        status: u16,
        reason: Option<String>,
    },
}

impl ApiError {
    /// Reason to show the user: the backend's message when present, otherwise `fallback`.
    pub fn reason_or(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                reason: Some(r), ..
            } => r.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Conversation and message endpoints.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// GET /chats
    async fn list_chats(&self, token: &str) -> Result<Vec<Conversation>, ApiError>;
    /// POST /chats
    async fn create_chat(&self, token: &str, title: &str) -> Result<Conversation, ApiError>;
    /// PATCH /chats/{id}
    async fn update_chat(&self, token: &str, id: &str, title: &str)
        -> Result<Conversation, ApiError>;
    /// DELETE /chats/{id}
    async fn delete_chat(&self, token: &str, id: &str) -> Result<(), ApiError>;
    /// POST /chats/{id}/messages. Returns the conversation's full message list after the append.
    async fn add_message(
        &self,
        token: &str,
        chat_id: &str,
        draft: &MessageDraft,
    ) -> Result<Vec<Message>, ApiError>;
}

/// User endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// POST /users/login. Returns the access token.
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;
    /// POST /users/register. Returns the created-user payload as-is.
    async fn register(&self, username: &str, password: &str)
        -> Result<serde_json::Value, ApiError>;
}

/// Reduce a backend error body to a readable message: `message` when it is a string,
/// or `message.message` when the backend nests it. Anything else yields None.
pub fn error_reason(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = v.get("message")?;
    let text = match message {
        serde_json::Value::String(s) => s.as_str(),
        serde_json::Value::Object(_) => message.get("message")?.as_str()?,
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
