//! Completion API abstraction and the OpenRouter client.
//!
//! One request per user turn: a role-tagged transcript goes in, the assistant's text comes out.

mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openrouter::OpenRouterClient;

/// Model used when the user has not picked one.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick";

/// A selectable model and what it is good at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub task: &'static str,
}

/// Models offered in the model picker. Any other id can still be passed explicitly.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: DEFAULT_MODEL,
        task: "Chat, Reasoning, Coding",
    },
    ModelInfo {
        name: "google/gemini-2.5-pro-exp-03-25:free",
        task: "Multimodal (Text + Vision), Reasoning",
    },
    ModelInfo {
        name: "deepseek/deepseek-chat-v3-0324",
        task: "Chat, Coding, Reasoning",
    },
    ModelInfo {
        name: "qwen/qwen-2.5-coder-32b-instruct",
        task: "Advanced Code Generation",
    },
];

/// Look up a catalog entry by exact model id.
pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One transcript entry sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: Role,
    pub content: String,
}

impl CompletionMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion api returned no choices")]
    EmptyReply,
    #[error("completion api key is not configured (set OPENROUTER_API_KEY or completion.apiKey)")]
    MissingApiKey,
}

/// Produces an assistant reply for a transcript.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<String, CompletionError>;
}
