//! OpenRouter client (OpenAI-compatible `/chat/completions`, non-streaming).

use super::{CompletionError, CompletionMessage, CompletionProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Client for OpenRouter or any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// POST /chat/completions. Returns the first choice's message content.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<String, CompletionError> {
        let key = self.api_key.as_deref().ok_or(CompletionError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest { model, messages };
        log::debug!("POST {} model={} messages={}", url, model, messages.len());
        let res = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("{} {}", status, body)));
        }
        let data: ChatResponse = res.json().await?;
        first_choice_content(data)
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<String, CompletionError> {
        self.chat(model, messages).await
    }
}

// --- wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    /// Some providers answer 200 with an error object instead of choices.
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}

fn first_choice_content(data: ChatResponse) -> Result<String, CompletionError> {
    if let Some(err) = data.error {
        return Err(CompletionError::Api(
            err.message.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    data.choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .map(|m| m.content.unwrap_or_default())
        .ok_or(CompletionError::EmptyReply)
}
