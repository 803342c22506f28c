//! REST client for the chat backend.

use super::{error_reason, ApiError, AuthApi, ChatApi};
use crate::model::{Conversation, Message, MessageDraft};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// HTTP implementation of [`ChatApi`] and [`AuthApi`].
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let invalid = |reason: String| ApiError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-success response into `ApiError::Status`, keeping the body's message if any.
async fn check(res: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    log::debug!("backend error {}: {}", status, body);
    Err(ApiError::Status {
        status,
        reason: error_reason(&body),
    })
}

#[async_trait]
impl ChatApi for HttpBackend {
    async fn list_chats(&self, token: &str) -> Result<Vec<Conversation>, ApiError> {
        let url = self.endpoint(&["chats"])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).bearer_auth(token).send().await?;
        Ok(check(res).await?.json().await?)
    }

    async fn create_chat(&self, token: &str, title: &str) -> Result<Conversation, ApiError> {
        let url = self.endpoint(&["chats"])?;
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&TitleBody { title })
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    async fn update_chat(
        &self,
        token: &str,
        id: &str,
        title: &str,
    ) -> Result<Conversation, ApiError> {
        let url = self.endpoint(&["chats", id])?;
        log::debug!("PATCH {}", url);
        let res = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&TitleBody { title })
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    async fn delete_chat(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["chats", id])?;
        log::debug!("DELETE {}", url);
        let res = self.client.delete(url).bearer_auth(token).send().await?;
        check(res).await?;
        Ok(())
    }

    async fn add_message(
        &self,
        token: &str,
        chat_id: &str,
        draft: &MessageDraft,
    ) -> Result<Vec<Message>, ApiError> {
        let url = self.endpoint(&["chats", chat_id, "messages"])?;
        log::debug!("POST {} ({})", url, draft.sender_type.as_role());
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(draft)
            .send()
            .await?;
        let data: MessagesResponse = check(res).await?.json().await?;
        Ok(data.messages)
    }
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["users", "login"])?;
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(url)
            .json(&CredentialsBody { username, password })
            .send()
            .await?;
        let data: LoginResponse = check(res).await?.json().await?;
        Ok(data.access_token)
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint(&["users", "register"])?;
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(url)
            .json(&CredentialsBody { username, password })
            .send()
            .await?;
        let res = check(res).await?;
        let body = res.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}
