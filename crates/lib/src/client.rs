//! The chat client: owns all state and is the only path that mutates it.
//!
//! Each operation sends its request without holding the state lock, then applies
//! the result in one write section. Results that arrive after a logout or after
//! `shutdown()` are dropped.

use crate::api::{ApiError, AuthApi, ChatApi, HttpBackend};
use crate::config::{self, Config};
use crate::credential::{CredentialError, CredentialStore};
use crate::llm::{CompletionError, CompletionProvider, OpenRouterClient};
use crate::model::{Conversation, Message, MessageDraft};
use crate::state::{
    AppState, AuthAction, AuthState, ChatAction, ChatOp, ChatState, NOTICE_TTL,
};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Validation message for an empty conversation title.
pub const TITLE_REQUIRED: &str = "Title is required";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("not logged in")]
    Unauthenticated,
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
    #[error("no conversation selected")]
    NoConversationSelected,
    #[error("a message is already being sent")]
    TurnInProgress,
    #[error("operation cancelled")]
    Cancelled,
    #[error("logged out while the request was in flight")]
    SessionEnded,
    #[error("a newer history fetch replaced this one")]
    Superseded,
    #[error("{reason}")]
    Api {
        reason: String,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Tunables that are not gateways.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// First transcript entry of every turn.
    pub system_prompt: String,
    /// Lifetime of login/registration failure notices.
    pub notice_ttl: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            notice_ttl: NOTICE_TTL,
        }
    }
}

pub struct ChatClient {
    chats: Arc<dyn ChatApi>,
    auth: Arc<dyn AuthApi>,
    pub(crate) completion: Arc<dyn CompletionProvider>,
    credentials: CredentialStore,
    state: Arc<RwLock<AppState>>,
    cancel: CancellationToken,
    pub(crate) sending: AtomicBool,
    pub(crate) options: ClientOptions,
}

impl ChatClient {
    /// Build a client; the credential is restored from `credentials`.
    pub fn new(
        chats: Arc<dyn ChatApi>,
        auth: Arc<dyn AuthApi>,
        completion: Arc<dyn CompletionProvider>,
        credentials: CredentialStore,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let token = credentials.load()?;
        if token.is_some() {
            log::debug!("restored stored credential");
        }
        let state = AppState {
            auth: AuthState::new(token, options.notice_ttl),
            chat: ChatState::default(),
        };
        Ok(Self {
            chats,
            auth,
            completion,
            credentials,
            state: Arc::new(RwLock::new(state)),
            cancel: CancellationToken::new(),
            sending: AtomicBool::new(false),
            options,
        })
    }

    /// HTTP backend, OpenRouter and file credentials, all from config (env overrides applied).
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self, ClientError> {
        let backend = Arc::new(HttpBackend::new(config::resolve_api_base_url(config)));
        let completion = Arc::new(OpenRouterClient::new(
            Some(config.completion.base_url.clone()),
            config::resolve_completion_key(config),
        ));
        let credentials =
            CredentialStore::file(config::resolve_credentials_path(config, config_path));
        let options = ClientOptions {
            system_prompt: config.completion.system_prompt.clone(),
            notice_ttl: config.auth.notice_timeout(),
        };
        Self::new(backend.clone(), backend, completion, credentials, options)
    }

    /// Clone of the whole state.
    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }

    /// Read state without cloning it.
    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Cancel every in-flight operation. Their results will not be applied.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn token(&self) -> Result<String, ClientError> {
        self.state
            .read()
            .await
            .auth
            .credential()
            .map(str::to_string)
            .ok_or(ClientError::Unauthenticated)
    }

    /// Race `fut` against `shutdown()`.
    pub(crate) async fn run<T>(&self, fut: impl Future<Output = T>) -> Result<T, ClientError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            out = fut => Ok(out),
        }
    }

    // --- auth ---

    /// Log in and persist the token. A response that arrives after `logout()` is dropped
    /// and nothing is stored.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        validate_credentials(username, password)?;
        let epoch = {
            let mut g = self.state.write().await;
            g.auth.apply(AuthAction::LoginStarted);
            g.chat.epoch()
        };
        let res = self.run(self.auth.login(username, password)).await?;
        let mut g = self.state.write().await;
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if g.chat.epoch() != epoch {
            log::debug!("dropping login response from a previous session");
            return Err(ClientError::SessionEnded);
        }
        let token = match res {
            Ok(token) => token,
            Err(e) => {
                let reason = e.reason_or("Login failed");
                log::info!("login failed: {}", e);
                g.auth.apply(AuthAction::LoginFailed {
                    reason: reason.clone(),
                });
                return Err(ClientError::Api { reason, source: e });
            }
        };
        if let Err(e) = self.credentials.save(&token) {
            g.auth.apply(AuthAction::LoginFailed {
                reason: "Could not store credential".to_string(),
            });
            return Err(e.into());
        }
        g.auth.apply(AuthAction::LoginSucceeded { token });
        log::info!("logged in as {}", username);
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<serde_json::Value, ClientError> {
        validate_credentials(username, password)?;
        self.state
            .write()
            .await
            .auth
            .apply(AuthAction::RegisterStarted);
        let res = self.run(self.auth.register(username, password)).await?;
        let mut g = self.state.write().await;
        match res {
            Ok(user) => {
                g.auth.apply(AuthAction::RegisterSucceeded);
                log::info!("registered {}", username);
                Ok(user)
            }
            Err(e) => {
                let reason = e.reason_or("Registration failed");
                g.auth.apply(AuthAction::RegisterFailed {
                    reason: reason.clone(),
                });
                Err(ClientError::Api { reason, source: e })
            }
        }
    }

    /// Forget the credential and empty the chat state. No request is sent.
    /// State is reset even when removing the stored credential fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        {
            let mut g = self.state.write().await;
            g.auth.apply(AuthAction::LoggedOut);
            g.chat.apply(ChatAction::Reset);
        }
        log::info!("logged out");
        self.credentials.clear()?;
        Ok(())
    }

    // --- chats ---

    /// Replace the history with the server's list. When fetches overlap only the latest
    /// is applied; the others return `Superseded`.
    pub async fn fetch_history(&self) -> Result<(), ClientError> {
        let token = self.token().await?;
        let seq = self.state.write().await.chat.begin_fetch();
        let res = self.run(self.chats.list_chats(&token)).await?;
        let mut g = self.state.write().await;
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        match res {
            Ok(chats) => {
                log::debug!("fetched {} chats (seq {})", chats.len(), seq);
                if g.chat.apply(ChatAction::FetchSucceeded { seq, chats }) {
                    Ok(())
                } else {
                    Err(ClientError::Superseded)
                }
            }
            Err(e) => {
                let reason = e.reason_or(ChatOp::FetchHistory.fallback_reason());
                let applied = g.chat.apply(ChatAction::FetchFailed {
                    seq,
                    reason: reason.clone(),
                });
                if !applied {
                    log::debug!("ignoring failure of superseded fetch (seq {}): {}", seq, e);
                    return Err(ClientError::Superseded);
                }
                Err(ClientError::Api { reason, source: e })
            }
        }
    }

    pub async fn add_conversation(&self, title: &str) -> Result<Conversation, ClientError> {
        let title = self.validate_title(title).await?;
        let (token, epoch) = self.begin(ChatOp::AddConversation).await?;
        let res = self.run(self.chats.create_chat(&token, &title)).await?;
        self.finish(ChatOp::AddConversation, epoch, res, |chat| {
            ChatAction::Added(chat.clone())
        })
        .await
    }

    /// Rename a conversation. A conversation missing from the local history stays missing.
    pub async fn update_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> Result<Conversation, ClientError> {
        let title = self.validate_title(title).await?;
        let (token, epoch) = self.begin(ChatOp::UpdateConversation).await?;
        let res = self.run(self.chats.update_chat(&token, id, &title)).await?;
        self.finish(ChatOp::UpdateConversation, epoch, res, |chat| {
            ChatAction::Updated(chat.clone())
        })
        .await
    }

    /// Delete a conversation; a selected conversation is deselected.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), ClientError> {
        let (token, epoch) = self.begin(ChatOp::DeleteConversation).await?;
        let res = self.run(self.chats.delete_chat(&token, id)).await?;
        self.finish(ChatOp::DeleteConversation, epoch, res, |_| {
            ChatAction::Deleted(id.to_string())
        })
        .await
    }

    /// Focus a conversation (or none). Local only.
    pub async fn select_conversation(&self, id: Option<&str>) -> Result<(), ClientError> {
        let mut g = self.state.write().await;
        if g.chat.apply(ChatAction::Select(id.map(str::to_string))) {
            Ok(())
        } else {
            Err(ClientError::UnknownConversation(
                id.unwrap_or_default().to_string(),
            ))
        }
    }

    /// Post a message; the server's full message list replaces the local one.
    pub async fn append_message(
        &self,
        chat_id: &str,
        draft: MessageDraft,
    ) -> Result<Vec<Message>, ClientError> {
        let (token, epoch) = self.begin(ChatOp::SendMessage).await?;
        let res = self.run(self.chats.add_message(&token, chat_id, &draft)).await?;
        self.finish(ChatOp::SendMessage, epoch, res, |messages| {
            ChatAction::MessagesReplaced {
                chat_id: chat_id.to_string(),
                messages: messages.clone(),
            }
        })
        .await
    }

    async fn validate_title(&self, title: &str) -> Result<String, ClientError> {
        let title = title.trim();
        if title.is_empty() {
            self.state
                .write()
                .await
                .chat
                .apply(ChatAction::Invalid(TITLE_REQUIRED.to_string()));
            return Err(ClientError::Validation(TITLE_REQUIRED.to_string()));
        }
        Ok(title.to_string())
    }

    /// Check for a credential and mark `op` pending. Returns the token and the current epoch.
    async fn begin(&self, op: ChatOp) -> Result<(String, u64), ClientError> {
        let mut g = self.state.write().await;
        let token = g
            .auth
            .credential()
            .map(str::to_string)
            .ok_or(ClientError::Unauthenticated)?;
        g.chat.apply(ChatAction::Started(op));
        Ok((token, g.chat.epoch()))
    }

    async fn finish<T>(
        &self,
        op: ChatOp,
        epoch: u64,
        res: Result<T, ApiError>,
        on_ok: impl FnOnce(&T) -> ChatAction,
    ) -> Result<T, ClientError> {
        let mut g = self.state.write().await;
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if g.chat.epoch() != epoch {
            log::debug!("dropping {:?} result from a previous session", op);
            return Err(ClientError::SessionEnded);
        }
        match res {
            Ok(value) => {
                g.chat.apply(on_ok(&value));
                Ok(value)
            }
            Err(e) => {
                let reason = e.reason_or(op.fallback_reason());
                log::debug!("{:?} failed: {}", op, e);
                g.chat.apply(ChatAction::Failed {
                    op,
                    reason: reason.clone(),
                });
                Err(ClientError::Api { reason, source: e })
            }
        }
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ClientError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ClientError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    Ok(())
}
