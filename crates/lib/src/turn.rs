//! One user turn: persist the user's message, ask the completion API, persist the reply.
//!
//! The steps are not atomic. If persisting the user's message fails nothing else
//! happens; if the completion or the second append fails, the user's message is
//! already stored server-side. The composer is cleared only when every step succeeded.

use crate::client::{ChatClient, ClientError};
use crate::llm::CompletionMessage;
use crate::model::{ConversationId, Message, MessageDraft, SenderType};
use std::sync::atomic::{AtomicBool, Ordering};

/// Text being typed for the next turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    text: String,
}

impl Composer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub chat_id: ConversationId,
    /// Assistant text as returned by the completion API.
    pub reply: String,
    /// Conversation messages after the reply was stored.
    pub messages: Vec<Message>,
}

/// Holds the "is sending" flag; releases it on drop.
struct SendGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Transcript for the completion API: the system instruction, then every stored message in order.
/// The latest user message is already the last stored entry and is not repeated.
pub fn build_transcript(system_prompt: &str, messages: &[Message]) -> Vec<CompletionMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(CompletionMessage::system(system_prompt));
    out.extend(messages.iter().map(|m| match m.sender_type {
        SenderType::User => CompletionMessage::user(m.content.clone()),
        SenderType::Assistant => CompletionMessage::assistant(m.content.clone()),
    }));
    out
}

impl ChatClient {
    /// True while a turn is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Send the composer's text to the selected conversation and store the assistant's reply.
    /// The conversation is the one selected when the call starts, even if the selection changes meanwhile.
    pub async fn send_turn(
        &self,
        composer: &mut Composer,
        model: &str,
    ) -> Result<TurnReply, ClientError> {
        if composer.is_blank() {
            return Err(ClientError::Validation("Message is empty".to_string()));
        }
        let chat_id = self
            .read(|s| s.chat.selected_id().map(str::to_string))
            .await
            .ok_or(ClientError::NoConversationSelected)?;
        let _guard = SendGuard::acquire(&self.sending).ok_or(ClientError::TurnInProgress)?;
        let content = composer.text().to_string();

        let messages = self
            .append_message(&chat_id, MessageDraft::user(content))
            .await?;

        let transcript = build_transcript(&self.options.system_prompt, &messages);
        let reply = match self.run(self.completion.complete(model, &transcript)).await? {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("completion failed for chat {}: {}", chat_id, e);
                return Err(e.into());
            }
        };

        let messages = match self
            .append_message(&chat_id, MessageDraft::assistant(reply.clone()))
            .await
        {
            Ok(m) => m,
            Err(e) => {
                log::error!("storing assistant reply for chat {} failed: {}", chat_id, e);
                return Err(e);
            }
        };

        composer.clear();
        Ok(TurnReply {
            chat_id,
            reply,
            messages,
        })
    }
}
