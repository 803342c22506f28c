//! Chat collection: conversation history, selected conversation, and request flags.
//!
//! The selection is stored as an identifier and resolved against the history on
//! every read, so a message-list replacement is visible through both at once.

use super::RequestStatus;
use crate::model::{Conversation, ConversationId, Message};
use std::collections::HashSet;

/// Chat operations that carry their own lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOp {
    FetchHistory,
    AddConversation,
    UpdateConversation,
    DeleteConversation,
    SendMessage,
}

impl ChatOp {
    /// Reason shown when the backend gave none.
    pub fn fallback_reason(self) -> &'static str {
        match self {
            ChatOp::FetchHistory => "Failed to fetch chat history",
            ChatOp::AddConversation => "Failed to add chat",
            ChatOp::UpdateConversation => "Failed to update chat",
            ChatOp::DeleteConversation => "Failed to delete chat",
            ChatOp::SendMessage => "Failed to add message",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequests {
    pub fetch_history: RequestStatus,
    pub add_conversation: RequestStatus,
    pub update_conversation: RequestStatus,
    pub delete_conversation: RequestStatus,
    pub send_message: RequestStatus,
}

impl ChatRequests {
    fn get_mut(&mut self, op: ChatOp) -> &mut RequestStatus {
        match op {
            ChatOp::FetchHistory => &mut self.fetch_history,
            ChatOp::AddConversation => &mut self.add_conversation,
            ChatOp::UpdateConversation => &mut self.update_conversation,
            ChatOp::DeleteConversation => &mut self.delete_conversation,
            ChatOp::SendMessage => &mut self.send_message,
        }
    }

    pub fn get(&self, op: ChatOp) -> &RequestStatus {
        match op {
            ChatOp::FetchHistory => &self.fetch_history,
            ChatOp::AddConversation => &self.add_conversation,
            ChatOp::UpdateConversation => &self.update_conversation,
            ChatOp::DeleteConversation => &self.delete_conversation,
            ChatOp::SendMessage => &self.send_message,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ChatAction {
    /// A non-fetch request went out. Fetches use [`ChatState::begin_fetch`].
    Started(ChatOp),
    FetchSucceeded {
        seq: u64,
        chats: Vec<Conversation>,
    },
    FetchFailed {
        seq: u64,
        reason: String,
    },
    Added(Conversation),
    Updated(Conversation),
    Deleted(ConversationId),
    MessagesReplaced {
        chat_id: ConversationId,
        messages: Vec<Message>,
    },
    Failed {
        op: ChatOp,
        reason: String,
    },
    /// Input rejected before any request (e.g. empty title).
    Invalid(String),
    Select(Option<ConversationId>),
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    history: Vec<Conversation>,
    selected: Option<ConversationId>,
    pub requests: ChatRequests,
    error: Option<String>,
    fetch_seq: u64,
    epoch: u64,
}

impl ChatState {
    pub fn history(&self) -> &[Conversation] {
        &self.history
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.history.iter().find(|c| c.id == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected conversation, resolved against the history.
    pub fn selected_chat(&self) -> Option<&Conversation> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Bumped by every reset (logout). Results of requests issued in an older epoch must not be applied.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loading(&self) -> bool {
        self.requests.fetch_history.is_pending()
    }

    /// Mark a history fetch as pending and return its sequence number.
    /// Only the response carrying the latest number is applied.
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.requests.fetch_history = RequestStatus::Pending;
        self.error = None;
        self.fetch_seq
    }

    /// Apply one transition. Returns false when the action was ignored
    /// (stale fetch, unknown id, selection of an absent conversation).
    pub fn apply(&mut self, action: ChatAction) -> bool {
        match action {
            ChatAction::Started(op) => {
                *self.requests.get_mut(op) = RequestStatus::Pending;
                self.error = None;
                true
            }
            ChatAction::FetchSucceeded { seq, chats } => {
                if seq != self.fetch_seq {
                    log::warn!(
                        "discarding stale chat history response (seq {} < {})",
                        seq,
                        self.fetch_seq
                    );
                    return false;
                }
                self.history = dedup_by_id(chats);
                self.requests.fetch_history = RequestStatus::Succeeded;
                self.drop_dangling_selection();
                true
            }
            ChatAction::FetchFailed { seq, reason } => {
                if seq != self.fetch_seq {
                    return false;
                }
                self.requests.fetch_history = RequestStatus::Failed(reason.clone());
                self.error = Some(reason);
                true
            }
            ChatAction::Added(chat) => {
                match self.history.iter_mut().find(|c| c.id == chat.id) {
                    Some(existing) => *existing = chat,
                    None => self.history.push(chat),
                }
                self.requests.add_conversation = RequestStatus::Succeeded;
                true
            }
            ChatAction::Updated(chat) => {
                self.requests.update_conversation = RequestStatus::Succeeded;
                match self.history.iter_mut().find(|c| c.id == chat.id) {
                    Some(existing) => {
                        *existing = chat;
                        true
                    }
                    None => false,
                }
            }
            ChatAction::Deleted(id) => {
                self.requests.delete_conversation = RequestStatus::Succeeded;
                let before = self.history.len();
                if let Some(pos) = self.history.iter().position(|c| c.id == id) {
                    self.history.remove(pos);
                }
                if self.selected.as_deref() == Some(id.as_str()) {
                    self.selected = None;
                }
                self.history.len() != before
            }
            ChatAction::MessagesReplaced { chat_id, messages } => {
                self.requests.send_message = RequestStatus::Succeeded;
                match self.history.iter_mut().find(|c| c.id == chat_id) {
                    Some(chat) => {
                        chat.messages = messages;
                        true
                    }
                    None => false,
                }
            }
            ChatAction::Failed { op, reason } => {
                *self.requests.get_mut(op) = RequestStatus::Failed(reason.clone());
                self.error = Some(reason);
                true
            }
            ChatAction::Invalid(reason) => {
                self.error = Some(reason);
                true
            }
            ChatAction::Select(None) => {
                self.selected = None;
                true
            }
            ChatAction::Select(Some(id)) => {
                if self.get(&id).is_none() {
                    return false;
                }
                self.selected = Some(id);
                true
            }
            ChatAction::Reset => {
                // Keep the counters so requests issued before the reset stay stale.
                let fetch_seq = self.fetch_seq + 1;
                let epoch = self.epoch + 1;
                *self = ChatState {
                    fetch_seq,
                    epoch,
                    ..ChatState::default()
                };
                true
            }
        }
    }

    fn drop_dangling_selection(&mut self) {
        if let Some(id) = self.selected.as_deref() {
            if self.get(id).is_none() {
                self.selected = None;
            }
        }
    }
}

fn dedup_by_id(chats: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    chats
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}
