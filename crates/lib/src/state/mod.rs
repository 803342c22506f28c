//! Client state: auth and chat collection, each a plain struct changed only by `apply`.
//!
//! Reducers are synchronous and never touch the network; `ChatClient` runs the
//! requests and feeds their results in as actions.

pub mod auth;
pub mod chat;

pub use auth::{AuthAction, AuthPhase, AuthState, Notice, NOTICE_TTL};
pub use chat::{ChatAction, ChatOp, ChatRequests, ChatState};

/// Lifecycle of one kind of request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            RequestStatus::Failed(r) => Some(r),
            _ => None,
        }
    }
}

/// Everything the view reads.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub auth: AuthState,
    pub chat: ChatState,
}
