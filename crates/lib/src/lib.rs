//! Chatter core library: conversation state, chat backend and completion
//! gateways, credential storage, and configuration used by the CLI.

pub mod api;
pub mod client;
pub mod config;
pub mod credential;
pub mod init;
pub mod llm;
pub mod model;
pub mod state;
pub mod turn;

pub use client::{ChatClient, ClientError, ClientOptions};
pub use turn::{Composer, TurnReply};
