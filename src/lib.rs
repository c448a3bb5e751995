pub mod config;
pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::EngineConfig;
pub use controllers::{SessionController, TurnState};
pub use models::{
    CompletionState, Conversation, HistoryEntry, Message, Sender, SessionEvent, StreamManager,
};
