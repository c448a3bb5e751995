use std::time::SystemTime;

use tracing::debug;

use super::ids::new_conversation_id;
use super::message::{CompletionState, Message, Sender};

pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest derived title before truncation.
const TITLE_MAX_LEN: usize = 60;

/// A single conversation with the assistant: an id, a lazily-derived title,
/// and an ordered, append-only message log.
pub struct Conversation {
    id: String,
    title: String,
    messages: Vec<Message>,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl Conversation {
    /// Create a fresh conversation with a newly allocated id.
    pub fn new() -> Self {
        Self::with_id(new_conversation_id())
    }

    pub fn with_id(id: String) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set an explicit title (e.g. one provided by the server).
    pub fn set_title(&mut self, title: String) {
        self.title = clean_title(&title);
        self.updated_at = SystemTime::now();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    /// Append a complete user message. The first user message titles the
    /// conversation if no explicit title has been set yet.
    pub fn push_user_message(&mut self, text: &str) -> u64 {
        if self.title == DEFAULT_TITLE {
            self.title = clean_title(text);
            debug!(conv_id = %self.id, title = %self.title, "Derived conversation title");
        }
        let message = Message::user(text);
        let id = message.id;
        self.messages.push(message);
        self.updated_at = SystemTime::now();
        id
    }

    /// Append a pending assistant slot and return its index in the log.
    pub fn push_assistant_pending(
        &mut self,
        trace_id: Option<String>,
        rating: Option<i32>,
    ) -> usize {
        self.messages
            .push(Message::assistant_pending(trace_id, rating));
        self.updated_at = SystemTime::now();
        self.messages.len() - 1
    }

    /// Append an already-complete assistant message (failure replies skip
    /// the reveal).
    pub fn push_assistant_complete(&mut self, text: &str) {
        self.messages.push(Message::assistant_complete(text));
        self.updated_at = SystemTime::now();
    }

    pub fn message(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Write a revealed prefix into the assistant slot at `index`.
    /// Only the streaming renderer calls this, for the single slot it owns.
    pub fn set_streaming_prefix(&mut self, index: usize, prefix: String) {
        if let Some(message) = self.messages.get_mut(index) {
            debug_assert_eq!(message.sender, Sender::Assistant);
            message.completion_state = CompletionState::Streaming;
            message.text = prefix;
        }
    }

    /// Mark the assistant slot at `index` complete with its full text.
    pub fn complete_message(&mut self, index: usize, full_text: String) {
        if let Some(message) = self.messages.get_mut(index) {
            message.completion_state = CompletionState::Complete;
            message.text = full_text;
        }
        self.updated_at = SystemTime::now();
    }

    /// Record a confirmed feedback rating on the message with `message_id`.
    pub fn set_rating(&mut self, message_id: u64, rating: i32) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.rating = Some(rating);
            self.updated_at = SystemTime::now();
        }
    }

    /// True if any assistant message is currently revealing.
    pub fn has_streaming_message(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.completion_state == CompletionState::Streaming)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Clean a candidate title: first line only, stripped of quotes, truncated.
fn clean_title(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .next()
        .unwrap_or(DEFAULT_TITLE)
        .trim()
        .to_string();

    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else if cleaned.chars().count() > TITLE_MAX_LEN {
        let truncated: String = cleaned.chars().take(TITLE_MAX_LEN - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}
