use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
}

/// Lifecycle of a message's content.
///
/// Only assistant messages move through the full chain; user messages are
/// created `Complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionState {
    /// Assistant slot created, reveal not started yet.
    Pending,
    /// Reveal in progress; `text` holds the revealed prefix.
    Streaming,
    /// Full text visible; copy and rating controls are enabled.
    Complete,
}

/// One turn's content within a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    /// Full content once complete; the revealed prefix while streaming.
    pub text: String,
    pub completion_state: CompletionState,
    /// User-supplied quality score, set after feedback submission.
    pub rating: Option<i32>,
    /// Correlates this message to a backend response; required for feedback.
    pub trace_id: Option<String>,
    pub created_at: SystemTime,
}

/// Monotonic per-process message id: creation-time millis, bumped past the
/// previous id when two messages land in the same millisecond.
fn next_message_id() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    LAST.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    })
    .map(|last| now.max(last + 1))
    .unwrap_or(now)
}

impl Message {
    /// Create a user message; user messages are complete on arrival.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            sender: Sender::User,
            text: text.into(),
            completion_state: CompletionState::Complete,
            rating: None,
            trace_id: None,
            created_at: SystemTime::now(),
        }
    }

    /// Create an empty assistant slot awaiting its reveal.
    pub fn assistant_pending(trace_id: Option<String>, rating: Option<i32>) -> Self {
        Self {
            id: next_message_id(),
            sender: Sender::Assistant,
            text: String::new(),
            completion_state: CompletionState::Pending,
            rating,
            trace_id,
            created_at: SystemTime::now(),
        }
    }

    /// Create an already-complete assistant message, used for failure
    /// replies that skip the reveal.
    pub fn assistant_complete(text: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            sender: Sender::Assistant,
            text: text.into(),
            completion_state: CompletionState::Complete,
            rating: None,
            trace_id: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion_state == CompletionState::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_monotonic() {
        let a = Message::user("first");
        let b = Message::user("second");
        let c = Message::assistant_pending(None, None);
        assert!(a.id < b.id);
        assert!(b.id < c.id);
    }

    #[test]
    fn user_messages_are_complete_on_creation() {
        let msg = Message::user("hello");
        assert_eq!(msg.sender, Sender::User);
        assert!(msg.is_complete());
    }

    #[test]
    fn pending_assistant_message_has_empty_text() {
        let msg = Message::assistant_pending(Some("trace-1".into()), Some(4));
        assert_eq!(msg.completion_state, CompletionState::Pending);
        assert!(msg.text.is_empty());
        assert_eq!(msg.trace_id.as_deref(), Some("trace-1"));
        assert_eq!(msg.rating, Some(4));
    }
}
