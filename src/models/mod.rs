pub mod conversation;
pub mod events;
pub mod history;
pub mod ids;
pub mod message;
pub mod stream_manager;

pub use conversation::{Conversation, DEFAULT_TITLE};
pub use events::{NoticeKind, SessionEvent};
pub use history::{search, HistoryEntry, HistoryLoadState, HistoryModel};
pub use ids::new_conversation_id;
pub use message::{CompletionState, Message, Sender};
pub use stream_manager::{run_reveal, EventSender, RevealOutcome, StreamManager};
