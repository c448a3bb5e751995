use super::message::Message;

/// Kinds of non-fatal notices surfaced to the host.
///
/// Each maps to an inline indicator or toast; none of them interrupts the
/// conversation flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    /// The platform has no voice-capture facility. Emitted at most once.
    CapabilityUnavailable,
    /// Voice capture aborted with a platform error.
    CaptureFailed,
    /// The history panel could not load.
    HistoryLoadFailed,
    /// The server rejected a history deletion; the list is unchanged.
    HistoryDeleteFailed,
    /// Feedback submission was rejected; the rating control may retry.
    FeedbackRejected,
}

/// Events emitted by the engine for decoupled host updates.
/// Variants carry `conversation_id` so subscribers can filter.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A message was appended to the log.
    MessageAppended {
        conversation_id: String,
        message: Message,
    },
    /// The reveal wrote a longer prefix into its slot.
    RevealProgress {
        conversation_id: String,
        message_index: usize,
        revealed_chars: usize,
    },
    /// The reveal finished and the slot is complete.
    RevealCompleted {
        conversation_id: String,
        message_index: usize,
    },
    /// The reveal was cancelled before completing.
    RevealCancelled {
        conversation_id: String,
        message_index: usize,
    },
    /// The orchestrator's turn state changed.
    TurnStateChanged {
        conversation_id: String,
        awaiting_reply: bool,
        streaming: bool,
    },
    /// The history panel applied a fresh fetch.
    HistoryRefreshed { entry_count: usize },
    /// A feedback rating was confirmed by the store.
    RatingRecorded {
        conversation_id: String,
        message_id: u64,
        rating: i32,
    },
    /// Voice capture started or stopped.
    CaptureStateChanged { listening: bool },
    /// The composer text changed (speech appends, history selection).
    ComposerChanged { text: String },
    /// A non-fatal notice for the host to surface.
    Notice { kind: NoticeKind, detail: String },
}
