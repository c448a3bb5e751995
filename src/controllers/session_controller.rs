use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::models::stream_manager::{run_reveal, EventSender, RevealOutcome, StreamManager};
use crate::models::{
    Conversation, HistoryEntry, HistoryLoadState, HistoryModel, Message, NoticeKind, SessionEvent,
};
use crate::repositories::{FeedbackRepository, HistoryRepository};
use crate::services::completion::{
    CompletionRequest, CompletionService, TRANSPORT_FAILURE_REPLY,
};
use crate::services::speech::{
    append_final_segment, CaptureEvent, SpeechAdapter, SpeechCapability, SpeechError,
};

/// Per-turn state of a conversation. Submission is only accepted in `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingReply,
    Streaming,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("message has no trace id, feedback cannot be submitted")]
    MissingTraceId,

    #[error("no such message in the current conversation")]
    UnknownMessage,

    #[error("the feedback store rejected the submission")]
    Rejected,
}

struct SessionState {
    /// The live conversation. Swapped wholesale on `new_conversation()`, so
    /// a stale reveal task keeps a handle to the orphaned log and can never
    /// write into the new one.
    conversation: Arc<Mutex<Conversation>>,
    turn: TurnState,
    composer: String,
    speech: SpeechAdapter,
    history: HistoryModel,
    /// The capability-unavailable notice is emitted at most once.
    capability_notice_sent: bool,
}

/// Top-level orchestrator for one chat surface.
///
/// Owns conversation identity, the per-turn state machine, the composer
/// buffer, voice-capture wiring, and the history panel model. Host surfaces
/// call its methods and render from snapshots, reacting to the emitted
/// `SessionEvent`s.
pub struct SessionController {
    config: EngineConfig,
    state: Arc<Mutex<SessionState>>,
    streams: Arc<StreamManager>,
    completion: Arc<dyn CompletionService>,
    history_repo: Arc<dyn HistoryRepository>,
    feedback_repo: Arc<dyn FeedbackRepository>,
    events: EventSender,
}

impl SessionController {
    pub fn new(
        config: EngineConfig,
        completion: Arc<dyn CompletionService>,
        history_repo: Arc<dyn HistoryRepository>,
        feedback_repo: Arc<dyn FeedbackRepository>,
        speech: Arc<dyn SpeechCapability>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = unbounded_channel();
        let controller = Self {
            config,
            state: Arc::new(Mutex::new(SessionState {
                conversation: Arc::new(Mutex::new(Conversation::new())),
                turn: TurnState::Idle,
                composer: String::new(),
                speech: SpeechAdapter::new(speech),
                history: HistoryModel::new(),
                capability_notice_sent: false,
            })),
            streams: Arc::new(StreamManager::new()),
            completion,
            history_repo,
            feedback_repo,
            events,
        };
        (controller, receiver)
    }

    pub fn conversation_id(&self) -> String {
        let conversation = self.state.lock().conversation.clone();
        let id = conversation.lock().id().to_string();
        id
    }

    pub fn turn_state(&self) -> TurnState {
        self.state.lock().turn
    }

    pub fn composer(&self) -> String {
        self.state.lock().composer.clone()
    }

    pub fn set_composer(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.lock().composer = text.clone();
        let _ = self.events.send(SessionEvent::ComposerChanged { text });
    }

    /// Snapshot of the current message log, in conversation order.
    pub fn messages_snapshot(&self) -> Vec<Message> {
        let conversation = self.state.lock().conversation.clone();
        let messages = conversation.lock().messages().to_vec();
        messages
    }

    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.entries().to_vec()
    }

    pub fn history_load_state(&self) -> HistoryLoadState {
        self.state.lock().history.load_state()
    }

    /// Case-insensitive substring filter over the loaded history. An empty
    /// query yields an empty result ("no active search").
    pub fn search_history(&self, query: &str) -> Vec<HistoryEntry> {
        let state = self.state.lock();
        crate::models::search(query, state.history.entries())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Submit the composer text as a new turn.
    ///
    /// Returns false when the composer is empty or a turn is already in
    /// flight (the composer is disabled between submission and the next
    /// idle). The turn itself runs as a spawned task: request, placeholder
    /// append, reveal, history refresh.
    pub fn submit(&self) -> bool {
        let (conversation, prompt) = {
            let mut state = self.state.lock();
            if state.turn != TurnState::Idle {
                debug!(turn = ?state.turn, "Turn in flight, ignoring submit");
                return false;
            }
            let prompt = state.composer.trim().to_string();
            if prompt.is_empty() {
                return false;
            }
            state.composer.clear();
            state.turn = TurnState::AwaitingReply;
            (state.conversation.clone(), prompt)
        };

        let (conv_id, user_message) = {
            let mut conv = conversation.lock();
            conv.push_user_message(&prompt);
            let message = conv
                .messages()
                .last()
                .cloned()
                .unwrap_or_else(|| Message::user(&prompt));
            (conv.id().to_string(), message)
        };

        let _ = self.events.send(SessionEvent::MessageAppended {
            conversation_id: conv_id.clone(),
            message: user_message,
        });
        let _ = self.events.send(SessionEvent::ComposerChanged {
            text: String::new(),
        });
        self.emit_turn_state(&conv_id, TurnState::AwaitingReply);

        // The cancel flag covers the whole turn: a new conversation started
        // while the request is pending aborts it before any append.
        let cancel_flag = self.streams.register(&conv_id);

        let request = CompletionRequest {
            prompt,
            conversation_id: conv_id.clone(),
            user_id: self.config.user_id.clone(),
            system_prompt: self.config.system_prompt.clone(),
        };

        let completion = self.completion.clone();
        let history_repo = self.history_repo.clone();
        let state = self.state.clone();
        let streams = self.streams.clone();
        let events = self.events.clone();
        let user_id = self.config.user_id.clone();
        let history_limit = self.config.history_limit;

        tokio::spawn(async move {
            run_turn(
                request,
                conv_id,
                conversation,
                cancel_flag,
                completion,
                history_repo,
                state,
                streams,
                events,
                user_id,
                history_limit,
            )
            .await;
        });

        true
    }

    /// Start a fresh conversation: cancel any lingering stream, reset the
    /// message log under a new identity, clear the composer.
    pub fn new_conversation(&self) {
        let old_id = self.conversation_id();
        self.streams.cancel(&old_id);

        let new_id = {
            let mut state = self.state.lock();
            let fresh = Conversation::new();
            let id = fresh.id().to_string();
            state.conversation = Arc::new(Mutex::new(fresh));
            state.turn = TurnState::Idle;
            state.composer.clear();
            id
        };

        debug!(old_id = %old_id, new_id = %new_id, "Started new conversation");
        let _ = self.events.send(SessionEvent::ComposerChanged {
            text: String::new(),
        });
        self.emit_turn_state(&new_id, TurnState::Idle);
    }

    /// Load (or reload) the history panel. Failures surface as the panel's
    /// failed indicator, never as an error to the caller.
    pub async fn load_history(&self) {
        refresh_history(
            &self.state,
            &self.history_repo,
            &self.events,
            &self.config.user_id,
            self.config.history_limit,
        )
        .await;
    }

    /// Delete a history entry. The local list changes only after the store
    /// confirms; a rejected delete leaves it untouched and raises a notice.
    pub async fn delete_history_entry(&self, conversation_id: &str) -> bool {
        match self
            .history_repo
            .delete(&self.config.user_id, conversation_id)
            .await
        {
            Ok(()) => {
                let entry_count = {
                    let mut state = self.state.lock();
                    state.history.remove_confirmed(conversation_id);
                    state.history.entries().len()
                };
                let _ = self
                    .events
                    .send(SessionEvent::HistoryRefreshed { entry_count });
                true
            }
            Err(error) => {
                warn!(conv_id = %conversation_id, error = %error, "History delete rejected");
                let _ = self.events.send(SessionEvent::Notice {
                    kind: NoticeKind::HistoryDeleteFailed,
                    detail: error.to_string(),
                });
                false
            }
        }
    }

    /// Surface a stored prompt into the composer without clearing the
    /// visible message log, so an old prompt can be reused mid-conversation.
    pub fn select_history_entry(&self, conversation_id: &str) -> bool {
        let prompt = {
            let state = self.state.lock();
            state
                .history
                .find(conversation_id)
                .map(|e| e.prompt_preview.clone())
        };
        match prompt {
            Some(prompt) => {
                self.set_composer(prompt);
                true
            }
            None => false,
        }
    }

    /// Start voice capture. Returns false (with a one-time notice) when the
    /// platform has no capture facility; the composer stays usable.
    pub fn start_voice_capture(&self) -> bool {
        let (capture_tx, mut capture_rx) = unbounded_channel();

        let started = {
            let mut state = self.state.lock();
            match state.speech.start(capture_tx) {
                Ok(()) => true,
                Err(SpeechError::CapabilityUnavailable) => {
                    if !state.capability_notice_sent {
                        state.capability_notice_sent = true;
                        let _ = self.events.send(SessionEvent::Notice {
                            kind: NoticeKind::CapabilityUnavailable,
                            detail: "Voice input is not supported here".to_string(),
                        });
                    }
                    false
                }
                Err(error) => {
                    let _ = self.events.send(SessionEvent::Notice {
                        kind: NoticeKind::CaptureFailed,
                        detail: error.to_string(),
                    });
                    false
                }
            }
        };

        if !started {
            return false;
        }

        let _ = self
            .events
            .send(SessionEvent::CaptureStateChanged { listening: true });

        let state = self.state.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = capture_rx.recv().await {
                match event {
                    CaptureEvent::Segment { text, is_final } => {
                        if !is_final {
                            continue;
                        }
                        let composer = {
                            let mut state = state.lock();
                            append_final_segment(&mut state.composer, &text);
                            state.composer.clone()
                        };
                        let _ = events.send(SessionEvent::ComposerChanged { text: composer });
                    }
                    CaptureEvent::Error(error) => {
                        state.lock().speech.abort(&error);
                        let _ = events.send(SessionEvent::Notice {
                            kind: NoticeKind::CaptureFailed,
                            detail: error,
                        });
                        let _ =
                            events.send(SessionEvent::CaptureStateChanged { listening: false });
                        break;
                    }
                    CaptureEvent::Ended => {
                        state.lock().speech.stop();
                        let _ =
                            events.send(SessionEvent::CaptureStateChanged { listening: false });
                        break;
                    }
                }
            }
            // Sender dropped without a terminal event: treat as a silent
            // end, but only if an explicit stop has not already run.
            let was_listening = {
                let mut state = state.lock();
                let listening = state.speech.is_listening();
                if listening {
                    state.speech.stop();
                }
                listening
            };
            if was_listening {
                let _ = events.send(SessionEvent::CaptureStateChanged { listening: false });
            }
        });

        true
    }

    pub fn stop_voice_capture(&self) {
        let was_listening = {
            let mut state = self.state.lock();
            let listening = state.speech.is_listening();
            state.speech.stop();
            listening
        };
        if was_listening {
            let _ = self
                .events
                .send(SessionEvent::CaptureStateChanged { listening: false });
        }
    }

    pub fn is_capturing_voice(&self) -> bool {
        self.state.lock().speech.is_listening()
    }

    /// Submit a quality rating for an assistant message. Fails fast with no
    /// network call when the message has no trace id; on confirmed success
    /// the message's rating updates from the store's receipt.
    pub async fn submit_feedback(
        &self,
        message_id: u64,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<(), FeedbackError> {
        let conversation = self.state.lock().conversation.clone();
        let trace_id = {
            let conv = conversation.lock();
            let message = conv
                .messages()
                .iter()
                .find(|m| m.id == message_id)
                .ok_or(FeedbackError::UnknownMessage)?;
            message.trace_id.clone().ok_or(FeedbackError::MissingTraceId)?
        };

        match self
            .feedback_repo
            .submit(&trace_id, rating, comment)
            .await
        {
            Ok(receipt) if receipt.success => {
                let recorded = receipt.rating.unwrap_or(rating);
                let conv_id = {
                    let mut conv = conversation.lock();
                    conv.set_rating(message_id, recorded);
                    conv.id().to_string()
                };
                let _ = self.events.send(SessionEvent::RatingRecorded {
                    conversation_id: conv_id,
                    message_id,
                    rating: recorded,
                });
                Ok(())
            }
            Ok(_) => {
                let _ = self.events.send(SessionEvent::Notice {
                    kind: NoticeKind::FeedbackRejected,
                    detail: "The store declined the rating".to_string(),
                });
                Err(FeedbackError::Rejected)
            }
            Err(error) => {
                warn!(trace_id = %trace_id, error = %error, "Feedback submission failed");
                let _ = self.events.send(SessionEvent::Notice {
                    kind: NoticeKind::FeedbackRejected,
                    detail: error.to_string(),
                });
                Err(FeedbackError::Rejected)
            }
        }
    }

    fn emit_turn_state(&self, conv_id: &str, turn: TurnState) {
        let _ = self.events.send(SessionEvent::TurnStateChanged {
            conversation_id: conv_id.to_string(),
            awaiting_reply: turn == TurnState::AwaitingReply,
            streaming: turn == TurnState::Streaming,
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Host-view teardown: no orphaned timer may keep writing, and no
        // capture stream may stay open.
        self.streams.cancel_all();
        self.state.lock().speech.stop();
    }
}

/// One conversation turn: request, placeholder append, reveal, refresh.
#[allow(clippy::too_many_arguments)]
async fn run_turn(
    request: CompletionRequest,
    conv_id: String,
    conversation: Arc<Mutex<Conversation>>,
    cancel_flag: Arc<AtomicBool>,
    completion: Arc<dyn CompletionService>,
    history_repo: Arc<dyn HistoryRepository>,
    state: Arc<Mutex<SessionState>>,
    streams: Arc<StreamManager>,
    events: EventSender,
    user_id: String,
    history_limit: u32,
) {
    let result = completion.submit(request).await;

    if cancel_flag.load(Ordering::Relaxed) {
        debug!(conv_id = %conv_id, "Turn cancelled while awaiting reply");
        streams.finish(&conv_id, &cancel_flag);
        return;
    }

    match result {
        Ok(reply) => {
            let (slot, pending) = {
                let mut conv = conversation.lock();
                let slot = conv.push_assistant_pending(reply.trace_id.clone(), reply.rating);
                let pending = conv.messages()[slot].clone();
                (slot, pending)
            };
            let _ = events.send(SessionEvent::MessageAppended {
                conversation_id: conv_id.clone(),
                message: pending,
            });
            set_turn_if_current(&state, &conversation, &conv_id, TurnState::Streaming, &events);

            let outcome = run_reveal(
                &conv_id,
                &reply.response_text,
                slot,
                &conversation,
                &cancel_flag,
                &events,
            )
            .await;
            streams.finish(&conv_id, &cancel_flag);

            if outcome == RevealOutcome::Completed {
                set_turn_if_current(&state, &conversation, &conv_id, TurnState::Idle, &events);
                // Fire-and-forget relative to the conversation: a new turn
                // may start before this refresh returns; the history model's
                // generation guard makes the last fetch win.
                refresh_history(&state, &history_repo, &events, &user_id, history_limit).await;
            }
        }
        Err(error) => {
            warn!(conv_id = %conv_id, error = %error, "Completion call failed");
            let failure = {
                let mut conv = conversation.lock();
                conv.push_assistant_complete(TRANSPORT_FAILURE_REPLY);
                conv.messages().last().cloned()
            };
            if let Some(message) = failure {
                let _ = events.send(SessionEvent::MessageAppended {
                    conversation_id: conv_id.clone(),
                    message,
                });
            }
            streams.finish(&conv_id, &cancel_flag);
            set_turn_if_current(&state, &conversation, &conv_id, TurnState::Idle, &events);
        }
    }
}

/// Update the turn state only if `conversation` is still the live one; a
/// turn whose conversation has been replaced must not touch the new state.
fn set_turn_if_current(
    state: &Arc<Mutex<SessionState>>,
    conversation: &Arc<Mutex<Conversation>>,
    conv_id: &str,
    turn: TurnState,
    events: &EventSender,
) {
    let current = {
        let mut guard = state.lock();
        if Arc::ptr_eq(&guard.conversation, conversation) {
            guard.turn = turn;
            true
        } else {
            false
        }
    };
    if current {
        let _ = events.send(SessionEvent::TurnStateChanged {
            conversation_id: conv_id.to_string(),
            awaiting_reply: turn == TurnState::AwaitingReply,
            streaming: turn == TurnState::Streaming,
        });
    }
}

async fn refresh_history(
    state: &Arc<Mutex<SessionState>>,
    repo: &Arc<dyn HistoryRepository>,
    events: &EventSender,
    user_id: &str,
    limit: u32,
) {
    let generation = state.lock().history.begin_fetch();
    match repo.fetch(user_id, limit).await {
        Ok(entries) => {
            let applied = {
                let mut guard = state.lock();
                if guard.history.apply_fetch(generation, entries) {
                    Some(guard.history.entries().len())
                } else {
                    None
                }
            };
            if let Some(entry_count) = applied {
                let _ = events.send(SessionEvent::HistoryRefreshed { entry_count });
            }
        }
        Err(error) => {
            warn!(error = %error, "History fetch failed");
            let applied = state.lock().history.apply_fetch_failure(generation);
            if applied {
                let _ = events.send(SessionEvent::Notice {
                    kind: NoticeKind::HistoryLoadFailed,
                    detail: error.to_string(),
                });
            }
        }
    }
}
