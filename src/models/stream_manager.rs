use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::conversation::Conversation;
use super::events::SessionEvent;

/// Target reading rate of the reveal, in words per second.
const WORDS_PER_SECOND: f64 = 150.0;

/// Per-character delay clamp, in milliseconds. Guards degenerate inputs:
/// a one-word reply would otherwise reveal instantly, a very long one would
/// crawl.
const MIN_CHAR_DELAY_MS: f64 = 0.01;
const MAX_CHAR_DELAY_MS: f64 = 0.3;

pub type EventSender = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// How a reveal session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed,
    Cancelled,
}

struct ActiveReveal {
    cancel_flag: Arc<AtomicBool>,
}

/// Registry of reveal sessions, keyed by conversation id.
///
/// At most one session per conversation: registering a new one cancels the
/// previous session's flag first, so a stale timer chain can never keep
/// writing into a slot that no longer belongs to it.
pub struct StreamManager {
    sessions: Mutex<HashMap<String, ActiveReveal>>,
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session for a conversation and return its cancel flag.
    /// Any existing session for the same conversation is cancelled first.
    pub fn register(&self, conv_id: &str) -> Arc<AtomicBool> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.remove(conv_id) {
            existing.cancel_flag.store(true, Ordering::Relaxed);
            debug!(conv_id = %conv_id, "Cancelled existing reveal before registering new one");
        }
        let cancel_flag = Arc::new(AtomicBool::new(false));
        sessions.insert(
            conv_id.to_string(),
            ActiveReveal {
                cancel_flag: cancel_flag.clone(),
            },
        );
        cancel_flag
    }

    /// Remove a finished session. A session that was already replaced by a
    /// newer registration is left alone.
    pub fn finish(&self, conv_id: &str, cancel_flag: &Arc<AtomicBool>) {
        let mut sessions = self.sessions.lock();
        if let Some(active) = sessions.get(conv_id) {
            if Arc::ptr_eq(&active.cancel_flag, cancel_flag) {
                sessions.remove(conv_id);
            }
        }
    }

    /// Cancel the session for a conversation, if any.
    pub fn cancel(&self, conv_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        if let Some(active) = sessions.remove(conv_id) {
            active.cancel_flag.store(true, Ordering::Relaxed);
            debug!(conv_id = %conv_id, "Reveal cancelled");
            true
        } else {
            false
        }
    }

    /// Cancel every session (host teardown).
    pub fn cancel_all(&self) {
        let mut sessions = self.sessions.lock();
        for (conv_id, active) in sessions.drain() {
            active.cancel_flag.store(true, Ordering::Relaxed);
            debug!(conv_id = %conv_id, "Reveal cancelled during teardown");
        }
    }

    /// Whether a conversation has an active session.
    pub fn is_active(&self, conv_id: &str) -> bool {
        self.sessions.lock().contains_key(conv_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-character delay for a reply, per the reading-rate formula.
fn per_char_delay(text: &str) -> Duration {
    let word_count = text.split_whitespace().count();
    let char_count = text.chars().count().max(1);
    let target_duration_ms = word_count as f64 / WORDS_PER_SECOND * 1000.0;
    let delay_ms =
        (target_duration_ms / char_count as f64).clamp(MIN_CHAR_DELAY_MS, MAX_CHAR_DELAY_MS);
    Duration::from_secs_f64(delay_ms / 1000.0)
}

/// Reveal `text` into the assistant slot at `message_index`, one character
/// per tick, at the reading-rate delay.
///
/// Writes are monotonically growing prefixes on char boundaries, confined to
/// the owned slot. Exactly one terminal transition: either the slot is
/// marked complete with the full text, or the session was cancelled and the
/// slot is left as last written.
pub async fn run_reveal(
    conv_id: &str,
    text: &str,
    message_index: usize,
    conversation: &Arc<Mutex<Conversation>>,
    cancel_flag: &Arc<AtomicBool>,
    events: &EventSender,
) -> RevealOutcome {
    let delay = per_char_delay(text);
    let char_count = text.chars().count();
    debug!(
        conv_id = %conv_id,
        chars = char_count,
        delay_us = delay.as_micros() as u64,
        "Starting reveal"
    );

    let mut revealed = 0usize;
    for (byte_index, ch) in text.char_indices() {
        tokio::time::sleep(delay).await;

        // Check after every tick so a cancel that lands during the sleep
        // never writes another character.
        if cancel_flag.load(Ordering::Relaxed) {
            warn!(conv_id = %conv_id, revealed, "Reveal cancelled mid-flight");
            let _ = events.send(SessionEvent::RevealCancelled {
                conversation_id: conv_id.to_string(),
                message_index,
            });
            return RevealOutcome::Cancelled;
        }

        let end = byte_index + ch.len_utf8();
        revealed += 1;
        conversation
            .lock()
            .set_streaming_prefix(message_index, text[..end].to_string());
        let _ = events.send(SessionEvent::RevealProgress {
            conversation_id: conv_id.to_string(),
            message_index,
            revealed_chars: revealed,
        });
    }

    // One last cancellation check so a cancel that raced the final tick
    // still wins over completion.
    if cancel_flag.load(Ordering::Relaxed) {
        let _ = events.send(SessionEvent::RevealCancelled {
            conversation_id: conv_id.to_string(),
            message_index,
        });
        return RevealOutcome::Cancelled;
    }

    conversation
        .lock()
        .complete_message(message_index, text.to_string());
    let _ = events.send(SessionEvent::RevealCompleted {
        conversation_id: conv_id.to_string(),
        message_index,
    });
    debug!(conv_id = %conv_id, chars = char_count, "Reveal complete");
    RevealOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn reveal_fixture(text: &str) -> (Arc<Mutex<Conversation>>, usize) {
        let mut conv = Conversation::new();
        conv.push_user_message("question");
        let slot = conv.push_assistant_pending(None, None);
        (Arc::new(Mutex::new(conv)), slot)
    }

    #[test]
    fn delay_is_clamped_for_degenerate_inputs() {
        // One short word: unclamped delay would be ~3.3ms per char.
        let short = per_char_delay("hi").as_secs_f64() * 1000.0;
        assert!((short - MAX_CHAR_DELAY_MS).abs() < 1e-9, "got {short}ms");
        // Huge character count per word pushes below the lower clamp.
        let long_word = "x".repeat(100_000);
        let long = per_char_delay(&long_word).as_secs_f64() * 1000.0;
        assert!((long - MIN_CHAR_DELAY_MS).abs() < 1e-9, "got {long}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_produces_monotonic_prefixes_and_completes() {
        let text = "hi there";
        let (conversation, slot) = reveal_fixture(text);
        let manager = StreamManager::new();
        let flag = manager.register("c-1");
        let (tx, mut rx) = unbounded_channel();

        let conv = conversation.clone();
        let handle = tokio::spawn(async move {
            run_reveal("c-1", text, slot, &conv, &flag, &tx).await
        });

        assert_eq!(handle.await.unwrap(), RevealOutcome::Completed);

        // Every prefix length 1..=n appears exactly once, in order.
        let mut expected = 1usize;
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::RevealProgress { revealed_chars, .. } => {
                    assert_eq!(revealed_chars, expected);
                    expected += 1;
                }
                SessionEvent::RevealCompleted { message_index, .. } => {
                    assert_eq!(message_index, slot);
                    completed = true;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(expected, text.chars().count() + 1);
        assert!(completed);

        let conv = conversation.lock();
        let message = conv.message(slot).unwrap();
        assert_eq!(message.text, text);
        assert!(message.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_duration_tracks_the_reading_rate() {
        // 2 words -> 13.33ms target across 8 chars, delay unclamped.
        let text = "hi there";
        let (conversation, slot) = reveal_fixture(text);
        let manager = StreamManager::new();
        let flag = manager.register("c-1");
        let (tx, _rx) = unbounded_channel();

        let started = tokio::time::Instant::now();
        run_reveal("c-1", text, slot, &conversation, &flag, &tx).await;
        let elapsed = started.elapsed();

        let target = Duration::from_secs_f64(2.0 / 150.0);
        assert!(elapsed >= target.mul_f64(0.9), "too fast: {elapsed:?}");
        assert!(elapsed <= target.mul_f64(1.5), "too slow: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn multibyte_text_reveals_on_char_boundaries() {
        let text = "héllo ⚡ wörld";
        let (conversation, slot) = reveal_fixture(text);
        let manager = StreamManager::new();
        let flag = manager.register("c-1");
        let (tx, _rx) = unbounded_channel();

        let outcome = run_reveal("c-1", text, slot, &conversation, &flag, &tx).await;
        assert_eq!(outcome, RevealOutcome::Completed);
        assert_eq!(conversation.lock().message(slot).unwrap().text, text);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_reveal_without_completing() {
        let text = "a reply long enough to be cancelled midway through the reveal";
        let (conversation, slot) = reveal_fixture(text);
        let manager = StreamManager::new();
        let flag = manager.register("c-1");
        let (tx, mut rx) = unbounded_channel();

        let conv = conversation.clone();
        let reveal_flag = flag.clone();
        let handle = tokio::spawn(async move {
            run_reveal("c-1", text, slot, &conv, &reveal_flag, &tx).await
        });

        // Let a few characters land, then cancel.
        tokio::time::sleep(Duration::from_millis(2)).await;
        manager.cancel("c-1");

        assert_eq!(handle.await.unwrap(), RevealOutcome::Cancelled);

        let conv = conversation.lock();
        let message = conv.message(slot).unwrap();
        assert!(!message.is_complete());
        assert!(message.text.chars().count() < text.chars().count());

        let mut cancelled = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::RevealCancelled { .. }) {
                cancelled = true;
            }
        }
        assert!(cancelled);
    }

    #[test]
    fn registering_replaces_and_cancels_the_previous_session() {
        let manager = StreamManager::new();
        let first = manager.register("c-1");
        let second = manager.register("c-1");

        assert!(first.load(Ordering::Relaxed), "first flag must be cancelled");
        assert!(!second.load(Ordering::Relaxed));
        assert_eq!(manager.active_count(), 1);

        // Finishing with the stale flag must not evict the newer session.
        manager.finish("c-1", &first);
        assert!(manager.is_active("c-1"));
        manager.finish("c-1", &second);
        assert!(!manager.is_active("c-1"));
    }

    #[test]
    fn cancel_all_flags_every_session() {
        let manager = StreamManager::new();
        let a = manager.register("c-1");
        let b = manager.register("c-2");
        manager.cancel_all();
        assert!(a.load(Ordering::Relaxed));
        assert!(b.load(Ordering::Relaxed));
        assert_eq!(manager.active_count(), 0);
    }
}
