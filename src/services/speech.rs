use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("voice capture is not available on this platform")]
    CapabilityUnavailable,

    #[error("voice capture failed: {0}")]
    Capture(String),
}

/// Events delivered by a running capture session.
#[derive(Clone, Debug)]
pub enum CaptureEvent {
    /// A recognized segment. Non-final segments are continuous partial
    /// results and are ignored by the composer.
    Segment { text: String, is_final: bool },
    /// The platform reported a capture error; the session is dead.
    Error(String),
    /// The platform ended the session on its own (e.g. silence timeout).
    Ended,
}

/// A live capture session. Dropping the handle without calling `stop` is a
/// leak of the platform stream, so owners stop it explicitly on teardown.
pub trait CaptureHandle: Send {
    fn stop(&mut self);
}

/// The platform's voice-to-text facility, injected so hosts can supply the
/// real backend and tests a scripted one.
pub trait SpeechCapability: Send + Sync + 'static {
    fn is_available(&self) -> bool;

    /// Begin a capture session, delivering events on `events`.
    fn begin_capture(
        &self,
        events: UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>, SpeechError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

/// Three-state wrapper around the platform capability:
/// idle -> listening -> idle, with platform errors collapsing back to idle.
pub struct SpeechAdapter {
    capability: Arc<dyn SpeechCapability>,
    state: CaptureState,
    handle: Option<Box<dyn CaptureHandle>>,
}

impl SpeechAdapter {
    pub fn new(capability: Arc<dyn SpeechCapability>) -> Self {
        Self {
            capability,
            state: CaptureState::Idle,
            handle: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// Start capturing. Valid only from idle; a start while listening is
    /// ignored. An unavailable platform leaves the adapter idle.
    pub fn start(
        &mut self,
        events: UnboundedSender<CaptureEvent>,
    ) -> Result<(), SpeechError> {
        if self.state == CaptureState::Listening {
            debug!("Capture already active, ignoring start");
            return Ok(());
        }
        if !self.capability.is_available() {
            return Err(SpeechError::CapabilityUnavailable);
        }
        let handle = self.capability.begin_capture(events)?;
        self.handle = Some(handle);
        self.state = CaptureState::Listening;
        debug!("Voice capture started");
        Ok(())
    }

    /// Stop capturing and return to idle. Safe to call from any state.
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
            debug!("Voice capture stopped");
        }
        self.state = CaptureState::Idle;
    }

    /// A platform error is a terminal abort: release the session and return
    /// to idle. Not a distinct persisted state.
    pub fn abort(&mut self, error: &str) {
        warn!(error = %error, "Voice capture aborted");
        self.stop();
    }
}

impl Drop for SpeechAdapter {
    fn drop(&mut self) {
        // Never leak an open microphone stream past the hosting view.
        self.stop();
    }
}

/// Append a final recognized segment to composer text with a separating
/// space.
pub fn append_final_segment(composer: &mut String, segment: &str) {
    let segment = segment.trim();
    if segment.is_empty() {
        return;
    }
    if !composer.is_empty() && !composer.ends_with(' ') {
        composer.push(' ');
    }
    composer.push_str(segment);
}
