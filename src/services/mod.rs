pub mod completion;
pub mod speech;

pub use completion::{
    parse_reply, CompletionReply, CompletionRequest, CompletionService, GatewayError,
    HttpCompletionService, NO_REPLY_PLACEHOLDER, TRANSPORT_FAILURE_REPLY,
};
pub use speech::{
    append_final_segment, CaptureEvent, CaptureHandle, CaptureState, SpeechAdapter,
    SpeechCapability, SpeechError,
};
