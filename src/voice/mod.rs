//! Speech interaction layer
//!
//! Capability probe, recognition session, synthesis controller, and the
//! coordinator that merges them into one observable state.

mod coordinator;
pub mod language;
mod probe;
mod recognition;
mod synthesis;
mod types;

pub use coordinator::{
    Coordinator, ErrorHandler, NotifyHandler, SpeechCallbacks, TranscriptHandler,
};
pub use language::{DEFAULT_LANGUAGE, Language, SUPPORTED_LANGUAGES};
pub use probe::{Capabilities, CapabilityProbe};
pub use recognition::{RecognitionSession, RecognitionUpdate};
pub use synthesis::{
    CompletionSender, SpeechCompletion, SpeechOutcome, SynthesisController, SynthesisUpdate,
    resolve_params,
};
pub use types::{
    DEFAULT_PITCH, DEFAULT_RATE, DEFAULT_VOLUME, PITCH_RANGE, RATE_RANGE, RecognitionState,
    SpeechConfig, SpeechState, SynthesisState, TranscriptEvent, UtteranceConfig, VOLUME_RANGE,
    VoiceDescriptor,
};
