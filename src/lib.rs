//! Voice Session - speech recognition and synthesis for conversational UIs
//!
//! This library provides a platform-independent speech interaction layer:
//! - Capability probing (recognition, synthesis, microphone access)
//! - A recognition session state machine with interim/final transcripts
//! - A synthesis controller with a single-utterance queue
//! - A coordinator merging both into one observable state
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     UI code                          │
//! │   state() / subscribe()  │  callbacks  │  commands  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Coordinator                        │
//! │   Probe  │  Recognition Session  │  Synthesis       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               SpeechPlatform                         │
//! │   Host (espeak, cpal)  │  Scripted                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result, SpeechError, SpeechErrorKind};
pub use platform::{HostPlatform, ScriptedPlatform, SpeechPlatform};
pub use voice::{
    Coordinator, SpeechCallbacks, SpeechCompletion, SpeechConfig, SpeechState, TranscriptEvent,
    UtteranceConfig, VoiceDescriptor,
};
