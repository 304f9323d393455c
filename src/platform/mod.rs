//! Platform speech boundary
//!
//! The sessions depend only on [`SpeechPlatform`]; concrete hosts plug in
//! behind it. Platform callbacks are delivered as typed events through an
//! [`EventSink`] tagged with the session or utterance they belong to.

mod host;
#[cfg(feature = "microphone")]
mod microphone;
mod scripted;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

pub use host::{HostPlatform, parse_espeak_voices};
pub use scripted::{PlatformCall, ScriptedPlatform};

use crate::error::SpeechError;
use crate::voice::{SpeechConfig, VoiceDescriptor};

/// Host speech capability
///
/// Implementations must not block: long-running work (capture, playback) is
/// reported back through the sinks handed to `start_capture` and
/// `speak_utterance`.
#[async_trait]
pub trait SpeechPlatform: Send + Sync {
    /// Whether continuous speech recognition is available
    fn supports_recognition(&self) -> bool;

    /// Whether utterance synthesis is available
    fn supports_synthesis(&self) -> bool;

    /// Request transient microphone access
    ///
    /// Must release any acquired input stream before returning.
    async fn request_microphone(&self) -> bool;

    /// Open the capture stream and report events to `sink`
    ///
    /// # Errors
    ///
    /// Returns error if the capture could not be opened at all
    fn start_capture(&self, config: &SpeechConfig, sink: RecognitionSink)
    -> Result<(), SpeechError>;

    /// Request capture teardown; the platform answers with `Ended`
    fn stop_capture(&self);

    /// Voices currently known to the synthesizer (may be empty)
    fn enumerate_voices(&self) -> Vec<VoiceDescriptor>;

    /// Begin playing one utterance and report its outcome to `sink`
    ///
    /// # Errors
    ///
    /// Returns error if playback could not be started
    fn speak_utterance(
        &self,
        text: &str,
        params: &UtteranceParams,
        sink: SynthesisSink,
    ) -> Result<(), SpeechError>;

    /// Cancel the utterance in progress, if any
    fn cancel_utterance(&self);

    /// Pause the utterance in progress
    fn pause_utterance(&self) {}

    /// Resume a paused utterance
    fn resume_utterance(&self) {}
}

/// Synthesis parameters as handed to the platform: clamped and with the
/// voice resolved against the enumerated list
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceParams {
    /// Resolved voice, `None` for the platform default of `language`
    pub voice: Option<VoiceDescriptor>,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// One recognizer hypothesis set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Alternatives, best first
    pub alternatives: Vec<String>,
    pub is_final: bool,
}

impl RecognitionResult {
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: false,
        }
    }

    #[must_use]
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: true,
        }
    }

    /// Best alternative, empty when the recognizer produced none
    #[must_use]
    pub fn best(&self) -> &str {
        self.alternatives.first().map_or("", String::as_str)
    }
}

/// Raw recognizer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Capture is running
    Started,
    /// Results changed from `result_index` onwards
    Results {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// Capture fault
    Error { reason: String },
    /// Capture ended (after stop, error, or on its own)
    Ended,
}

/// Raw synthesizer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    /// Utterance played to completion
    Ended,
    Error { reason: String },
}

/// A platform event tagged with the session or utterance that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Recognition {
        session: u64,
        event: RecognitionEvent,
    },
    Synthesis {
        utterance: u64,
        event: SynthesisEvent,
    },
}

/// Event type that can be tagged with its originating id
pub trait TaggedEvent {
    fn tag(self, id: u64) -> PlatformEvent;
}

impl TaggedEvent for RecognitionEvent {
    fn tag(self, id: u64) -> PlatformEvent {
        PlatformEvent::Recognition {
            session: id,
            event: self,
        }
    }
}

impl TaggedEvent for SynthesisEvent {
    fn tag(self, id: u64) -> PlatformEvent {
        PlatformEvent::Synthesis {
            utterance: id,
            event: self,
        }
    }
}

/// Delivers tagged events to the owning state machine; returns false once
/// the receiver is gone
pub type Forwarder = Arc<dyn Fn(PlatformEvent) -> bool + Send + Sync>;

/// Listener handed to the platform for one session or utterance
///
/// Once detached, every `emit` is dropped.
pub struct EventSink<E> {
    id: u64,
    forward: Forwarder,
    detached: Arc<AtomicBool>,
    _event: PhantomData<fn(E)>,
}

pub type RecognitionSink = EventSink<RecognitionEvent>;
pub type SynthesisSink = EventSink<SynthesisEvent>;

impl<E: TaggedEvent> EventSink<E> {
    /// Create a sink and the handle that detaches it
    #[must_use]
    pub fn new(id: u64, forward: Forwarder) -> (Self, DetachHandle) {
        let detached = Arc::new(AtomicBool::new(false));
        let sink = Self {
            id,
            forward,
            detached: Arc::clone(&detached),
            _event: PhantomData,
        };
        (sink, DetachHandle(detached))
    }

    /// Forward an event; returns false if the listener is detached
    pub fn emit(&self, event: E) -> bool {
        if self.is_detached() {
            return false;
        }
        (self.forward)(event.tag(self.id))
    }
}

impl<E> EventSink<E> {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            forward: Arc::clone(&self.forward),
            detached: Arc::clone(&self.detached),
            _event: PhantomData,
        }
    }
}

impl<E> fmt::Debug for EventSink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("id", &self.id)
            .field("detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}

/// Owner side of an [`EventSink`]
#[derive(Debug)]
pub struct DetachHandle(Arc<AtomicBool>);

impl DetachHandle {
    /// Stop delivering events from the paired sink
    pub fn detach(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn collecting_forwarder() -> (Forwarder, Arc<Mutex<Vec<PlatformEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let forward: Forwarder = Arc::new(move |event| {
            sink_seen.lock().unwrap().push(event);
            true
        });
        (forward, seen)
    }

    #[test]
    fn test_sink_tags_events() {
        let (forward, seen) = collecting_forwarder();
        let (sink, _handle) = RecognitionSink::new(7, forward);

        assert!(sink.emit(RecognitionEvent::Started));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[PlatformEvent::Recognition {
                session: 7,
                event: RecognitionEvent::Started
            }]
        );
    }

    #[test]
    fn test_detached_sink_drops_events() {
        let (forward, seen) = collecting_forwarder();
        let (sink, handle) = SynthesisSink::new(3, forward);
        let clone = sink.clone();

        handle.detach();

        assert!(sink.is_detached());
        assert!(!clone.emit(SynthesisEvent::Ended));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_best_alternative() {
        let result = RecognitionResult {
            alternatives: vec!["hello".into(), "yellow".into()],
            is_final: true,
        };
        assert_eq!(result.best(), "hello");

        let empty = RecognitionResult {
            alternatives: Vec::new(),
            is_final: false,
        };
        assert_eq!(empty.best(), "");
    }
}
