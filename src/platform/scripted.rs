//! In-process platform driven by the caller
//!
//! Support flags, microphone grant, and voices are configured up front;
//! recognizer and synthesizer callbacks are emitted explicitly. Every call the
//! sessions make is recorded for later inspection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    RecognitionEvent, RecognitionResult, RecognitionSink, SpeechPlatform, SynthesisEvent,
    SynthesisSink, UtteranceParams,
};
use crate::error::SpeechError;
use crate::voice::{SpeechConfig, VoiceDescriptor};

/// A call made into the platform
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    RequestMicrophone,
    StartCapture(SpeechConfig),
    StopCapture,
    SpeakUtterance {
        text: String,
        params: UtteranceParams,
    },
    CancelUtterance,
    PauseUtterance,
    ResumeUtterance,
}

#[derive(Debug)]
struct ScriptState {
    recognition: bool,
    synthesis: bool,
    microphone: bool,
    voices: Vec<VoiceDescriptor>,
    capture_failure: Option<String>,
    utterance_failure: Option<String>,
    auto_start: bool,
    auto_end_on_stop: bool,
    capture: Option<RecognitionSink>,
    utterance: Option<SynthesisSink>,
    calls: Vec<PlatformCall>,
}

/// Scripted speech platform
///
/// Cloning shares the underlying script, so a test can keep one handle while
/// the coordinator owns another.
#[derive(Debug, Clone)]
pub struct ScriptedPlatform {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlatform {
    /// Platform supporting everything, with microphone access granted
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                recognition: true,
                synthesis: true,
                microphone: true,
                voices: Vec::new(),
                capture_failure: None,
                utterance_failure: None,
                auto_start: false,
                auto_end_on_stop: false,
                capture: None,
                utterance: None,
                calls: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn with_recognition(self, supported: bool) -> Self {
        self.lock().recognition = supported;
        self
    }

    #[must_use]
    pub fn with_synthesis(self, supported: bool) -> Self {
        self.lock().synthesis = supported;
        self
    }

    #[must_use]
    pub fn with_microphone(self, granted: bool) -> Self {
        self.lock().microphone = granted;
        self
    }

    #[must_use]
    pub fn with_voices(self, voices: Vec<VoiceDescriptor>) -> Self {
        self.lock().voices = voices;
        self
    }

    /// Emit `Started` as soon as capture is opened
    #[must_use]
    pub fn with_auto_start(self) -> Self {
        self.lock().auto_start = true;
        self
    }

    /// Emit `Ended` as soon as capture stop is requested
    #[must_use]
    pub fn with_auto_end_on_stop(self) -> Self {
        self.lock().auto_end_on_stop = true;
        self
    }

    /// Make the next `start_capture` fail synchronously
    pub fn fail_next_capture(&self, reason: impl Into<String>) {
        self.lock().capture_failure = Some(reason.into());
    }

    /// Make the next `speak_utterance` fail synchronously
    pub fn fail_next_utterance(&self, reason: impl Into<String>) {
        self.lock().utterance_failure = Some(reason.into());
    }

    pub fn set_microphone(&self, granted: bool) {
        self.lock().microphone = granted;
    }

    pub fn set_voices(&self, voices: Vec<VoiceDescriptor>) {
        self.lock().voices = voices;
    }

    /// Calls recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Texts passed to `speak_utterance`, in order
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::SpeakUtterance { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Parameters of the most recent `speak_utterance`
    #[must_use]
    pub fn last_utterance_params(&self) -> Option<UtteranceParams> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            PlatformCall::SpeakUtterance { params, .. } => Some(params.clone()),
            _ => None,
        })
    }

    /// Emit a recognizer event to the most recent capture listener
    ///
    /// Returns false when there is no listener or it was detached.
    pub fn emit_recognition(&self, event: RecognitionEvent) -> bool {
        let sink = self.lock().capture.clone();
        sink.is_some_and(|s| s.emit(event))
    }

    pub fn emit_started(&self) -> bool {
        self.emit_recognition(RecognitionEvent::Started)
    }

    pub fn emit_interim(&self, text: &str) -> bool {
        self.emit_recognition(RecognitionEvent::Results {
            result_index: 0,
            results: vec![RecognitionResult::interim(text)],
        })
    }

    pub fn emit_final(&self, text: &str) -> bool {
        self.emit_recognition(RecognitionEvent::Results {
            result_index: 0,
            results: vec![RecognitionResult::finalized(text)],
        })
    }

    pub fn emit_recognition_error(&self, reason: &str) -> bool {
        self.emit_recognition(RecognitionEvent::Error {
            reason: reason.to_string(),
        })
    }

    pub fn emit_ended(&self) -> bool {
        self.emit_recognition(RecognitionEvent::Ended)
    }

    /// Emit a synthesizer event to the most recent utterance listener
    pub fn emit_synthesis(&self, event: SynthesisEvent) -> bool {
        let sink = self.lock().utterance.clone();
        sink.is_some_and(|s| s.emit(event))
    }

    /// Report natural completion of the current utterance
    pub fn finish_utterance(&self) -> bool {
        self.emit_synthesis(SynthesisEvent::Ended)
    }

    pub fn fail_utterance(&self, reason: &str) -> bool {
        self.emit_synthesis(SynthesisEvent::Error {
            reason: reason.to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl SpeechPlatform for ScriptedPlatform {
    fn supports_recognition(&self) -> bool {
        self.lock().recognition
    }

    fn supports_synthesis(&self) -> bool {
        self.lock().synthesis
    }

    async fn request_microphone(&self) -> bool {
        let mut state = self.lock();
        state.calls.push(PlatformCall::RequestMicrophone);
        state.microphone
    }

    fn start_capture(
        &self,
        config: &SpeechConfig,
        sink: RecognitionSink,
    ) -> Result<(), SpeechError> {
        let auto_start = {
            let mut state = self.lock();
            state.calls.push(PlatformCall::StartCapture(config.clone()));
            if let Some(reason) = state.capture_failure.take() {
                return Err(SpeechError::recognition(reason));
            }
            state.capture = Some(sink.clone());
            state.auto_start
        };

        if auto_start {
            sink.emit(RecognitionEvent::Started);
        }
        Ok(())
    }

    fn stop_capture(&self) {
        let auto_end = {
            let mut state = self.lock();
            state.calls.push(PlatformCall::StopCapture);
            state.auto_end_on_stop.then(|| state.capture.clone()).flatten()
        };

        if let Some(sink) = auto_end {
            sink.emit(RecognitionEvent::Ended);
        }
    }

    fn enumerate_voices(&self) -> Vec<VoiceDescriptor> {
        self.lock().voices.clone()
    }

    fn speak_utterance(
        &self,
        text: &str,
        params: &UtteranceParams,
        sink: SynthesisSink,
    ) -> Result<(), SpeechError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::SpeakUtterance {
            text: text.to_string(),
            params: params.clone(),
        });
        if let Some(reason) = state.utterance_failure.take() {
            return Err(SpeechError::synthesis(reason));
        }
        state.utterance = Some(sink);
        Ok(())
    }

    fn cancel_utterance(&self) {
        self.record(PlatformCall::CancelUtterance);
    }

    fn pause_utterance(&self) {
        self.record(PlatformCall::PauseUtterance);
    }

    fn resume_utterance(&self) {
        self.record(PlatformCall::ResumeUtterance);
    }
}
