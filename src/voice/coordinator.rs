//! Speech coordinator
//!
//! Facade consumed by UI code. Commands and platform events share one FIFO
//! inbox drained by a single task that owns the recognition session and the
//! synthesis controller, so every transition happens on one logical context
//! and a command always takes effect before any event queued after it.
//!
//! State is published through a `watch` channel; caller callbacks run on the
//! coordinator task after the matching state has been published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::Config;
use crate::error::SpeechError;
use crate::platform::{Forwarder, PlatformEvent, SpeechPlatform};

use super::probe::{Capabilities, CapabilityProbe};
use super::recognition::{RecognitionSession, RecognitionUpdate};
use super::synthesis::{CompletionSender, SpeechCompletion, SynthesisController, SynthesisUpdate};
use super::types::{SpeechConfig, SpeechState, UtteranceConfig, VoiceDescriptor};

pub type TranscriptHandler = Arc<dyn Fn(&str, bool) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&SpeechError) + Send + Sync>;
pub type NotifyHandler = Arc<dyn Fn() + Send + Sync>;

/// Caller notifications; every handler defaults to a no-op
///
/// Handlers may fire after the caller has logically moved on (a late final
/// transcript after the input was cleared) and must tolerate that.
#[derive(Clone)]
pub struct SpeechCallbacks {
    pub on_transcript: TranscriptHandler,
    pub on_error: ErrorHandler,
    /// Capture started
    pub on_start: NotifyHandler,
    /// Capture ended without error
    pub on_stop: NotifyHandler,
}

impl Default for SpeechCallbacks {
    fn default() -> Self {
        Self {
            on_transcript: Arc::new(|_, _| {}),
            on_error: Arc::new(|_| {}),
            on_start: Arc::new(|| {}),
            on_stop: Arc::new(|| {}),
        }
    }
}

impl SpeechCallbacks {
    #[must_use]
    pub fn on_transcript(mut self, f: impl Fn(&str, bool) + Send + Sync + 'static) -> Self {
        self.on_transcript = Arc::new(f);
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&SpeechError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }

    #[must_use]
    pub fn on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Arc::new(f);
        self
    }

    #[must_use]
    pub fn on_stop(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Arc::new(f);
        self
    }
}

impl std::fmt::Debug for SpeechCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCallbacks").finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Command {
    StartListening,
    StopListening,
    ToggleListening,
    Speak {
        text: String,
        volume: Option<f32>,
        completion: CompletionSender,
    },
    StopSpeaking,
    PauseSpeaking,
    ResumeSpeaking,
    ClearTranscript,
    ClearError,
    RecheckCapabilities,
    RefreshVoices,
    Settle(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Inbox {
    Command(Command),
    Platform(PlatformEvent),
    MicrophoneChecked { granted: bool },
    StopTimeout { session: u64 },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Microphone {
    Unknown,
    Checking,
    Known(bool),
}

enum Notification {
    Transcript { text: String, is_final: bool },
    Error(SpeechError),
    Start,
    Stop,
}

struct Handle {
    tx: mpsc::UnboundedSender<Inbox>,
    state: watch::Receiver<SpeechState>,
    probe: Arc<CapabilityProbe>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = self.tx.send(Inbox::Shutdown);
    }
}

/// Merged speech state plus command surface
///
/// Cheap to clone; all clones drive the same sessions. When the last clone
/// is dropped both sessions are torn down and any outstanding completion
/// rejects with `cancelled`.
#[derive(Clone)]
pub struct Coordinator {
    handle: Arc<Handle>,
}

impl Coordinator {
    /// Start a coordinator over `platform`
    ///
    /// Capabilities and voices are read once here; the microphone check runs
    /// in the background when `config.probe_microphone_on_start` is set.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(platform: Arc<dyn SpeechPlatform>, config: &Config, callbacks: SpeechCallbacks) -> Self {
        let probe = Arc::new(CapabilityProbe::new(Arc::clone(&platform)));
        let capabilities = probe.probe();

        let view = SpeechState {
            is_supported: capabilities.recognition_supported,
            is_synthesis_supported: capabilities.synthesis_supported,
            available_voices: platform.enumerate_voices(),
            ..SpeechState::default()
        };
        let (state_tx, state_rx) = watch::channel(view.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut actor = Actor {
            recognition: RecognitionSession::new(
                Arc::clone(&platform),
                capabilities.recognition_supported,
            ),
            synthesis: SynthesisController::new(
                Arc::clone(&platform),
                capabilities.synthesis_supported,
            ),
            platform,
            probe: Arc::clone(&probe),
            capabilities,
            callbacks,
            speech_config: config.recognition.clone(),
            utterance_config: config.utterance.clone(),
            stop_timeout: config.stop_timeout,
            view,
            state: state_tx,
            inbox: tx.clone(),
            microphone: Microphone::Unknown,
            pending_start: false,
            pending_settles: Vec::new(),
        };

        if config.probe_microphone_on_start {
            actor.check_microphone(false);
        }

        tracing::debug!(
            recognition = capabilities.recognition_supported,
            synthesis = capabilities.synthesis_supported,
            voices = actor.view.available_voices.len(),
            "speech coordinator started"
        );
        tokio::spawn(actor.run(rx));

        Self {
            handle: Arc::new(Handle {
                tx,
                state: state_rx,
                probe,
            }),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> SpeechState {
        self.handle.state.borrow().clone()
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SpeechState> {
        self.handle.state.clone()
    }

    /// Voices enumerated at construction or by the last `refresh_voices`
    #[must_use]
    pub fn available_voices(&self) -> Vec<VoiceDescriptor> {
        self.handle.state.borrow().available_voices.clone()
    }

    /// Cached capability flags
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.handle.probe.probe()
    }

    /// Begin capturing; a no-op while a capture is active or pending
    pub fn start_listening(&self) {
        self.send(Command::StartListening);
    }

    /// Request capture teardown; safe from any state
    pub fn stop_listening(&self) {
        self.send(Command::StopListening);
    }

    pub fn toggle_listening(&self) {
        self.send(Command::ToggleListening);
    }

    /// Speak `text` with the configured voice parameters
    ///
    /// `volume` overrides the configured volume for this utterance only. The
    /// returned completion may be ignored.
    pub fn speak(&self, text: impl Into<String>, volume: Option<f32>) -> SpeechCompletion {
        let (completion_tx, completion) = SpeechCompletion::pair();
        self.send(Command::Speak {
            text: text.into(),
            volume,
            completion: completion_tx,
        });
        completion
    }

    /// Cancel the utterance in progress; safe from any state
    pub fn stop_speaking(&self) {
        self.send(Command::StopSpeaking);
    }

    pub fn pause_speaking(&self) {
        self.send(Command::PauseSpeaking);
    }

    pub fn resume_speaking(&self) {
        self.send(Command::ResumeSpeaking);
    }

    pub fn clear_transcript(&self) {
        self.send(Command::ClearTranscript);
    }

    pub fn clear_error(&self) {
        self.send(Command::ClearError);
    }

    /// Probe capabilities and microphone access again
    pub fn recheck_capabilities(&self) {
        self.send(Command::RecheckCapabilities);
    }

    /// Enumerate platform voices again
    pub fn refresh_voices(&self) {
        self.send(Command::RefreshVoices);
    }

    /// Wait until every command issued and every platform event delivered
    /// before this call has been processed
    pub async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Settle(tx));
        let _ = rx.await;
    }

    fn send(&self, command: Command) {
        if self.handle.tx.send(Inbox::Command(command)).is_err() {
            tracing::debug!("coordinator stopped, dropping command");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &*self.handle.state.borrow())
            .finish()
    }
}

struct Actor {
    platform: Arc<dyn SpeechPlatform>,
    probe: Arc<CapabilityProbe>,
    capabilities: Capabilities,
    recognition: RecognitionSession,
    synthesis: SynthesisController,
    callbacks: SpeechCallbacks,
    speech_config: SpeechConfig,
    utterance_config: UtteranceConfig,
    stop_timeout: Duration,
    view: SpeechState,
    state: watch::Sender<SpeechState>,
    inbox: mpsc::UnboundedSender<Inbox>,
    microphone: Microphone,
    pending_start: bool,
    pending_settles: Vec<oneshot::Sender<()>>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Inbox>) {
        while let Some(message) = rx.recv().await {
            let mut notes = Vec::new();
            match message {
                Inbox::Shutdown => break,
                Inbox::Command(command) => self.command(command, &mut notes),
                Inbox::Platform(event) => self.platform_event(event, &mut notes),
                Inbox::MicrophoneChecked { granted } => self.microphone_checked(granted, &mut notes),
                Inbox::StopTimeout { session } => {
                    if let Some(update) = self.recognition.force_idle(session) {
                        self.recognition_update(update, &mut notes);
                    }
                }
            }
            self.publish();
            self.notify(notes);
        }

        self.teardown();
    }

    fn command(&mut self, command: Command, notes: &mut Vec<Notification>) {
        match command {
            Command::StartListening => self.start_listening(notes),
            Command::StopListening => self.stop_listening(),
            Command::ToggleListening => {
                if self.recognition.is_listening() || self.pending_start {
                    self.stop_listening();
                } else {
                    self.start_listening(notes);
                }
            }
            Command::Speak {
                text,
                volume,
                completion,
            } => {
                let config = match volume {
                    Some(volume) => self.utterance_config.clone().with_volume(volume),
                    None => self.utterance_config.clone(),
                };
                let updates = self
                    .synthesis
                    .speak(&text, &config, completion, self.forwarder());
                for update in updates {
                    self.synthesis_update(update, notes);
                }
            }
            Command::StopSpeaking => {
                if let Some(update) = self.synthesis.stop() {
                    self.synthesis_update(update, notes);
                }
            }
            Command::PauseSpeaking => {
                self.synthesis.pause();
            }
            Command::ResumeSpeaking => {
                self.synthesis.resume();
            }
            Command::ClearTranscript => self.view.current_transcript.clear(),
            Command::ClearError => self.view.last_error = None,
            Command::RecheckCapabilities => {
                self.capabilities = self.probe.reprobe();
                self.recognition
                    .set_supported(self.capabilities.recognition_supported);
                self.synthesis
                    .set_supported(self.capabilities.synthesis_supported);
                self.view.is_supported = self.capabilities.recognition_supported;
                self.view.is_synthesis_supported = self.capabilities.synthesis_supported;
                self.check_microphone(true);
            }
            Command::RefreshVoices => {
                self.view.available_voices = self.platform.enumerate_voices();
            }
            Command::Settle(ack) => {
                if self.microphone == Microphone::Checking {
                    self.pending_settles.push(ack);
                } else {
                    let _ = ack.send(());
                }
            }
        }
    }

    fn start_listening(&mut self, notes: &mut Vec<Notification>) {
        if self.recognition.active_id().is_some() || self.pending_start {
            tracing::debug!("listening already active or pending, ignoring start");
            return;
        }
        if !self.capabilities.recognition_supported {
            self.fail(SpeechError::Unsupported, notes);
            return;
        }

        match self.microphone {
            Microphone::Known(true) => self.open_capture(notes),
            Microphone::Known(false) => self.fail(SpeechError::PermissionDenied, notes),
            Microphone::Unknown => {
                self.pending_start = true;
                self.check_microphone(false);
            }
            Microphone::Checking => self.pending_start = true,
        }
    }

    fn open_capture(&mut self, notes: &mut Vec<Notification>) {
        match self.recognition.start(&self.speech_config, self.forwarder()) {
            Ok(Some(session)) => tracing::info!(session, "listening requested"),
            Ok(None) => {}
            Err(e) => self.fail(e, notes),
        }
    }

    fn stop_listening(&mut self) {
        if self.pending_start {
            tracing::debug!("cancelling pending start");
            self.pending_start = false;
            return;
        }
        if !self.recognition.stop() {
            return;
        }
        let Some(session) = self.recognition.active_id() else {
            return;
        };

        let tx = self.inbox.clone();
        let timeout = self.stop_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Inbox::StopTimeout { session });
        });
    }

    fn check_microphone(&mut self, force: bool) {
        if self.microphone == Microphone::Checking && !force {
            return;
        }
        self.microphone = Microphone::Checking;

        let probe = Arc::clone(&self.probe);
        let tx = self.inbox.clone();
        tokio::spawn(async move {
            let granted = if force {
                probe.recheck_microphone().await
            } else {
                probe.check_microphone().await
            };
            let _ = tx.send(Inbox::MicrophoneChecked { granted });
        });
    }

    fn microphone_checked(&mut self, granted: bool, notes: &mut Vec<Notification>) {
        self.microphone = Microphone::Known(granted);
        self.view.is_microphone_available = granted;

        if std::mem::take(&mut self.pending_start) {
            if granted {
                self.open_capture(notes);
            } else {
                self.fail(SpeechError::PermissionDenied, notes);
            }
        }

        for ack in self.pending_settles.drain(..) {
            let _ = ack.send(());
        }
    }

    fn platform_event(&mut self, event: PlatformEvent, notes: &mut Vec<Notification>) {
        match event {
            PlatformEvent::Recognition { session, event } => {
                for update in self.recognition.handle(session, event) {
                    self.recognition_update(update, notes);
                }
            }
            PlatformEvent::Synthesis { utterance, event } => {
                if let Some(update) = self.synthesis.handle(utterance, event) {
                    self.synthesis_update(update, notes);
                }
            }
        }
    }

    fn recognition_update(&mut self, update: RecognitionUpdate, notes: &mut Vec<Notification>) {
        match update {
            RecognitionUpdate::Started => notes.push(Notification::Start),
            RecognitionUpdate::Transcript(event) => {
                self.view.current_transcript.clone_from(&event.text);
                notes.push(Notification::Transcript {
                    text: event.text,
                    is_final: event.is_final,
                });
            }
            RecognitionUpdate::Failed(error) => self.fail(error, notes),
            RecognitionUpdate::Ended { .. } => notes.push(Notification::Stop),
        }
    }

    fn synthesis_update(&mut self, update: SynthesisUpdate, notes: &mut Vec<Notification>) {
        match update {
            SynthesisUpdate::Started { .. } | SynthesisUpdate::Finished { .. } => {}
            SynthesisUpdate::Rejected { error, .. } if error.is_self_inflicted() => {
                tracing::debug!(reason = ?error.reason(), "utterance withdrawn by caller");
            }
            SynthesisUpdate::Rejected { error, .. } => self.fail(error, notes),
        }
    }

    /// Record a sticky error and schedule the caller notification
    fn fail(&mut self, error: SpeechError, notes: &mut Vec<Notification>) {
        tracing::debug!(error = %error, "reporting speech error");
        self.view.last_error = Some(error.clone());
        notes.push(Notification::Error(error));
    }

    fn publish(&mut self) {
        self.view.recognition = self.recognition.state();
        self.view.is_listening = self.recognition.is_listening();
        self.view.synthesis = self.synthesis.state();
        self.view.is_speaking = self.synthesis.is_speaking();

        let view = &self.view;
        self.state.send_if_modified(|current| {
            if current == view {
                false
            } else {
                current.clone_from(view);
                true
            }
        });
    }

    fn notify(&self, notes: Vec<Notification>) {
        for note in notes {
            match note {
                Notification::Transcript { text, is_final } => {
                    (self.callbacks.on_transcript)(&text, is_final);
                }
                Notification::Error(error) => (self.callbacks.on_error)(&error),
                Notification::Start => (self.callbacks.on_start)(),
                Notification::Stop => (self.callbacks.on_stop)(),
            }
        }
    }

    fn forwarder(&self) -> Forwarder {
        let tx = self.inbox.clone();
        Arc::new(move |event| tx.send(Inbox::Platform(event)).is_ok())
    }

    fn teardown(&mut self) {
        self.recognition.abort();
        let _ = self.synthesis.stop();
        self.publish();
        tracing::debug!("speech coordinator stopped");
    }
}
