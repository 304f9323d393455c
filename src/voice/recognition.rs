//! Recognition session state machine
//!
//! ```text
//! Idle ──start──▶ Starting ──Started──▶ Listening ──stop──▶ Stopping ──Ended──▶ Idle
//!                    │                      │                                  ▲
//!                    └──────── Error ───────┴──▶ Failed ───────────────────────┘
//! ```
//!
//! Platform callbacks arrive as tagged [`RecognitionEvent`]s; events from any
//! session other than the active one are dropped. A session is torn down
//! (listener detached) exactly once, on its first terminal event.

use std::sync::Arc;

use crate::error::SpeechError;
use crate::platform::{
    DetachHandle, Forwarder, RecognitionEvent, RecognitionResult, RecognitionSink, SpeechPlatform,
};

use super::types::{RecognitionState, SpeechConfig, TranscriptEvent};

/// Recognizer reasons that mean the user or host refused microphone access
const PERMISSION_REASONS: &[&str] = &["not-allowed", "service-not-allowed"];

/// Normalized outcome of a session event, for the owner to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionUpdate {
    /// Capture is running
    Started,
    Transcript(TranscriptEvent),
    /// Session failed and is now idle
    Failed(SpeechError),
    /// Session ended and is now idle; `requested` is true when it followed a stop
    Ended { requested: bool },
}

#[derive(Debug)]
struct ActiveCapture {
    id: u64,
    detach: DetachHandle,
    continuous: bool,
    interim_results: bool,
    /// A final transcript was delivered in single-utterance mode
    closed: bool,
    spans: u64,
}

/// Wraps one continuous capture at a time
pub struct RecognitionSession {
    platform: Arc<dyn SpeechPlatform>,
    supported: bool,
    state: RecognitionState,
    active: Option<ActiveCapture>,
    next_id: u64,
}

impl RecognitionSession {
    /// Create an idle session; `supported` comes from the capability probe
    #[must_use]
    pub fn new(platform: Arc<dyn SpeechPlatform>, supported: bool) -> Self {
        Self {
            platform,
            supported,
            state: RecognitionState::Idle,
            active: None,
            next_id: 1,
        }
    }

    /// Update support after a capability re-check
    pub fn set_supported(&mut self, supported: bool) {
        self.supported = supported;
    }

    #[must_use]
    pub const fn state(&self) -> RecognitionState {
        self.state
    }

    /// Id of the session currently owning the platform recognizer
    #[must_use]
    pub fn active_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Starting or listening
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        matches!(
            self.state,
            RecognitionState::Starting | RecognitionState::Listening
        )
    }

    /// Open a capture
    ///
    /// Returns `Ok(None)` without touching the platform while a session is
    /// starting, listening, or still stopping.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the host has no recognizer, or the platform's
    /// error if capture could not be opened; the session stays idle.
    pub fn start(
        &mut self,
        config: &SpeechConfig,
        forward: Forwarder,
    ) -> Result<Option<u64>, SpeechError> {
        if self.active.is_some() {
            tracing::debug!(state = ?self.state, "recognition already active, ignoring start");
            return Ok(None);
        }
        if !self.supported {
            return Err(SpeechError::Unsupported);
        }

        let id = self.next_id;
        self.next_id += 1;

        // The recognizer needs at least one alternative per result
        let config = SpeechConfig {
            max_alternatives: config.max_alternatives.max(1),
            ..config.clone()
        };

        let (sink, detach) = RecognitionSink::new(id, forward);
        self.state = RecognitionState::Starting;
        tracing::debug!(session = id, language = %config.language, "starting recognition");

        if let Err(e) = self.platform.start_capture(&config, sink) {
            detach.detach();
            self.state = RecognitionState::Failed;
            tracing::warn!(session = id, error = %e, "capture failed to open");
            self.state = RecognitionState::Idle;
            return Err(e);
        }

        self.active = Some(ActiveCapture {
            id,
            detach,
            continuous: config.continuous,
            interim_results: config.interim_results,
            closed: false,
            spans: 0,
        });
        Ok(Some(id))
    }

    /// Request teardown; idle is reached when the platform reports the end
    ///
    /// Transcript and error delivery stops immediately. Returns false when
    /// there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        if !self.is_listening() {
            return false;
        }
        self.state = RecognitionState::Stopping;
        tracing::debug!(session = ?self.active_id(), "stopping recognition");
        self.platform.stop_capture();
        true
    }

    /// Give up waiting for the platform's end notification
    pub fn force_idle(&mut self, session: u64) -> Option<RecognitionUpdate> {
        if self.active_id() != Some(session) || self.state != RecognitionState::Stopping {
            return None;
        }
        tracing::warn!(session, "platform never reported end, forcing idle");
        self.finish();
        Some(RecognitionUpdate::Ended { requested: true })
    }

    /// Tear down without waiting for the platform
    pub fn abort(&mut self) {
        if self.active.is_some() {
            if self.is_listening() {
                self.platform.stop_capture();
            }
            self.finish();
        }
    }

    /// Apply one platform event
    pub fn handle(&mut self, session: u64, event: RecognitionEvent) -> Vec<RecognitionUpdate> {
        if self.active_id() != Some(session) {
            tracing::trace!(session, ?event, "dropping event from inactive session");
            return Vec::new();
        }

        match event {
            RecognitionEvent::Started => {
                if self.state == RecognitionState::Starting {
                    self.state = RecognitionState::Listening;
                    tracing::debug!(session, "recognition listening");
                    vec![RecognitionUpdate::Started]
                } else {
                    Vec::new()
                }
            }
            RecognitionEvent::Results {
                result_index,
                results,
            } => {
                if self.is_listening() {
                    self.transcripts(result_index, &results)
                } else {
                    Vec::new()
                }
            }
            RecognitionEvent::Error { reason } => {
                if self.state == RecognitionState::Stopping {
                    tracing::debug!(session, %reason, "error while stopping, treating as end");
                    self.finish();
                    return vec![RecognitionUpdate::Ended { requested: true }];
                }
                self.state = RecognitionState::Failed;
                let error = map_reason(reason);
                tracing::warn!(session, error = %error, "recognition failed");
                self.finish();
                vec![RecognitionUpdate::Failed(error)]
            }
            RecognitionEvent::Ended => {
                let requested = self.state == RecognitionState::Stopping;
                tracing::debug!(session, requested, "recognition ended");
                self.finish();
                vec![RecognitionUpdate::Ended { requested }]
            }
        }
    }

    /// Fold a result list into at most one final and one interim transcript
    ///
    /// The final closes the current span and is emitted first; the interim
    /// belongs to the span that follows.
    fn transcripts(
        &mut self,
        result_index: usize,
        results: &[RecognitionResult],
    ) -> Vec<RecognitionUpdate> {
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };
        if active.closed {
            return Vec::new();
        }

        let mut finals = String::new();
        let mut interim = String::new();
        for result in results.iter().skip(result_index) {
            if result.is_final {
                finals.push_str(result.best());
            } else {
                interim.push_str(result.best());
            }
        }

        let mut updates = Vec::with_capacity(2);
        if !finals.is_empty() {
            active.spans += 1;
            tracing::trace!(session = active.id, span = active.spans, text = %finals, "final transcript");
            updates.push(RecognitionUpdate::Transcript(TranscriptEvent::finalized(finals)));
            if !active.continuous {
                active.closed = true;
                return updates;
            }
        }
        if !interim.is_empty() && active.interim_results {
            tracing::trace!(session = active.id, text = %interim, "interim transcript");
            updates.push(RecognitionUpdate::Transcript(TranscriptEvent::interim(interim)));
        }
        updates
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            active.detach.detach();
        }
        self.state = RecognitionState::Idle;
    }
}

fn map_reason(reason: String) -> SpeechError {
    if PERMISSION_REASONS.contains(&reason.as_str()) {
        SpeechError::PermissionDenied
    } else {
        SpeechError::RecognitionFailed { reason }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::platform::{PlatformCall, PlatformEvent, ScriptedPlatform};

    fn setup(supported: bool) -> (RecognitionSession, ScriptedPlatform, Forwarder) {
        let platform = ScriptedPlatform::new();
        let session = RecognitionSession::new(Arc::new(platform.clone()), supported);
        let seen: Arc<Mutex<Vec<PlatformEvent>>> = Arc::default();
        let forward: Forwarder = Arc::new(move |e| {
            seen.lock().unwrap().push(e);
            true
        });
        (session, platform, forward)
    }

    fn listening(continuous: bool) -> (RecognitionSession, ScriptedPlatform, u64) {
        let (mut session, platform, forward) = setup(true);
        let config = SpeechConfig {
            continuous,
            ..SpeechConfig::default()
        };
        let id = session.start(&config, forward).unwrap().unwrap();
        assert_eq!(session.handle(id, RecognitionEvent::Started), vec![
            RecognitionUpdate::Started
        ]);
        (session, platform, id)
    }

    fn results(results: Vec<RecognitionResult>) -> RecognitionEvent {
        RecognitionEvent::Results {
            result_index: 0,
            results,
        }
    }

    #[test]
    fn test_start_unsupported() {
        let (mut session, platform, forward) = setup(false);
        assert_eq!(
            session.start(&SpeechConfig::default(), forward),
            Err(SpeechError::Unsupported)
        );
        assert_eq!(session.state(), RecognitionState::Idle);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut session, platform, forward) = setup(true);
        let config = SpeechConfig::default();

        assert!(session.start(&config, Arc::clone(&forward)).unwrap().is_some());
        assert_eq!(session.start(&config, forward).unwrap(), None);
        assert_eq!(session.state(), RecognitionState::Starting);
        assert_eq!(
            platform.count_calls(|c| matches!(c, PlatformCall::StartCapture(_))),
            1
        );
    }

    #[test]
    fn test_zero_alternatives_raised_to_one() {
        let (mut session, platform, forward) = setup(true);
        let config = SpeechConfig {
            max_alternatives: 0,
            ..SpeechConfig::default()
        };

        session.start(&config, forward).unwrap();

        let calls = platform.calls();
        let Some(PlatformCall::StartCapture(opened)) = calls.first() else {
            panic!("expected capture, got {calls:?}");
        };
        assert_eq!(opened.max_alternatives, 1);
    }

    #[test]
    fn test_error_while_starting_fails_without_start() {
        let (mut session, _platform, forward) = setup(true);
        let id = session.start(&SpeechConfig::default(), forward).unwrap().unwrap();

        assert_eq!(
            session.handle(id, RecognitionEvent::Error {
                reason: "network".to_string()
            }),
            vec![RecognitionUpdate::Failed(SpeechError::recognition("network"))]
        );
        assert_eq!(session.state(), RecognitionState::Idle);
        assert!(session.handle(id, RecognitionEvent::Started).is_empty());
    }

    #[test]
    fn test_capture_open_failure_returns_to_idle() {
        let (mut session, platform, forward) = setup(true);
        platform.fail_next_capture("audio-capture");

        assert_eq!(
            session.start(&SpeechConfig::default(), forward),
            Err(SpeechError::recognition("audio-capture"))
        );
        assert_eq!(session.state(), RecognitionState::Idle);
        assert_eq!(session.active_id(), None);
    }

    #[test]
    fn test_final_then_interim_order() {
        let (mut session, _platform, id) = listening(true);

        let updates = session.handle(
            id,
            results(vec![
                RecognitionResult::finalized("hello "),
                RecognitionResult::finalized("world"),
                RecognitionResult::interim("how"),
            ]),
        );

        assert_eq!(updates, vec![
            RecognitionUpdate::Transcript(TranscriptEvent::finalized("hello world")),
            RecognitionUpdate::Transcript(TranscriptEvent::interim("how")),
        ]);
    }

    #[test]
    fn test_result_index_skips_earlier_results() {
        let (mut session, _platform, id) = listening(true);

        let updates = session.handle(id, RecognitionEvent::Results {
            result_index: 1,
            results: vec![
                RecognitionResult::finalized("already delivered"),
                RecognitionResult::interim("next"),
            ],
        });

        assert_eq!(updates, vec![RecognitionUpdate::Transcript(
            TranscriptEvent::interim("next")
        )]);
    }

    #[test]
    fn test_single_utterance_mode_stops_after_final() {
        let (mut session, _platform, id) = listening(false);

        assert_eq!(session.handle(id, results(vec![RecognitionResult::finalized("one")])).len(), 1);
        assert!(session
            .handle(id, results(vec![RecognitionResult::finalized("two")]))
            .is_empty());
    }

    #[test]
    fn test_interim_suppressed_when_disabled() {
        let (mut session, _platform, forward) = setup(true);
        let config = SpeechConfig {
            interim_results: false,
            ..SpeechConfig::default()
        };
        let id = session.start(&config, forward).unwrap().unwrap();
        session.handle(id, RecognitionEvent::Started);

        assert!(session
            .handle(id, results(vec![RecognitionResult::interim("partial")]))
            .is_empty());
    }

    #[test]
    fn test_error_reported_once_then_idle() {
        let (mut session, _platform, id) = listening(true);

        assert_eq!(
            session.handle(id, RecognitionEvent::Error {
                reason: "network".to_string()
            }),
            vec![RecognitionUpdate::Failed(SpeechError::recognition("network"))]
        );
        assert_eq!(session.state(), RecognitionState::Idle);

        // Platform follows up with end; the session is already gone
        assert!(session.handle(id, RecognitionEvent::Ended).is_empty());
    }

    #[test]
    fn test_not_allowed_maps_to_permission_denied() {
        let (mut session, _platform, id) = listening(true);
        assert_eq!(
            session.handle(id, RecognitionEvent::Error {
                reason: "not-allowed".to_string()
            }),
            vec![RecognitionUpdate::Failed(SpeechError::PermissionDenied)]
        );
    }

    #[test]
    fn test_stop_waits_for_end() {
        let (mut session, platform, id) = listening(true);

        assert!(session.stop());
        assert_eq!(session.state(), RecognitionState::Stopping);
        assert!(platform.calls().contains(&PlatformCall::StopCapture));

        // Late results after a stop request are not delivered
        assert!(session
            .handle(id, results(vec![RecognitionResult::finalized("late")]))
            .is_empty());

        assert_eq!(session.handle(id, RecognitionEvent::Ended), vec![
            RecognitionUpdate::Ended { requested: true }
        ]);
        assert_eq!(session.state(), RecognitionState::Idle);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut session, platform, _forward) = setup(true);
        assert!(!session.stop());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_force_idle_only_while_stopping() {
        let (mut session, _platform, id) = listening(true);
        assert_eq!(session.force_idle(id), None);

        session.stop();
        assert_eq!(
            session.force_idle(id),
            Some(RecognitionUpdate::Ended { requested: true })
        );
        assert_eq!(session.state(), RecognitionState::Idle);
        assert_eq!(session.force_idle(id), None);
    }

    #[test]
    fn test_stale_session_events_dropped() {
        let (mut session, _platform, id) = listening(true);
        assert!(session
            .handle(id + 100, results(vec![RecognitionResult::finalized("ghost")]))
            .is_empty());
    }
}
