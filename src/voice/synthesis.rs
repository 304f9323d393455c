//! Synthesis controller
//!
//! Plays one utterance at a time. A new `speak` cancels the utterance in
//! progress (last write wins) and rejects its completion with `superseded`.
//! Every completion settles exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::oneshot;

use crate::error::SpeechError;
use crate::platform::{
    DetachHandle, Forwarder, SpeechPlatform, SynthesisEvent, SynthesisSink, UtteranceParams,
};

use super::language;
use super::types::{SynthesisState, UtteranceConfig, VoiceDescriptor};

/// Outcome of one `speak` call
pub type SpeechOutcome = Result<(), SpeechError>;

/// Settles a [`SpeechCompletion`]
#[derive(Debug)]
pub struct CompletionSender(oneshot::Sender<SpeechOutcome>);

impl CompletionSender {
    /// Settle the paired completion; consuming `self` makes a second
    /// settlement impossible
    pub fn settle(self, outcome: SpeechOutcome) {
        // Receiver may already be gone; the caller chose not to wait
        let _ = self.0.send(outcome);
    }
}

/// Awaitable completion of one utterance
///
/// Clones observe the same single outcome. If the owning coordinator goes
/// away before the utterance settles, the completion rejects with
/// `cancelled`.
#[derive(Clone)]
pub struct SpeechCompletion {
    inner: Shared<BoxFuture<'static, SpeechOutcome>>,
}

impl SpeechCompletion {
    /// Create a linked sender/completion pair
    #[must_use]
    pub fn pair() -> (CompletionSender, Self) {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|received| received.unwrap_or_else(|_| Err(SpeechError::cancelled())))
            .boxed()
            .shared();
        (CompletionSender(tx), Self { inner })
    }

    /// A completion that has already settled
    #[must_use]
    pub fn settled(outcome: SpeechOutcome) -> Self {
        let (tx, completion) = Self::pair();
        tx.settle(outcome);
        completion
    }

    /// Outcome, once some clone has observed it
    #[must_use]
    pub fn peek(&self) -> Option<SpeechOutcome> {
        self.inner.peek().cloned()
    }
}

impl Future for SpeechCompletion {
    type Output = SpeechOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl std::fmt::Debug for SpeechCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCompletion")
            .field("outcome", &self.peek())
            .finish()
    }
}

/// Change the owner should publish after a controller call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisUpdate {
    /// Utterance handed to the platform
    Started { utterance: u64 },
    /// Utterance played to completion
    Finished { utterance: u64 },
    /// Utterance (or the attempt to start one) was rejected
    Rejected {
        utterance: Option<u64>,
        error: SpeechError,
    },
}

#[derive(Debug)]
struct ActiveUtterance {
    id: u64,
    detach: DetachHandle,
    completion: CompletionSender,
    paused: bool,
}

/// Owns the single active utterance
pub struct SynthesisController {
    platform: Arc<dyn SpeechPlatform>,
    supported: bool,
    state: SynthesisState,
    active: Option<ActiveUtterance>,
    next_id: u64,
}

impl SynthesisController {
    /// Create an idle controller; `supported` comes from the capability probe
    #[must_use]
    pub fn new(platform: Arc<dyn SpeechPlatform>, supported: bool) -> Self {
        Self {
            platform,
            supported,
            state: SynthesisState::Idle,
            active: None,
            next_id: 1,
        }
    }

    /// Update support after a capability re-check
    pub fn set_supported(&mut self, supported: bool) {
        self.supported = supported;
    }

    #[must_use]
    pub const fn state(&self) -> SynthesisState {
        self.state
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        matches!(self.state, SynthesisState::Speaking)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.paused)
    }

    /// Id of the utterance currently playing
    #[must_use]
    pub fn active_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Play `text`, superseding any utterance in progress
    ///
    /// `completion` settles when the new utterance finishes, fails, or is
    /// itself cancelled or superseded.
    pub fn speak(
        &mut self,
        text: &str,
        config: &UtteranceConfig,
        completion: CompletionSender,
        forward: Forwarder,
    ) -> Vec<SynthesisUpdate> {
        let mut updates = Vec::new();

        if !self.supported {
            completion.settle(Err(SpeechError::Unsupported));
            updates.push(SynthesisUpdate::Rejected {
                utterance: None,
                error: SpeechError::Unsupported,
            });
            return updates;
        }

        if let Some(update) = self.cancel_active(SpeechError::superseded()) {
            updates.push(update);
        }

        let params = resolve_params(config, &self.platform.enumerate_voices());
        let id = self.next_id;
        self.next_id += 1;
        let (sink, detach) = SynthesisSink::new(id, forward);

        tracing::debug!(
            utterance = id,
            voice = ?params.voice.as_ref().map(|v| &v.id),
            rate = params.rate,
            pitch = params.pitch,
            volume = params.volume,
            "speaking"
        );

        if let Err(error) = self.platform.speak_utterance(text, &params, sink) {
            detach.detach();
            self.state = SynthesisState::Failed;
            tracing::warn!(utterance = id, error = %error, "synthesis failed to start");
            completion.settle(Err(error.clone()));
            self.state = SynthesisState::Idle;
            updates.push(SynthesisUpdate::Rejected {
                utterance: Some(id),
                error,
            });
            return updates;
        }

        self.state = SynthesisState::Speaking;
        self.active = Some(ActiveUtterance {
            id,
            detach,
            completion,
            paused: false,
        });
        updates.push(SynthesisUpdate::Started { utterance: id });
        updates
    }

    /// Cancel the utterance in progress; no-op when idle
    pub fn stop(&mut self) -> Option<SynthesisUpdate> {
        self.cancel_active(SpeechError::cancelled())
    }

    /// Pause playback; returns false when nothing is playing or already paused
    pub fn pause(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) if !active.paused => {
                self.platform.pause_utterance();
                active.paused = true;
                true
            }
            _ => false,
        }
    }

    /// Resume paused playback; returns false when nothing is paused
    pub fn resume(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) if active.paused => {
                self.platform.resume_utterance();
                active.paused = false;
                true
            }
            _ => false,
        }
    }

    /// Apply one platform event
    pub fn handle(&mut self, utterance: u64, event: SynthesisEvent) -> Option<SynthesisUpdate> {
        if self.active_id() != Some(utterance) {
            tracing::trace!(utterance, ?event, "dropping event from inactive utterance");
            return None;
        }

        match event {
            SynthesisEvent::Started => {
                tracing::trace!(utterance, "platform started utterance");
                None
            }
            SynthesisEvent::Ended => {
                let active = self.finish()?;
                tracing::debug!(utterance, "utterance finished");
                active.completion.settle(Ok(()));
                Some(SynthesisUpdate::Finished { utterance })
            }
            SynthesisEvent::Error { reason } => {
                self.state = SynthesisState::Failed;
                let error = SpeechError::SynthesisFailed { reason };
                tracing::warn!(utterance, error = %error, "utterance failed");
                let active = self.finish()?;
                active.completion.settle(Err(error.clone()));
                Some(SynthesisUpdate::Rejected {
                    utterance: Some(utterance),
                    error,
                })
            }
        }
    }

    fn cancel_active(&mut self, error: SpeechError) -> Option<SynthesisUpdate> {
        let active = self.finish()?;
        self.platform.cancel_utterance();
        tracing::debug!(utterance = active.id, reason = ?error.reason(), "utterance cancelled");
        active.completion.settle(Err(error.clone()));
        Some(SynthesisUpdate::Rejected {
            utterance: Some(active.id),
            error,
        })
    }

    fn finish(&mut self) -> Option<ActiveUtterance> {
        let active = self.active.take()?;
        active.detach.detach();
        self.state = SynthesisState::Idle;
        Some(active)
    }
}

/// Clamp numeric parameters and resolve the requested voice
///
/// An unknown voice falls back to the platform default for the language.
#[must_use]
pub fn resolve_params(config: &UtteranceConfig, voices: &[VoiceDescriptor]) -> UtteranceParams {
    let clamped = config.clamped();

    let voice = clamped.voice_id.as_deref().and_then(|wanted| {
        let found = voices
            .iter()
            .find(|v| v.id == wanted || v.display_name == wanted)
            .cloned();
        if found.is_none() {
            tracing::debug!(
                voice = wanted,
                language = %clamped.language,
                available = voices.len(),
                "voice not available, using platform default"
            );
        }
        found
    });

    if let Some(v) = &voice {
        if !language::same_language(&v.language, &clamped.language) {
            tracing::trace!(voice = %v.id, voice_language = %v.language, "voice language differs");
        }
    }

    UtteranceParams {
        voice,
        language: clamped.language,
        rate: clamped.rate,
        pitch: clamped.pitch,
        volume: clamped.volume,
    }
}
