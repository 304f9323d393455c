//! Data model shared by the recognition and synthesis sessions

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::language::DEFAULT_LANGUAGE;
use crate::error::SpeechError;

/// Accepted speaking rate multiplier
pub const RATE_RANGE: RangeInclusive<f32> = 0.5..=2.0;

/// Accepted pitch, in the host synthesizer's native 0..2 scale (1.0 = neutral)
pub const PITCH_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Accepted output volume
pub const VOLUME_RANGE: RangeInclusive<f32> = 0.0..=1.0;

pub const DEFAULT_RATE: f32 = 1.0;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Recognition parameters, fixed for the lifetime of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// BCP-47 language tag (e.g. "en-US")
    pub language: String,

    /// Keep capturing after a final transcript
    pub continuous: bool,

    /// Deliver provisional transcripts before the final one
    pub interim_results: bool,

    /// Alternatives requested from the recognizer (at least 1)
    pub max_alternatives: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

/// Caller-facing synthesis parameters
///
/// Numeric fields may be out of range; they are clamped before reaching the
/// platform, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceConfig {
    /// BCP-47 language tag
    pub language: String,

    /// Preferred voice; falls back to the platform default when absent
    pub voice_id: Option<String>,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch (1.0 = neutral)
    pub pitch: f32,

    /// Output volume
    pub volume: f32,
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            voice_id: None,
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl UtteranceConfig {
    /// Copy with every numeric field forced into its accepted range
    ///
    /// Non-finite input falls back to the field's default.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            language: self.language.clone(),
            voice_id: self.voice_id.clone(),
            rate: clamp_to(self.rate, &RATE_RANGE, DEFAULT_RATE),
            pitch: clamp_to(self.pitch, &PITCH_RANGE, DEFAULT_PITCH),
            volume: clamp_to(self.volume, &VOLUME_RANGE, DEFAULT_VOLUME),
        }
    }

    /// Copy with the volume replaced
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}

fn clamp_to(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(*range.start(), *range.end())
    } else {
        fallback
    }
}

/// One recognized transcript, interim or final
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    #[must_use]
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// A synthesis voice enumerated from the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub id: String,
    pub display_name: String,
    pub language: String,
}

/// Lifecycle of a recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RecognitionState {
    #[default]
    Idle,
    /// Capture requested, waiting for the platform to report it started
    Starting,
    Listening,
    /// Stop requested, waiting for the platform's end notification
    Stopping,
    /// Transient: an error is being reported before returning to idle
    Failed,
}

/// Lifecycle of the synthesis controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SynthesisState {
    #[default]
    Idle,
    Speaking,
    /// Transient: an error is being reported before returning to idle
    Failed,
}

/// Merged observable state published by the coordinator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeechState {
    /// Recognition is starting or capturing
    pub is_listening: bool,

    /// An utterance is being played (or is paused)
    pub is_speaking: bool,

    /// Host supports speech recognition
    pub is_supported: bool,

    /// Host supports speech synthesis
    pub is_synthesis_supported: bool,

    /// Last microphone check granted access
    pub is_microphone_available: bool,

    /// Most recent interim or final text for the current span
    pub current_transcript: String,

    /// Sticky until cleared or replaced by a newer error
    pub last_error: Option<SpeechError>,

    /// Voices enumerated at construction or on refresh
    pub available_voices: Vec<VoiceDescriptor>,

    pub recognition: RecognitionState,
    pub synthesis: SynthesisState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_out_of_range() {
        let config = UtteranceConfig {
            rate: 5.0,
            pitch: -3.0,
            volume: 1.7,
            ..UtteranceConfig::default()
        };

        let clamped = config.clamped();
        assert!((clamped.rate - 2.0).abs() < f32::EPSILON);
        assert!(clamped.pitch.abs() < f32::EPSILON);
        assert!((clamped.volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_keeps_valid_values() {
        let config = UtteranceConfig {
            rate: 0.75,
            pitch: 1.5,
            volume: 0.8,
            ..UtteranceConfig::default()
        };

        assert_eq!(config.clamped(), config);
    }

    #[test]
    fn test_clamp_non_finite_uses_default() {
        let config = UtteranceConfig {
            rate: f32::NAN,
            pitch: f32::INFINITY,
            volume: f32::NEG_INFINITY,
            ..UtteranceConfig::default()
        };

        let clamped = config.clamped();
        assert!((clamped.rate - DEFAULT_RATE).abs() < f32::EPSILON);
        assert!((clamped.pitch - DEFAULT_PITCH).abs() < f32::EPSILON);
        assert!((clamped.volume - DEFAULT_VOLUME).abs() < f32::EPSILON);
    }

    #[test]
    fn test_speech_config_defaults() {
        let config = SpeechConfig::default();
        assert_eq!(config.language, "en-US");
        assert!(config.continuous);
        assert!(config.interim_results);
        assert_eq!(config.max_alternatives, 1);
    }
}
