//! Error types for the voice session layer

use thiserror::Error;

/// Result type alias for voice session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason attached to a synthesis rejected by an explicit stop
pub const REASON_CANCELLED: &str = "cancelled";

/// Reason attached to a synthesis replaced by a newer `speak` call
pub const REASON_SUPERSEDED: &str = "superseded";

/// Errors that can occur outside the speech sessions themselves
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech session error
    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Platform backend could not be initialized
    #[error("platform error: {0}")]
    Platform(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure reported by a recognition session or a synthesis utterance
///
/// Carries nothing beyond the platform's reason string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// The host lacks the capability needed for the attempted operation
    #[error("speech capability is not supported on this host")]
    Unsupported,

    /// The user declined microphone access
    #[error("microphone access was denied")]
    PermissionDenied,

    /// The platform reported a capture fault; the session was torn down
    #[error("speech recognition failed: {reason}")]
    RecognitionFailed {
        /// Platform-supplied reason
        reason: String,
    },

    /// Synthesis failed, was cancelled, or was superseded
    #[error("speech synthesis failed: {reason}")]
    SynthesisFailed {
        /// Platform-supplied reason, or `cancelled` / `superseded`
        reason: String,
    },
}

/// Discriminant of [`SpeechError`] for callers that only match on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechErrorKind {
    Unsupported,
    PermissionDenied,
    RecognitionFailed,
    SynthesisFailed,
}

impl SpeechError {
    /// Build a recognition failure
    #[must_use]
    pub fn recognition(reason: impl Into<String>) -> Self {
        Self::RecognitionFailed {
            reason: reason.into(),
        }
    }

    /// Build a synthesis failure
    #[must_use]
    pub fn synthesis(reason: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            reason: reason.into(),
        }
    }

    /// Synthesis rejection caused by an explicit stop
    #[must_use]
    pub fn cancelled() -> Self {
        Self::synthesis(REASON_CANCELLED)
    }

    /// Synthesis rejection caused by a newer utterance
    #[must_use]
    pub fn superseded() -> Self {
        Self::synthesis(REASON_SUPERSEDED)
    }

    #[must_use]
    pub const fn kind(&self) -> SpeechErrorKind {
        match self {
            Self::Unsupported => SpeechErrorKind::Unsupported,
            Self::PermissionDenied => SpeechErrorKind::PermissionDenied,
            Self::RecognitionFailed { .. } => SpeechErrorKind::RecognitionFailed,
            Self::SynthesisFailed { .. } => SpeechErrorKind::SynthesisFailed,
        }
    }

    /// Platform reason string, if the variant carries one
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::RecognitionFailed { reason } | Self::SynthesisFailed { reason } => Some(reason),
            Self::Unsupported | Self::PermissionDenied => None,
        }
    }

    /// True for rejections the caller caused (`cancelled` or `superseded`)
    ///
    /// UI code typically ignores these while still surfacing real failures.
    #[must_use]
    pub fn is_self_inflicted(&self) -> bool {
        matches!(
            self,
            Self::SynthesisFailed { reason } if reason == REASON_CANCELLED || reason == REASON_SUPERSEDED
        )
    }
}
