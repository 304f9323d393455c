//! Configuration management for voice sessions

pub mod file;

use std::path::Path;
use std::time::Duration;

use crate::voice::{SpeechConfig, UtteranceConfig};
use crate::{Error, Result};

use self::file::VoiceSessionConfigFile;

/// Default wait for the recognizer to confirm a stop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Voice session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Recognition settings handed to the platform on every start
    pub recognition: SpeechConfig,

    /// Voice parameters used by `speak`
    pub utterance: UtteranceConfig,

    /// How long a stop request may wait for the platform to report the end
    /// of capture before the session is forced idle
    pub stop_timeout: Duration,

    /// Check microphone access when the coordinator starts instead of on
    /// the first `start_listening`
    pub probe_microphone_on_start: bool,

    /// Synthesizer command for the host platform (name on PATH or full path)
    /// Set via `VOICE_SESSION_SYNTHESIZER` env var
    pub synthesizer: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognition: SpeechConfig::default(),
            utterance: UtteranceConfig::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            probe_microphone_on_start: true,
            synthesizer: None,
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the merged configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_file_config(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file (env > file > default)
    ///
    /// Unlike [`Config::load`], a missing or malformed file is an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the merged
    /// configuration is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fc: VoiceSessionConfigFile = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");

        let config = Self::from_file_config(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file with environment lookups over defaults
    ///
    /// `env` is consulted for every `VOICE_SESSION_*` key; values that fail to
    /// parse are ignored.
    pub fn from_file_config(
        fc: VoiceSessionConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let default = Self::default();
        let parsed = |key: &str| env(key).and_then(|s| s.trim().parse::<f32>().ok());

        let language = env("VOICE_SESSION_LANGUAGE")
            .or(fc.recognition.language)
            .unwrap_or(default.recognition.language);

        let recognition = SpeechConfig {
            continuous: fc
                .recognition
                .continuous
                .unwrap_or(default.recognition.continuous),
            interim_results: fc
                .recognition
                .interim_results
                .unwrap_or(default.recognition.interim_results),
            max_alternatives: fc
                .recognition
                .max_alternatives
                .unwrap_or(default.recognition.max_alternatives),
            language: language.clone(),
        };

        // Synthesis follows the recognition language unless set explicitly
        let utterance = UtteranceConfig {
            language: fc.synthesis.language.unwrap_or(language),
            voice_id: env("VOICE_SESSION_VOICE")
                .filter(|v| !v.is_empty())
                .or(fc.synthesis.voice),
            rate: parsed("VOICE_SESSION_RATE")
                .or(fc.synthesis.rate)
                .unwrap_or(default.utterance.rate),
            pitch: parsed("VOICE_SESSION_PITCH")
                .or(fc.synthesis.pitch)
                .unwrap_or(default.utterance.pitch),
            volume: parsed("VOICE_SESSION_VOLUME")
                .or(fc.synthesis.volume)
                .unwrap_or(default.utterance.volume),
        };

        let stop_timeout = env("VOICE_SESSION_STOP_TIMEOUT_MS")
            .and_then(|s| s.trim().parse().ok())
            .or(fc.session.stop_timeout_ms)
            .map_or(default.stop_timeout, Duration::from_millis);

        Self {
            recognition,
            utterance,
            stop_timeout,
            probe_microphone_on_start: fc
                .session
                .probe_microphone_on_start
                .unwrap_or(default.probe_microphone_on_start),
            synthesizer: env("VOICE_SESSION_SYNTHESIZER").or(fc.synthesis.synthesizer),
        }
    }

    /// Check structural settings
    ///
    /// Numeric voice parameters are never rejected here; they are clamped
    /// when an utterance is built.
    ///
    /// # Errors
    ///
    /// Returns error if a language tag is empty or `max_alternatives` is zero
    pub fn validate(&self) -> Result<()> {
        if self.recognition.language.trim().is_empty() {
            return Err(Error::Config("recognition language must not be empty".into()));
        }
        if self.utterance.language.trim().is_empty() {
            return Err(Error::Config("synthesis language must not be empty".into()));
        }
        if self.recognition.max_alternatives == 0 {
            return Err(Error::Config("max_alternatives must be at least 1".into()));
        }
        if !crate::voice::language::is_supported(&self.recognition.language) {
            tracing::warn!(
                language = %self.recognition.language,
                "language not in the supported catalogue, passing through to platform"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::from_file_config(VoiceSessionConfigFile::default(), |_| None);

        assert_eq!(config.recognition, SpeechConfig::default());
        assert_eq!(config.utterance, UtteranceConfig::default());
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
        assert!(config.probe_microphone_on_start);
        assert!(config.synthesizer.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: VoiceSessionConfigFile = toml::from_str(
            r#"
            [recognition]
            language = "de-DE"

            [synthesis]
            rate = 0.8
            voice = "file-voice"
            "#,
        )
        .unwrap();
        let env = env_from(&[
            ("VOICE_SESSION_LANGUAGE", "fr-FR"),
            ("VOICE_SESSION_RATE", "1.5"),
        ]);

        let config = Config::from_file_config(fc, env);

        assert_eq!(config.recognition.language, "fr-FR");
        assert_eq!(config.utterance.language, "fr-FR");
        assert!((config.utterance.rate - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.utterance.voice_id.as_deref(), Some("file-voice"));
    }

    #[test]
    fn test_unparseable_env_value_ignored() {
        let env = env_from(&[
            ("VOICE_SESSION_VOLUME", "loud"),
            ("VOICE_SESSION_STOP_TIMEOUT_MS", "soon"),
        ]);

        let config = Config::from_file_config(VoiceSessionConfigFile::default(), env);

        assert!((config.utterance.volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
    }

    #[test]
    fn test_stop_timeout_from_file() {
        let fc: VoiceSessionConfigFile = toml::from_str(
            r"
            [session]
            stop_timeout_ms = 250
            probe_microphone_on_start = false
            ",
        )
        .unwrap();

        let config = Config::from_file_config(fc, |_| None);

        assert_eq!(config.stop_timeout, Duration::from_millis(250));
        assert!(!config.probe_microphone_on_start);
    }

    #[test]
    fn test_validate_rejects_empty_language() {
        let mut config = Config::default();
        config.recognition.language = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_alternatives() {
        let mut config = Config::default();
        config.recognition.max_alternatives = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_accepts_out_of_range_rate() {
        let mut config = Config::default();
        config.utterance.rate = 9.0;
        assert!(config.validate().is_ok());
    }
}
