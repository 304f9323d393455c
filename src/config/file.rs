//! TOML configuration file loading
//!
//! Supports `~/.config/voice-session/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceSessionConfigFile {
    /// Speech recognition settings
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Speech synthesis settings
    #[serde(default)]
    pub synthesis: SynthesisFileConfig,

    /// Session behavior
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// Recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// Language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Keep listening after each final transcript
    pub continuous: Option<bool>,

    /// Deliver interim transcripts
    pub interim_results: Option<bool>,

    /// Alternatives per result
    pub max_alternatives: Option<u32>,
}

/// Synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesisFileConfig {
    /// Language tag; defaults to the recognition language
    pub language: Option<String>,

    /// Preferred voice identifier
    pub voice: Option<String>,

    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,

    /// Synthesizer binary (name on PATH or full path)
    pub synthesizer: Option<String>,
}

/// Session behavior
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// How long to wait for the recognizer to confirm a stop, in milliseconds
    pub stop_timeout_ms: Option<u64>,

    /// Check microphone access as soon as the coordinator starts
    pub probe_microphone_on_start: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceSessionConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> VoiceSessionConfigFile {
    config_file_path().map_or_else(VoiceSessionConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from an explicit path, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> VoiceSessionConfigFile {
    if !path.exists() {
        return VoiceSessionConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoiceSessionConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoiceSessionConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-session/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-session").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let file: VoiceSessionConfigFile = toml::from_str(
            r#"
            [recognition]
            language = "fr-FR"

            [synthesis]
            rate = 1.25
            "#,
        )
        .unwrap();

        assert_eq!(file.recognition.language.as_deref(), Some("fr-FR"));
        assert_eq!(file.recognition.continuous, None);
        assert!(file.synthesis.rate.is_some_and(|rate| (rate - 1.25).abs() < f32::EPSILON));
        assert_eq!(file.session.stop_timeout_ms, None);
    }

    #[test]
    fn test_missing_file_is_default() {
        let file = load_config_file_from(Path::new("/nonexistent/voice-session.toml"));
        assert!(file.recognition.language.is_none());
    }

    #[test]
    fn test_invalid_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "recognition = [not toml").unwrap();

        let file = load_config_file_from(&path);
        assert!(file.recognition.language.is_none());
    }
}
