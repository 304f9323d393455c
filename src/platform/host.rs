//! Host platform backed by local tools
//!
//! Synthesis runs through an eSpeak-compatible command-line synthesizer;
//! each utterance is one child process, cancelled by killing it. The host has
//! no local recognizer, so recognition is reported unsupported.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::oneshot;

use super::{RecognitionSink, SpeechPlatform, SynthesisEvent, SynthesisSink, UtteranceParams};
use crate::error::SpeechError;
use crate::voice::{SpeechConfig, VoiceDescriptor};
use crate::{Error, Result};

/// Synthesizer binaries tried in order when none is configured
const SYNTHESIZER_CANDIDATES: &[&str] = &["espeak-ng", "espeak"];

/// eSpeak speaking rate at multiplier 1.0, in words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Tracks the child process of the utterance in progress
#[derive(Debug)]
struct RunningUtterance {
    id: u64,
    kill: oneshot::Sender<()>,
}

/// Speech platform of the local machine
#[derive(Debug)]
pub struct HostPlatform {
    synthesizer: Option<PathBuf>,
    voices: Vec<VoiceDescriptor>,
    current: Mutex<Option<RunningUtterance>>,
}

impl HostPlatform {
    /// Detect available tools and read the synthesizer's voice table
    ///
    /// `synthesizer` overrides the binary lookup; it may be a bare name
    /// resolved through `PATH` or a full path.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly configured synthesizer cannot be found
    pub async fn detect(synthesizer: Option<&str>) -> Result<Self> {
        let synthesizer = match synthesizer {
            Some(name) => Some(which::which(name).map_err(|e| {
                Error::Platform(format!("synthesizer '{name}' not found: {e}"))
            })?),
            None => SYNTHESIZER_CANDIDATES
                .iter()
                .find_map(|name| which::which(name).ok()),
        };

        let voices = match synthesizer.as_deref() {
            Some(program) => list_voices(program).await,
            None => Vec::new(),
        };

        tracing::debug!(
            synthesizer = ?synthesizer,
            voices = voices.len(),
            "host platform detected"
        );

        Ok(Self {
            synthesizer,
            voices,
            current: Mutex::new(None),
        })
    }

    /// Path of the synthesizer binary, if one was found
    #[must_use]
    pub fn synthesizer(&self) -> Option<&Path> {
        self.synthesizer.as_deref()
    }

    fn current(&self) -> MutexGuard<'_, Option<RunningUtterance>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SpeechPlatform for HostPlatform {
    fn supports_recognition(&self) -> bool {
        false
    }

    fn supports_synthesis(&self) -> bool {
        self.synthesizer.is_some()
    }

    #[cfg(feature = "microphone")]
    async fn request_microphone(&self) -> bool {
        super::microphone::probe_default_input().await
    }

    #[cfg(not(feature = "microphone"))]
    async fn request_microphone(&self) -> bool {
        tracing::debug!("built without microphone support");
        false
    }

    fn start_capture(
        &self,
        _config: &SpeechConfig,
        _sink: RecognitionSink,
    ) -> std::result::Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }

    fn stop_capture(&self) {}

    fn enumerate_voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    fn speak_utterance(
        &self,
        text: &str,
        params: &UtteranceParams,
        sink: SynthesisSink,
    ) -> std::result::Result<(), SpeechError> {
        let Some(program) = self.synthesizer.as_ref() else {
            return Err(SpeechError::Unsupported);
        };

        let mut child = synthesizer_command(program, text, params)
            .spawn()
            .map_err(|e| SpeechError::synthesis(format!("failed to start synthesizer: {e}")))?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let id = sink.id();
        if let Some(previous) = self.current().replace(RunningUtterance { id, kill: kill_tx }) {
            let _ = previous.kill.send(());
        }

        tokio::spawn(async move {
            sink.emit(SynthesisEvent::Started);
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => SynthesisEvent::Ended,
                        Ok(status) => SynthesisEvent::Error {
                            reason: format!("synthesizer exited with {status}"),
                        },
                        Err(e) => SynthesisEvent::Error {
                            reason: format!("synthesizer wait failed: {e}"),
                        },
                    };
                    sink.emit(event);
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(utterance = id, error = %e, "failed to kill synthesizer");
                    }
                    tracing::debug!(utterance = id, "synthesizer killed");
                }
            }
        });

        Ok(())
    }

    fn cancel_utterance(&self) {
        if let Some(running) = self.current().take() {
            tracing::debug!(utterance = running.id, "cancelling synthesizer");
            let _ = running.kill.send(());
        }
    }
}

/// Child process speaking one utterance
///
/// The text follows `--` so a leading dash is never read as an option.
fn synthesizer_command(program: &Path, text: &str, params: &UtteranceParams) -> Command {
    let mut command = Command::new(program);
    command
        .args(synthesizer_args(params))
        .arg("--")
        .arg(text)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Command-line flags for one utterance
fn synthesizer_args(params: &UtteranceParams) -> Vec<String> {
    let voice = params
        .voice
        .as_ref()
        .map_or_else(|| params.language.to_ascii_lowercase(), |v| v.id.clone());

    vec![
        "-v".to_string(),
        voice,
        "-s".to_string(),
        words_per_minute(params.rate).to_string(),
        "-p".to_string(),
        espeak_pitch(params.pitch).to_string(),
        "-a".to_string(),
        espeak_amplitude(params.volume).to_string(),
    ]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn words_per_minute(rate: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * rate).round().max(1.0) as u32
}

/// eSpeak pitch is 0..=99 with 50 as neutral
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn espeak_pitch(pitch: f32) -> u32 {
    (pitch * 50.0).round().clamp(0.0, 99.0) as u32
}

/// eSpeak amplitude is 0..=200 with 100 as neutral
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn espeak_amplitude(volume: f32) -> u32 {
    (volume * 100.0).round().clamp(0.0, 200.0) as u32
}

/// Run `<synthesizer> --voices` and parse its table
async fn list_voices(program: &Path) -> Vec<VoiceDescriptor> {
    match Command::new(program).arg("--voices").output().await {
        Ok(output) if output.status.success() => {
            parse_espeak_voices(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::warn!(status = %output.status, "voice listing failed");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to list voices");
            Vec::new()
        }
    }
}

/// Parse the table printed by `espeak --voices`
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
#[must_use]
pub fn parse_espeak_voices(table: &str) -> Vec<VoiceDescriptor> {
    table
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (language, name) = (fields.get(1)?, fields.get(3)?);
            Some(VoiceDescriptor {
                id: (*name).to_string(),
                display_name: name.replace('_', " "),
                language: (*language).to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOICES: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
 5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
";

    #[test]
    fn test_parse_voices() {
        let voices = parse_espeak_voices(VOICES);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[2].id, "English_(America)");
        assert_eq!(voices[2].display_name, "English (America)");
        assert_eq!(voices[2].language, "en-us");
    }

    #[test]
    fn test_parse_voices_ignores_garbage() {
        assert!(parse_espeak_voices("").is_empty());
        assert!(parse_espeak_voices("no table here\n 1 x").is_empty());
    }

    #[test]
    fn test_parameter_mapping() {
        assert_eq!(words_per_minute(1.0), 175);
        assert_eq!(words_per_minute(2.0), 350);
        assert_eq!(espeak_pitch(1.0), 50);
        assert_eq!(espeak_pitch(2.0), 99);
        assert_eq!(espeak_amplitude(0.8), 80);
    }

    fn default_params() -> UtteranceParams {
        UtteranceParams {
            voice: None,
            language: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    fn command_args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_args_use_language_without_voice() {
        let args = synthesizer_args(&default_params());
        assert_eq!(args[..2], ["-v".to_string(), "en-us".to_string()]);
    }

    #[test]
    fn test_text_follows_option_terminator() {
        let command = synthesizer_command(Path::new("espeak-ng"), "first item", &default_params());
        let args = command_args(&command);
        assert_eq!(args[..args.len() - 2], synthesizer_args(&default_params())[..]);
        assert_eq!(args[args.len() - 2..], ["--".to_string(), "first item".to_string()]);
    }

    #[test]
    fn test_dash_leading_text_is_not_an_option() {
        for text in ["- first item", "--help", "-v"] {
            let command = synthesizer_command(Path::new("espeak-ng"), text, &default_params());
            let args = command_args(&command);
            assert_eq!(args.iter().filter(|arg| *arg == "--").count(), 1);
            assert_eq!(args[args.len() - 2..], ["--".to_string(), text.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_missing_configured_synthesizer() {
        let result = HostPlatform::detect(Some("definitely-not-a-synthesizer-binary")).await;
        assert!(matches!(result, Err(Error::Platform(_))));
    }
}
