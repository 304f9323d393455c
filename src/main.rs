use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use voice_session::platform::{HostPlatform, ScriptedPlatform, SpeechPlatform};
use voice_session::voice::{CapabilityProbe, SUPPORTED_LANGUAGES};
use voice_session::{Config, Coordinator, SpeechCallbacks, SpeechState, VoiceDescriptor};

/// Voice Session - speech recognition and synthesis for conversational UIs
#[derive(Parser)]
#[command(name = "voice-session", version, about)]
struct Cli {
    /// Config file to use instead of the standard location
    #[arg(short, long, env = "VOICE_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what the host platform supports
    Probe {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List host synthesis voices
    Voices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List supported recognition languages
    Languages,
    /// Speak text through the host synthesizer
    Say {
        /// Text to speak
        text: String,
        /// Volume for this utterance (0.0 - 1.0)
        #[arg(long)]
        volume: Option<f32>,
        /// Speaking rate multiplier (0.5 - 2.0)
        #[arg(long)]
        rate: Option<f32>,
        /// Voice identifier (see `voices`)
        #[arg(long)]
        voice: Option<String>,
    },
    /// Run a scripted listen/speak session
    Demo,
}

#[derive(Serialize)]
struct ProbeReport {
    recognition_supported: bool,
    synthesis_supported: bool,
    microphone_available: bool,
    synthesizer: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_session=info",
        1 => "info,voice_session=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Probe { json } => probe(&config, json).await,
        Command::Voices { json } => voices(&config, json).await,
        Command::Languages => {
            languages();
            Ok(())
        }
        Command::Say {
            text,
            volume,
            rate,
            voice,
        } => say(config, &text, volume, rate, voice).await,
        Command::Demo => demo(config).await,
    }
}

/// Report host capabilities
async fn probe(config: &Config, json: bool) -> anyhow::Result<()> {
    let host = HostPlatform::detect(config.synthesizer.as_deref()).await?;
    let synthesizer = host.synthesizer().map(|p| p.display().to_string());

    let probe = CapabilityProbe::new(Arc::new(host));
    let capabilities = probe.probe();
    let microphone = probe.check_microphone().await;

    let report = ProbeReport {
        recognition_supported: capabilities.recognition_supported,
        synthesis_supported: capabilities.synthesis_supported,
        microphone_available: microphone,
        synthesizer,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Speech recognition: {}", yes_no(report.recognition_supported));
    println!("Speech synthesis:   {}", yes_no(report.synthesis_supported));
    println!("Microphone:         {}", yes_no(report.microphone_available));
    if let Some(path) = &report.synthesizer {
        println!("Synthesizer:        {path}");
    }
    Ok(())
}

/// List host voices
async fn voices(config: &Config, json: bool) -> anyhow::Result<()> {
    let host = HostPlatform::detect(config.synthesizer.as_deref()).await?;
    let voices = host.enumerate_voices();

    if json {
        println!("{}", serde_json::to_string_pretty(&voices)?);
        return Ok(());
    }

    if voices.is_empty() {
        println!("No voices available");
        return Ok(());
    }
    for voice in &voices {
        println!("{:<24} {:<12} {}", voice.id, voice.language, voice.display_name);
    }
    Ok(())
}

fn languages() {
    for language in SUPPORTED_LANGUAGES {
        println!("{:<8} {}", language.code, language.name);
    }
}

/// Speak once through the host synthesizer and wait for the result
async fn say(
    mut config: Config,
    text: &str,
    volume: Option<f32>,
    rate: Option<f32>,
    voice: Option<String>,
) -> anyhow::Result<()> {
    if let Some(rate) = rate {
        config.utterance.rate = rate;
    }
    if voice.is_some() {
        config.utterance.voice_id = voice;
    }
    config.probe_microphone_on_start = false;

    let host = HostPlatform::detect(config.synthesizer.as_deref()).await?;
    let coordinator = Coordinator::new(Arc::new(host), &config, SpeechCallbacks::default());

    if !coordinator.state().is_synthesis_supported {
        anyhow::bail!("no speech synthesizer found (install espeak-ng or set VOICE_SESSION_SYNTHESIZER)");
    }

    coordinator
        .speak(text, volume)
        .await
        .map_err(|e| anyhow::anyhow!("speech failed: {e}"))
}

/// Drive a full session against the scripted platform
async fn demo(mut config: Config) -> anyhow::Result<()> {
    config.recognition.continuous = false;

    let platform = ScriptedPlatform::new()
        .with_auto_start()
        .with_auto_end_on_stop()
        .with_voices(vec![VoiceDescriptor {
            id: "demo-voice".to_string(),
            display_name: "Demo Voice".to_string(),
            language: config.utterance.language.clone(),
        }]);

    let callbacks = SpeechCallbacks::default()
        .on_start(|| println!("[listening]"))
        .on_stop(|| println!("[stopped]"))
        .on_transcript(|text, is_final| {
            let tag = if is_final { "final" } else { "interim" };
            println!("  {tag:>7}: {text}");
        })
        .on_error(|e| println!("  error: {e}"));

    let coordinator = Coordinator::new(Arc::new(platform.clone()), &config, callbacks);
    let mut updates = coordinator.subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            tracing::info!(
                recognition = ?state.recognition,
                synthesis = ?state.synthesis,
                "state changed"
            );
        }
    });

    coordinator.start_listening();
    coordinator.settle().await;

    platform.emit_interim("what is the");
    platform.emit_interim("what is the weather");
    platform.emit_final("what is the weather today");
    platform.emit_ended();
    coordinator.settle().await;

    let reply = format!("You said: {}", coordinator.state().current_transcript);
    let completion = coordinator.speak(reply.as_str(), None);
    coordinator.settle().await;
    println!("[speaking] {reply}");
    platform.finish_utterance();
    completion
        .await
        .map_err(|e| anyhow::anyhow!("speech failed: {e}"))?;
    println!("[spoken]");

    print_state(&coordinator.state());

    drop(coordinator);
    let _ = watcher.await;
    Ok(())
}

fn print_state(state: &SpeechState) {
    println!("\n---");
    println!("listening:  {}", yes_no(state.is_listening));
    println!("speaking:   {}", yes_no(state.is_speaking));
    println!("transcript: {}", state.current_transcript);
    if let Some(error) = &state.last_error {
        println!("last error: {error}");
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
