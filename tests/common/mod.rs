//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use voice_session::{Config, Coordinator, ScriptedPlatform, SpeechCallbacks, SpeechError};

/// Callback invocation captured by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Transcript(String, bool),
    Error(SpeechError),
    Start,
    Stop,
}

/// Records every callback in order
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> SpeechCallbacks {
        let transcripts = self.clone();
        let errors = self.clone();
        let starts = self.clone();
        let stops = self.clone();
        SpeechCallbacks::default()
            .on_transcript(move |text, is_final| {
                transcripts.push(Event::Transcript(text.to_string(), is_final));
            })
            .on_error(move |e| errors.push(Event::Error(e.clone())))
            .on_start(move || starts.push(Event::Start))
            .on_stop(move || stops.push(Event::Stop))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<SpeechError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn transcripts(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transcript(text, is_final) => Some((text, is_final)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Config with a short stop watchdog and no eager microphone check
pub fn test_config() -> Config {
    Config {
        stop_timeout: Duration::from_millis(50),
        probe_microphone_on_start: false,
        ..Config::default()
    }
}

/// Coordinator over `platform` with a recorder attached
pub fn coordinator(platform: &ScriptedPlatform) -> (Coordinator, Recorder) {
    coordinator_with(platform, &test_config())
}

pub fn coordinator_with(platform: &ScriptedPlatform, config: &Config) -> (Coordinator, Recorder) {
    let recorder = Recorder::default();
    let coordinator = Coordinator::new(Arc::new(platform.clone()), config, recorder.callbacks());
    (coordinator, recorder)
}

/// Start listening and wait until the platform reports capture started
pub async fn listening(platform: &ScriptedPlatform, coordinator: &Coordinator) {
    coordinator.start_listening();
    coordinator.settle().await;
    assert!(platform.emit_started(), "no capture listener registered");
    coordinator.settle().await;
}
