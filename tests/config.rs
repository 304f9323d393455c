//! Configuration loading tests

use std::time::Duration;

use voice_session::config::file::load_config_file_from;
use voice_session::{Config, Error};

mod common;

const FULL_CONFIG: &str = r#"
[recognition]
language = "es-MX"
continuous = false
interim_results = false
max_alternatives = 3

[synthesis]
voice = "Spanish_(Latin_America)"
rate = 1.2
pitch = 0.8
volume = 0.6

[session]
stop_timeout_ms = 750
probe_microphone_on_start = false
"#;

#[test]
fn test_file_values_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = Config::from_file_config(load_config_file_from(&path), |_| None);

    assert_eq!(config.recognition.language, "es-MX");
    assert!(!config.recognition.continuous);
    assert!(!config.recognition.interim_results);
    assert_eq!(config.recognition.max_alternatives, 3);
    assert_eq!(config.utterance.language, "es-MX");
    assert_eq!(
        config.utterance.voice_id.as_deref(),
        Some("Spanish_(Latin_America)")
    );
    assert!((config.utterance.volume - 0.6).abs() < f32::EPSILON);
    assert_eq!(config.stop_timeout, Duration::from_millis(750));
    assert!(!config.probe_microphone_on_start);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_from_reports_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[recognition\nlanguage = ").unwrap();

    assert!(matches!(Config::load_from(&path), Err(Error::Toml(_))));
}

#[test]
fn test_load_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(Config::load_from(&path), Err(Error::Io(_))));
}

#[test]
fn test_load_from_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[recognition]\nmax_alternatives = 0\n").unwrap();

    assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
}

#[test]
fn test_out_of_range_values_are_kept_for_clamping() {
    let config = Config::from_file_config(
        toml::from_str("[synthesis]\nrate = 7.5\nvolume = -1.0\n").unwrap(),
        |_| None,
    );

    assert!((config.utterance.rate - 7.5).abs() < f32::EPSILON);
    assert!(config.validate().is_ok());
    let clamped = config.utterance.clamped();
    assert!((clamped.rate - 2.0).abs() < f32::EPSILON);
    assert!(clamped.volume.abs() < f32::EPSILON);
}
