// Configuration for the command-line player

use std::path::PathBuf;
use std::time::Duration;

use player_core::{PlayerOptions, DEFAULT_MODEL, TRIGGER_THRESHOLD};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000/v1/audio/speech";

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub url: String,
    pub model: String,
    pub voice: Option<String>,
    pub trigger_threshold: usize,
    pub streaming: bool,
    pub output_dir: PathBuf,
    pub player_command: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: None,
            trigger_threshold: TRIGGER_THRESHOLD,
            streaming: true,
            output_dir: std::env::temp_dir().join("tts-play"),
            player_command: None,
            request_timeout_secs: 30,
        }
    }
}

impl PlayerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from any variable source. Unset or unparsable values
    /// fall back to the defaults.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let url = var("TTS_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.url);

        let model = var("TTS_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.model);

        let voice = var("TTS_VOICE").filter(|v| !v.trim().is_empty());

        let trigger_threshold = var("TTS_TRIGGER_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.trigger_threshold);

        let streaming = var("TTS_STREAMING")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.streaming);

        let output_dir = var("TTS_OUTPUT_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let player_command = var("TTS_PLAYER_CMD").filter(|v| !v.trim().is_empty());

        let request_timeout_secs = var("TTS_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        Self {
            url,
            model,
            voice,
            trigger_threshold,
            streaming,
            output_dir,
            player_command,
            request_timeout_secs,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            threshold: self.trigger_threshold,
            streaming: self.streaming,
            connect_timeout: Some(self.request_timeout()),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
