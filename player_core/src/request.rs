use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "mlx-community/Kokoro-82M-bf16";

/// JSON body of a speech request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub speed: f32,
    pub lang_code: String,
    pub temperature: f32,
    pub response_format: String,
    /// Base64-encoded voice embedding mixed from several voices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blended_voice: Option<String>,
}

impl SpeechRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            input: input.into(),
            voice: None,
            speed: 1.0,
            lang_code: "a".to_string(),
            temperature: 0.7,
            response_format: "wav".to_string(),
            blended_voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_blended_voice(mut self, blended: impl Into<String>) -> Self {
        self.blended_voice = Some(blended.into());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}
