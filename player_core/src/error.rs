use thiserror::Error;

/// Errors surfaced by the player to whoever started a stream.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("HTTP {status}: {reason}")]
    Request { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Audio context error: {0}")]
    Context(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    /// Builds a `Request` error from a response status.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        PlayerError::Request {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Decoding failures. These never leave the player; they route playback
/// to the raw-blob fallback instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("No audio samples in payload")]
    Empty,

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),
}
