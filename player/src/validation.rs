use crate::error::CliError;

/// Maximum text length for a single speech request
pub const MAX_TEXT_LENGTH: usize = 5000;
/// Speaking rate bounds accepted by the synthesis server
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Container formats the speech endpoint can encode to
pub const RESPONSE_FORMATS: &[&str] = &["wav", "flac", "mp3", "ogg"];

/// Validate a speech request before anything is sent
pub fn validate_speech_request(
    text: &str,
    speed: f32,
    lang_code: &str,
    format: &str,
) -> Result<(), CliError> {
    if text.trim().is_empty() {
        return Err(CliError::InvalidInput("Text cannot be empty".to_string()));
    }
    let chars = text.chars().count();
    if chars > MAX_TEXT_LENGTH {
        return Err(CliError::InvalidInput(format!(
            "Text too long ({} characters, max {})",
            chars, MAX_TEXT_LENGTH
        )));
    }

    if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(CliError::InvalidInput(format!(
            "Speed {} out of range ({}..={})",
            speed, MIN_SPEED, MAX_SPEED
        )));
    }

    if !is_valid_lang_code(lang_code) {
        return Err(CliError::InvalidInput(format!(
            "Invalid language code: {}. Expected a single lowercase letter (e.g. a, b, j, z)",
            lang_code
        )));
    }

    if !RESPONSE_FORMATS.contains(&format) {
        return Err(CliError::InvalidInput(format!(
            "Unsupported response format: {}. Expected one of: {}",
            format,
            RESPONSE_FORMATS.join(", ")
        )));
    }

    Ok(())
}

// Kokoro pipelines are keyed by one letter: a = American English, b = British, ...
fn is_valid_lang_code(code: &str) -> bool {
    code.len() == 1 && code.chars().all(|c| c.is_ascii_lowercase())
}
