use player_core::PlayerError;
use thiserror::Error;

/// Errors surfaced by the command-line player
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Playback error: {0}")]
    Player(#[from] PlayerError),
}
