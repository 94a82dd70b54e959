use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;

use crate::error::PlayerError;

/// Undecoded audio handed to the user-facing media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Bytes,
    pub mime: String,
}

impl AudioBlob {
    pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/flac" => "flac",
            "audio/aac" => "aac",
            _ => "bin",
        }
    }
}

/// The media element plus download affordance the player reports to.
pub trait MediaSink: Send + Sync {
    /// Assign `blob` as the element's source and reveal the element and
    /// the download affordance.
    fn present(&self, blob: &AudioBlob) -> Result<(), PlayerError>;

    /// Play whatever source was last presented, using the sink's own decoder.
    fn play(&self) -> Result<(), PlayerError>;
}

/// Saves each presented blob to a directory and optionally opens it with
/// an external player command.
pub struct FileSink {
    output_dir: PathBuf,
    player_command: Option<String>,
    counter: AtomicU64,
    current: Mutex<Option<PathBuf>>,
    last_exit: Arc<Mutex<Option<ExitStatus>>>,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>, player_command: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            player_command,
            counter: AtomicU64::new(0),
            current: Mutex::new(None),
            last_exit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the most recently presented blob.
    pub fn current(&self) -> Option<PathBuf> {
        self.current.lock().ok().and_then(|c| c.clone())
    }

    /// Exit status of the most recent external player to finish.
    pub fn last_player_status(&self) -> Option<ExitStatus> {
        self.last_exit.lock().ok().and_then(|s| *s)
    }
}

impl MediaSink for FileSink {
    fn present(&self, blob: &AudioBlob) -> Result<(), PlayerError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self
            .output_dir
            .join(format!("speech-{}.{}", n, blob.extension()));
        std::fs::write(&path, &blob.bytes)?;

        tracing::info!(
            "Audio ready ({} bytes, {}): {}",
            blob.bytes.len(),
            blob.mime,
            path.display()
        );
        if let Ok(mut current) = self.current.lock() {
            *current = Some(path);
        }
        Ok(())
    }

    fn play(&self) -> Result<(), PlayerError> {
        let Some(path) = self.current() else {
            return Err(PlayerError::Context("no audio source presented".to_string()));
        };
        let Some(command) = self.player_command.as_deref() else {
            tracing::info!("No external player configured; audio saved at {}", path.display());
            return Ok(());
        };

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| PlayerError::Context("empty player command".to_string()))?;
        let mut child = Command::new(program)
            .args(parts)
            .arg(&path)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        tracing::info!("Started external player '{}' for {}", program, path.display());

        // Reaped on its own thread; `play` does not wait for the player to exit.
        let slot = Arc::clone(&self.last_exit);
        let name = program.to_string();
        thread::Builder::new()
            .name("tts-player-wait".to_string())
            .spawn(move || match child.wait() {
                Ok(status) => {
                    tracing::debug!("External player '{}' exited with {}", name, status);
                    if let Ok(mut last) = slot.lock() {
                        *last = Some(status);
                    }
                }
                Err(e) => tracing::warn!("Failed to wait for external player '{}': {}", name, e),
            })?;
        Ok(())
    }
}
