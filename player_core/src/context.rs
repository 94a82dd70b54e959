use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::decode::{decode_audio, AudioBuffer};
use crate::error::{DecodeError, PlayerError};
use crate::format::AudioFormat;

/// Execution state of a playback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

impl ContextState {
    fn to_u8(self) -> u8 {
        match self {
            ContextState::Running => 0,
            ContextState::Suspended => 1,
            ContextState::Closed => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ContextState::Running,
            1 => ContextState::Suspended,
            _ => ContextState::Closed,
        }
    }
}

/// A live playback, stoppable once.
pub trait PlaybackHandle: Send {
    fn stop(&mut self);
    fn is_finished(&self) -> bool;
}

/// The audio playback context a player decodes and plays through.
#[async_trait]
pub trait AudioContext: Send + Sync + 'static {
    fn state(&self) -> ContextState;

    async fn resume(&self) -> Result<(), PlayerError>;

    /// Decode a complete buffer. Runs on the blocking pool by default.
    async fn decode(&self, bytes: Bytes, format: &AudioFormat) -> Result<AudioBuffer, DecodeError> {
        let format = format.clone();
        match tokio::task::spawn_blocking(move || decode_audio(&bytes, &format)).await {
            Ok(result) => result,
            Err(e) => Err(DecodeError::Unsupported(format!("decoder task failed: {e}"))),
        }
    }

    /// Start playing `audio` immediately on the context output. Device
    /// start-up must not block the calling runtime thread.
    async fn start(&self, audio: AudioBuffer) -> Result<Box<dyn PlaybackHandle>, PlayerError>;
}

/// A context with no audio device. Decoding is real; playback is a timer
/// that runs for the length of the decoded audio.
#[derive(Debug)]
pub struct HeadlessContext {
    state: AtomicU8,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ContextState::Running.to_u8()),
        }
    }

    pub fn suspend(&self) {
        self.state
            .store(ContextState::Suspended.to_u8(), Ordering::SeqCst);
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioContext for HeadlessContext {
    fn state(&self) -> ContextState {
        ContextState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        match self.state() {
            ContextState::Closed => Err(PlayerError::Context("context is closed".to_string())),
            _ => {
                self.state
                    .store(ContextState::Running.to_u8(), Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn start(&self, audio: AudioBuffer) -> Result<Box<dyn PlaybackHandle>, PlayerError> {
        if self.state() != ContextState::Running {
            return Err(PlayerError::Context(format!(
                "cannot start playback while {:?}",
                self.state()
            )));
        }
        tracing::info!(
            "Headless playback: {:.2}s at {}Hz, {} channel(s)",
            audio.duration().as_secs_f64(),
            audio.sample_rate,
            audio.channels
        );
        Ok(Box::new(TimedPlayback::spawn(audio.duration())))
    }
}

/// Playback that "sounds" for a fixed duration on the tokio runtime.
pub struct TimedPlayback {
    finished: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TimedPlayback {
    pub fn spawn(duration: std::time::Duration) -> Self {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            flag.store(true, Ordering::SeqCst);
        });
        Self {
            finished,
            task: Some(task),
        }
    }
}

impl PlaybackHandle for TimedPlayback {
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for TimedPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
