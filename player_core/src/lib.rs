//! Incremental playback of streamed text-to-speech responses.
//!
//! A [`StreamPlayer`] posts a speech request, buffers the response body as
//! it arrives and starts playback as soon as enough bytes are in to decode
//! something playable. Output goes through an injected [`AudioContext`];
//! the undecoded audio is also handed to a [`MediaSink`] so it can be saved
//! or played by an external player when decoding is not possible.

mod context;
mod decode;
#[cfg(feature = "device")]
mod device;
mod error;
mod format;
mod metrics;
mod player;
mod request;
mod sink;
mod stream;
mod wav;

pub use context::{AudioContext, ContextState, HeadlessContext, PlaybackHandle, TimedPlayback};
pub use decode::{decode_audio, AudioBuffer};
#[cfg(feature = "device")]
pub use device::{DeviceContext, DevicePlayback};
pub use error::{DecodeError, PlayerError};
pub use format::{AudioFormat, DEFAULT_PCM_SAMPLE_RATE};
pub use metrics::{MetricsSnapshot, StreamMetrics, TriggerStats};
pub use player::{ContextFactory, PlaybackOutcome, PlayerOptions, StreamPlayer};
pub use request::{SpeechRequest, DEFAULT_MODEL};
pub use sink::{AudioBlob, FileSink, MediaSink};
pub use stream::{concat_chunks, InputMode, StreamReport, Trigger, TriggerKind, TRIGGER_THRESHOLD};
pub use wav::{encode_wav, wrap_pcm16};
