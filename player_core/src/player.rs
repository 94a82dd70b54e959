use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::context::{AudioContext, ContextState, PlaybackHandle};
use crate::error::PlayerError;
use crate::format::AudioFormat;
use crate::metrics::StreamMetrics;
use crate::sink::{AudioBlob, MediaSink};
use crate::stream::{concat_chunks, InputMode, StreamReport, TRIGGER_THRESHOLD};
use crate::wav::wrap_pcm16;

/// Builds the playback context the first time a player needs one.
pub type ContextFactory<C> = Box<dyn Fn() -> Result<C, PlayerError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Playback starts once strictly more than this many bytes are buffered.
    pub threshold: usize,
    /// When false the response body is read in one piece and handed to the
    /// sink undecoded.
    pub streaming: bool,
    pub connect_timeout: Option<Duration>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            threshold: TRIGGER_THRESHOLD,
            streaming: true,
            connect_timeout: None,
        }
    }
}

/// How a playback attempt ended up reaching the listener.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Decoded {
        sample_rate: u32,
        channels: u16,
        duration: Duration,
    },
    RawFallback {
        reason: String,
    },
}

impl PlaybackOutcome {
    pub fn is_decoded(&self) -> bool {
        matches!(self, PlaybackOutcome::Decoded { .. })
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Session<C: AudioContext> {
    factory: ContextFactory<C>,
    context: Mutex<Option<Arc<C>>>,
    source: Mutex<Option<Box<dyn PlaybackHandle>>>,
    pub(crate) chunks: Mutex<Vec<Bytes>>,
    pub(crate) is_playing: AtomicBool,
    sink: Arc<dyn MediaSink>,
    pub(crate) metrics: Arc<StreamMetrics>,
    pub(crate) options: PlayerOptions,
}

impl<C: AudioContext> Session<C> {
    async fn initialize(&self) -> Result<Arc<C>, PlayerError> {
        let ctx = {
            let mut slot = lock(&self.context);
            match slot.as_ref() {
                Some(ctx) => Arc::clone(ctx),
                None => {
                    let ctx = Arc::new((self.factory)()?);
                    debug!("Audio context created");
                    *slot = Some(Arc::clone(&ctx));
                    ctx
                }
            }
        };

        if ctx.state() == ContextState::Suspended {
            debug!("Resuming suspended audio context");
            ctx.resume().await?;
        }
        Ok(ctx)
    }

    /// Start of a new stream request: drop the previous chunks and re-arm
    /// the trigger. A handle that is still sounding keeps going until a new
    /// playback supersedes it.
    pub(crate) fn begin(&self) {
        lock(&self.chunks).clear();
        self.is_playing.store(false, Ordering::SeqCst);
    }

    /// Claim the trigger and spawn playback. The flag is taken here, before
    /// the task runs, so a second dispatch in the same session is a no-op.
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        chunks: Vec<Bytes>,
        format: &AudioFormat,
    ) -> Option<JoinHandle<PlaybackOutcome>> {
        if self
            .is_playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let session = Arc::clone(self);
        let format = format.clone();
        Some(tokio::spawn(
            async move { session.start_streaming(chunks, &format).await }.in_current_span(),
        ))
    }

    async fn start_streaming(&self, chunks: Vec<Bytes>, format: &AudioFormat) -> PlaybackOutcome {
        self.is_playing.store(true, Ordering::SeqCst);

        let combined = concat_chunks(&chunks);
        debug!("Starting playback from {} chunks ({} bytes)", chunks.len(), combined.len());
        let blob = blob_for(&combined, format);

        let outcome = match self.decode_and_start(combined, format).await {
            Ok(outcome) => {
                if let Err(e) = self.sink.present(&blob) {
                    warn!("Failed to present audio: {}", e);
                }
                outcome
            }
            Err(reason) => {
                error!("{}", reason);
                self.play_blob(&blob);
                PlaybackOutcome::RawFallback { reason }
            }
        };

        self.metrics.record_playback(outcome.is_decoded());
        outcome
    }

    async fn decode_and_start(
        &self,
        bytes: Bytes,
        format: &AudioFormat,
    ) -> Result<PlaybackOutcome, String> {
        let ctx = self.initialize().await.map_err(|e| e.to_string())?;
        let audio = ctx
            .decode(bytes, format)
            .await
            .map_err(|e| format!("Audio decode error: {e}"))?;

        let outcome = PlaybackOutcome::Decoded {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            duration: audio.duration(),
        };
        let handle = ctx
            .start(audio)
            .await
            .map_err(|e| format!("Audio start error: {e}"))?;
        self.replace_source(handle);
        Ok(outcome)
    }

    fn replace_source(&self, handle: Box<dyn PlaybackHandle>) {
        let mut source = lock(&self.source);
        if let Some(mut previous) = source.take() {
            debug!("Stopping superseded playback");
            previous.stop();
        }
        *source = Some(handle);
    }

    pub(crate) fn play_blob(&self, blob: &AudioBlob) {
        if let Err(e) = self.sink.present(blob) {
            warn!("Failed to present audio: {}", e);
            return;
        }
        if let Err(e) = self.sink.play() {
            warn!("Failed to play audio: {}", e);
        }
    }

    fn stop(&self) {
        if let Some(mut handle) = lock(&self.source).take() {
            handle.stop();
            info!("Playback stopped");
        }
        self.is_playing.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn blob_for(bytes: &Bytes, format: &AudioFormat) -> AudioBlob {
    match format {
        AudioFormat::Pcm {
            sample_rate,
            channels,
            bits_per_sample: 16,
        } => match wrap_pcm16(bytes, *sample_rate, *channels) {
            Ok(wav) => AudioBlob::new(wav, "audio/wav"),
            Err(e) => {
                warn!("Could not wrap PCM in WAV: {}", e);
                AudioBlob::new(bytes.clone(), "audio/pcm")
            }
        },
        AudioFormat::Pcm { .. } => AudioBlob::new(bytes.clone(), "audio/pcm"),
        _ => AudioBlob::new(bytes.clone(), format.blob_mime()),
    }
}

/// Plays a streamed TTS response, starting before the body has finished
/// arriving.
pub struct StreamPlayer<C: AudioContext> {
    session: Arc<Session<C>>,
    client: reqwest::Client,
}

impl<C: AudioContext> StreamPlayer<C> {
    pub fn new(
        factory: ContextFactory<C>,
        sink: Arc<dyn MediaSink>,
        options: PlayerOptions,
    ) -> Result<Self, PlayerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            session: Arc::new(Session {
                factory,
                context: Mutex::new(None),
                source: Mutex::new(None),
                chunks: Mutex::new(Vec::new()),
                is_playing: AtomicBool::new(false),
                sink,
                metrics: Arc::new(StreamMetrics::new()),
                options,
            }),
            client,
        })
    }

    /// Ensure a running playback context exists. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<Arc<C>, PlayerError> {
        self.session.initialize().await
    }

    /// POST `params` as JSON to `url` and play the audio that comes back.
    ///
    /// Returns once the body has been read to the end. Playback that was
    /// triggered along the way keeps running in `StreamReport::playback`.
    pub async fn stream_tts<P>(&self, url: &str, params: &P) -> Result<StreamReport, PlayerError>
    where
        P: Serialize + ?Sized,
    {
        let span = tracing::info_span!("stream", session = %uuid::Uuid::new_v4());
        self.stream_request(url, params).instrument(span).await
    }

    async fn stream_request<P>(&self, url: &str, params: &P) -> Result<StreamReport, PlayerError>
    where
        P: Serialize + ?Sized,
    {
        self.session.initialize().await?;
        self.session.metrics.record_stream_started();
        let started = Instant::now();

        let result = self.fetch(url, params, started).await;
        if let Err(e) = &result {
            error!("Streaming error: {}", e);
            self.session.metrics.record_request_error();
        }
        result
    }

    async fn fetch<P>(&self, url: &str, params: &P, started: Instant) -> Result<StreamReport, PlayerError>
    where
        P: Serialize + ?Sized,
    {
        info!("Requesting speech from {}", url);
        let response = self.client.post(url).json(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::from_status(status));
        }

        let format = AudioFormat::from_headers(response.headers());
        debug!("Response format: {:?}", format);

        if !self.session.options.streaming {
            self.session.begin();
            let body = response.bytes().await?;
            self.session.metrics.record_bytes(body.len());
            info!("Read whole body ({} bytes), handing it to the media sink", body.len());
            let blob = blob_for(&body, &format);
            self.session.play_blob(&blob);
            return Ok(StreamReport {
                mode: InputMode::WholeBody,
                chunks: 1,
                total_bytes: body.len(),
                trigger: None,
                late_bytes: 0,
                playback: None,
            });
        }

        self.session
            .read_stream(response.bytes_stream(), format, started)
            .await
    }

    /// Run the buffering/trigger loop over an arbitrary byte stream.
    pub async fn ingest<S, E>(&self, stream: S, format: AudioFormat) -> Result<StreamReport, PlayerError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<PlayerError>,
    {
        self.session.initialize().await?;
        self.session.metrics.record_stream_started();
        let result = self.session.read_stream(stream, format, Instant::now()).await;
        if let Err(e) = &result {
            error!("Streaming error: {}", e);
        }
        result
    }

    /// Decode `chunks` and start playback, falling back to the sink's own
    /// player if decoding fails. Never returns an error.
    pub async fn start_streaming(&self, chunks: Vec<Bytes>, format: &AudioFormat) -> PlaybackOutcome {
        self.session.start_streaming(chunks, format).await
    }

    /// Hand undecoded audio straight to the media sink and play it there.
    pub fn play_blob(&self, blob: &AudioBlob) {
        self.session.play_blob(blob)
    }

    /// Stop the active playback, if any. Idempotent.
    pub fn stop(&self) {
        self.session.stop()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing.load(Ordering::SeqCst)
    }

    /// True while a started playback handle has audio left to play.
    pub fn is_sounding(&self) -> bool {
        lock(&self.session.source)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Bytes buffered in the current stream session.
    pub fn buffered_bytes(&self) -> usize {
        lock(&self.session.chunks).iter().map(Bytes::len).sum()
    }

    pub fn metrics(&self) -> Arc<StreamMetrics> {
        Arc::clone(&self.session.metrics)
    }
}
