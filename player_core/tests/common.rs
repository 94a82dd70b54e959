//! Common utilities for player integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use player_core::{
    decode_audio, encode_wav, AudioBlob, AudioBuffer, AudioContext, AudioFormat, ContextState,
    DecodeError, MediaSink, PlaybackHandle, PlayerError, PlayerOptions, StreamPlayer,
};

/// What the mock context does when asked to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Pretend every buffer is valid audio.
    Accept,
    /// Fail every decode.
    Reject,
    /// Use the real decoder.
    Real,
}

/// Everything the mock context observed, shared with the test.
#[derive(Debug, Default)]
pub struct Probe {
    pub created: AtomicUsize,
    pub resumed: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: Arc<AtomicUsize>,
    pub decoded: Mutex<Vec<usize>>,
}

impl Probe {
    pub fn decoded(&self) -> Vec<usize> {
        self.decoded.lock().unwrap().clone()
    }
}

pub struct MockContext {
    probe: Arc<Probe>,
    state: Mutex<ContextState>,
    mode: DecodeMode,
    decode_delay: Duration,
}

#[async_trait]
impl AudioContext for MockContext {
    fn state(&self) -> ContextState {
        *self.state.lock().unwrap()
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.probe.resumed.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = ContextState::Running;
        Ok(())
    }

    async fn decode(&self, bytes: Bytes, format: &AudioFormat) -> Result<AudioBuffer, DecodeError> {
        self.probe.decoded.lock().unwrap().push(bytes.len());
        if !self.decode_delay.is_zero() {
            tokio::time::sleep(self.decode_delay).await;
        }
        match self.mode {
            DecodeMode::Accept => Ok(AudioBuffer {
                samples: vec![0.0; bytes.len() / 2],
                sample_rate: 24000,
                channels: 1,
            }),
            DecodeMode::Reject => Err(DecodeError::Unsupported("mock rejects".to_string())),
            DecodeMode::Real => decode_audio(&bytes, format),
        }
    }

    async fn start(&self, _audio: AudioBuffer) -> Result<Box<dyn PlaybackHandle>, PlayerError> {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            stopped: Arc::clone(&self.probe.stopped),
            finished: false,
        }))
    }
}

pub struct MockHandle {
    stopped: Arc<AtomicUsize>,
    finished: bool,
}

impl PlaybackHandle for MockHandle {
    fn stop(&mut self) {
        if !self.finished {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Media sink that remembers what it was shown.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub presented: Mutex<Vec<AudioBlob>>,
    pub plays: AtomicUsize,
}

impl RecordingSink {
    pub fn presented(&self) -> Vec<AudioBlob> {
        self.presented.lock().unwrap().clone()
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl MediaSink for RecordingSink {
    fn present(&self, blob: &AudioBlob) -> Result<(), PlayerError> {
        self.presented.lock().unwrap().push(blob.clone());
        Ok(())
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub player: StreamPlayer<MockContext>,
    pub probe: Arc<Probe>,
    pub sink: Arc<RecordingSink>,
}

pub struct HarnessBuilder {
    mode: DecodeMode,
    initial_state: ContextState,
    decode_delay: Duration,
    options: PlayerOptions,
}

impl HarnessBuilder {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            initial_state: ContextState::Running,
            decode_delay: Duration::ZERO,
            options: PlayerOptions::default(),
        }
    }

    pub fn suspended(mut self) -> Self {
        self.initial_state = ContextState::Suspended;
        self
    }

    pub fn decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    pub fn whole_body(mut self) -> Self {
        self.options.streaming = false;
        self
    }

    pub fn build(self) -> Harness {
        let probe = Arc::new(Probe::default());
        let sink = Arc::new(RecordingSink::default());

        let factory_probe = Arc::clone(&probe);
        let mode = self.mode;
        let state = self.initial_state;
        let delay = self.decode_delay;
        let player = StreamPlayer::new(
            Box::new(move || {
                factory_probe.created.fetch_add(1, Ordering::SeqCst);
                Ok(MockContext {
                    probe: Arc::clone(&factory_probe),
                    state: Mutex::new(state),
                    mode,
                    decode_delay: delay,
                })
            }),
            sink.clone(),
            self.options,
        )
        .expect("Failed to build player for tests");

        Harness {
            player,
            probe,
            sink,
        }
    }
}

pub fn harness(mode: DecodeMode) -> Harness {
    HarnessBuilder::new(mode).build()
}

/// A synthetic body stream delivering `chunks` in order.
pub fn chunk_stream(
    chunks: Vec<Vec<u8>>,
) -> impl futures::Stream<Item = Result<Bytes, PlayerError>> {
    futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

/// A 440Hz test tone as a 16-bit mono WAV file.
pub fn tone_wav(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let len = (sample_rate as f32 * seconds) as usize;
    let samples: Vec<f32> = (0..len)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5)
        .collect();
    encode_wav(&samples, sample_rate, 1).expect("Failed to encode test tone")
}

/// State for the local TTS test server.
#[derive(Default)]
pub struct ServerState {
    pub chunks: Vec<Vec<u8>>,
    pub content_type: Option<&'static str>,
    pub extra_headers: Vec<(&'static str, &'static str)>,
    pub requests: Mutex<Vec<serde_json::Value>>,
    pub request_content_types: Mutex<Vec<String>>,
}

async fn speech(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.requests.lock().unwrap().push(body);
    if let Some(ct) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        state
            .request_content_types
            .lock()
            .unwrap()
            .push(ct.to_string());
    }

    let chunks = state.chunks.clone();
    let stream = futures::stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, std::io::Error>(chunk)
    });

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(ct) = state.content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    for (name, value) in &state.extra_headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from_stream(stream)).unwrap()
}

async fn failing() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "synthesis failed")
}

/// Start a TTS server on an ephemeral port and return its base URL.
pub async fn spawn_server(state: ServerState) -> (String, Arc<ServerState>) {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/v1/audio/speech", post(speech))
        .route("/v1/audio/broken", post(failing))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}
