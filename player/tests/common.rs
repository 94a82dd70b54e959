//! Common utilities for CLI integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use player::cli::Args;
use player::config::PlayerConfig;
use player_core::encode_wav;

#[derive(Default)]
pub struct TtsServer {
    pub audio: Vec<u8>,
    pub requests: Mutex<Vec<serde_json::Value>>,
}

impl TtsServer {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn speech(
    State(state): State<Arc<TtsServer>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.requests.lock().unwrap().push(body);
    ([(header::CONTENT_TYPE, "audio/wav")], state.audio.clone())
}

async fn overloaded() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "model loading")
}

/// Serve `audio` from /v1/audio/speech on an ephemeral port.
pub async fn spawn_tts_server(audio: Vec<u8>) -> (String, Arc<TtsServer>) {
    let state = Arc::new(TtsServer {
        audio,
        ..Default::default()
    });
    let app = Router::new()
        .route("/v1/audio/speech", post(speech))
        .route("/v1/audio/busy", post(overloaded))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

/// A short mono test tone as WAV.
pub fn short_tone() -> Vec<u8> {
    let samples: Vec<f32> = (0..4800)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    encode_wav(&samples, 24000, 1).expect("Failed to encode test tone")
}

/// Parse command-line arguments and layer them over a test config that
/// writes into `out_dir`.
pub fn args_and_config(argv: &[&str], out_dir: &std::path::Path) -> (Args, PlayerConfig) {
    use clap::Parser;

    let mut full = vec!["tts-play"];
    full.extend_from_slice(argv);
    let args = Args::try_parse_from(full).expect("Failed to parse test arguments");
    let base = PlayerConfig {
        output_dir: out_dir.to_path_buf(),
        ..PlayerConfig::default()
    };
    let config = args.apply(base);
    (args, config)
}
