use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use player_core::{
    AudioContext, ContextFactory, FileSink, MetricsSnapshot, SpeechRequest, StreamPlayer,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PlayerConfig;
use crate::error::CliError;
use crate::validation::validate_speech_request;

/// Speak TEXT through a streaming TTS server, starting playback before the
/// response has finished downloading.
#[derive(Debug, Clone, Parser)]
#[command(name = "tts-play", version)]
pub struct Args {
    /// Text to synthesise
    pub text: String,

    /// Speech endpoint (overrides TTS_URL)
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub voice: Option<String>,

    #[arg(long, default_value_t = 1.0)]
    pub speed: f32,

    #[arg(long, default_value = "a")]
    pub lang_code: String,

    #[arg(long)]
    pub model: Option<String>,

    /// Encoding to request from the server: wav, flac, mp3 or ogg.
    /// Only WAV is decoded early; the others are saved and handed to the
    /// external player
    #[arg(long, default_value = "wav")]
    pub format: String,

    /// Read the whole response before handing it to the player
    #[arg(long)]
    pub no_stream: bool,

    /// Where received audio is saved (overrides TTS_OUTPUT_DIR)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// External command used when the audio cannot be decoded, e.g. "aplay -q"
    #[arg(long)]
    pub player_cmd: Option<String>,

    /// Print a JSON summary with stream metrics when done
    #[arg(long)]
    pub metrics: bool,
}

impl Args {
    /// Layer the command-line flags over the environment config.
    pub fn apply(&self, mut config: PlayerConfig) -> PlayerConfig {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.voice.is_some() {
            config.voice = self.voice.clone();
        }
        if self.no_stream {
            config.streaming = false;
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir = dir.clone();
        }
        if self.player_cmd.is_some() {
            config.player_command = self.player_cmd.clone();
        }
        config
    }

    pub fn speech_request(&self, config: &PlayerConfig) -> SpeechRequest {
        let mut request = SpeechRequest::new(self.text.clone()).with_speed(self.speed);
        request.model = config.model.clone();
        request.voice = config.voice.clone();
        request.lang_code = self.lang_code.clone();
        request.response_format = self.format.clone();
        request
    }
}

/// What a run did, printed with `--metrics`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub mode: String,
    pub chunks: usize,
    pub total_bytes: usize,
    pub trigger_bytes: Option<usize>,
    pub late_bytes: usize,
    pub decoded: Option<bool>,
    pub saved_to: Option<PathBuf>,
    pub metrics: MetricsSnapshot,
}

/// Validate, request, play, and wait until playback has finished or the
/// user interrupts it.
pub async fn run<C: AudioContext>(
    args: &Args,
    config: &PlayerConfig,
    factory: ContextFactory<C>,
) -> Result<RunSummary, CliError> {
    validate_speech_request(&args.text, args.speed, &args.lang_code, &args.format)?;

    let sink = Arc::new(FileSink::new(&config.output_dir, config.player_command.clone()));
    let player = StreamPlayer::new(factory, sink.clone(), config.player_options())?;
    let request = args.speech_request(config);

    info!(
        "Speaking {} characters with model {}",
        request.input.chars().count(),
        request.model
    );
    let mut report = player.stream_tts(&config.url, &request).await?;
    let outcome = report.wait_playback().await;
    if let Some(outcome) = &outcome {
        info!("Playback: {:?}", outcome);
    }

    wait_until_quiet(&player).await;

    Ok(RunSummary {
        finished_at: Utc::now(),
        mode: format!("{:?}", report.mode),
        chunks: report.chunks,
        total_bytes: report.total_bytes,
        trigger_bytes: report.trigger.map(|t| t.bytes),
        late_bytes: report.late_bytes,
        decoded: outcome.map(|o| o.is_decoded()),
        saved_to: sink.current(),
        metrics: player.metrics().snapshot(),
    })
}

async fn wait_until_quiet<C: AudioContext>(player: &StreamPlayer<C>) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while player.is_sounding() {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                player.stop();
                break;
            }
        }
    }
}
