use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::context::{AudioContext, ContextState, PlaybackHandle};
use crate::decode::AudioBuffer;
use crate::error::PlayerError;

/// Plays through the system's default output device.
///
/// The cpal stream never leaves the thread that built it. Each playback
/// gets its own audio thread, started from the blocking pool, and the
/// handle only holds a stop channel.
#[derive(Debug)]
pub struct DeviceContext {
    device_name: String,
    sample_rate: u32,
    channels: u16,
    suspended: AtomicBool,
}

impl DeviceContext {
    pub fn new() -> Result<Self, PlayerError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::Device("No output device available".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|e| PlayerError::Device(format!("Failed to get default output config: {e}")))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        tracing::info!(
            "Audio output: {} ({}Hz, {} channels)",
            device_name,
            config.sample_rate().0,
            config.channels()
        );
        Ok(Self {
            device_name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            suspended: AtomicBool::new(false),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioContext for DeviceContext {
    fn state(&self) -> ContextState {
        if self.suspended.load(Ordering::SeqCst) {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self, audio: AudioBuffer) -> Result<Box<dyn PlaybackHandle>, PlayerError> {
        if self.state() == ContextState::Suspended {
            return Err(PlayerError::Context("audio context is suspended".to_string()));
        }
        let (rate, channels) = (self.sample_rate, self.channels);
        let handle = tokio::task::spawn_blocking(move || {
            let samples = prepare(&audio, rate, channels)?;
            DevicePlayback::spawn(samples, rate, channels)
        })
        .await
        .map_err(|e| PlayerError::Device(format!("Audio start task failed: {e}")))??;
        Ok(Box::new(handle))
    }
}

/// Resample to the device rate and map to the device channel layout.
fn prepare(audio: &AudioBuffer, device_rate: u32, device_channels: u16) -> Result<Vec<f32>, PlayerError> {
    let src_channels = audio.channels.max(1) as usize;
    let mut planes: Vec<Vec<f32>> = (0..src_channels)
        .map(|c| audio.samples.iter().skip(c).step_by(src_channels).copied().collect())
        .collect();

    if audio.sample_rate != device_rate && audio.frames() > 0 {
        planes = resample(&planes, audio.sample_rate, device_rate)?;
    }

    let frames = planes.first().map(Vec::len).unwrap_or(0);
    let out_channels = device_channels.max(1) as usize;
    let mut out = Vec::with_capacity(frames * out_channels);
    for i in 0..frames {
        for c in 0..out_channels {
            let sample = if src_channels == 1 {
                planes[0][i]
            } else if c < src_channels {
                planes[c][i]
            } else {
                0.0
            };
            out.push(sample);
        }
    }
    Ok(out)
}

fn resample(planes: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>, PlayerError> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let frames = planes.first().map(Vec::len).unwrap_or(0);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, planes.len())
        .map_err(|e| PlayerError::Device(format!("Failed to create resampler: {e}")))?;

    resampler
        .process(planes, None)
        .map_err(|e| PlayerError::Device(format!("Resampling failed: {e}")))
}

/// A playback running on its own audio thread. Stopping signals the
/// thread and returns; the thread tears the stream down on its own.
pub struct DevicePlayback {
    stop_tx: Option<mpsc::Sender<()>>,
    finished: Arc<AtomicBool>,
}

impl DevicePlayback {
    /// Blocks until the stream is playing or has failed to start.
    fn spawn(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, PlayerError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let thread = thread::Builder::new()
            .name("tts-audio".to_string())
            .spawn(move || run_output(samples, sample_rate, channels, flag, stop_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop_tx: Some(stop_tx),
                finished,
            }),
            Ok(Err(msg)) => {
                let _ = thread.join();
                Err(PlayerError::Device(msg))
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlayerError::Device("audio thread exited during start-up".to_string()))
            }
        }
    }
}

impl PlaybackHandle for DevicePlayback {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for DevicePlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_output(
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    finished: Arc<AtomicBool>,
    stop_rx: mpsc::Receiver<()>,
    ready_tx: mpsc::Sender<Result<(), String>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready_tx.send(Err("No output device available".to_string()));
        return;
    };
    let sample_format = match device.default_output_config() {
        Ok(config) => config.sample_format(),
        Err(e) => {
            let _ = ready_tx.send(Err(format!("Failed to get default output config: {e}")));
            return;
        }
    };

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let samples = Arc::new(samples);
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, Arc::clone(&finished)),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, Arc::clone(&finished)),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, Arc::clone(&finished)),
        other => {
            let _ = ready_tx.send(Err(format!("Unsupported output sample format: {other:?}")));
            return;
        }
    };
    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("Failed to build output stream: {e}")));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("Failed to start output stream: {e}")));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    loop {
        match stop_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if finished.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    drop(stream);
    finished.store(true, Ordering::SeqCst);
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut pos = 0usize;
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for out in data.iter_mut() {
                let sample = samples.get(pos).copied().unwrap_or(0.0);
                *out = T::from_sample(sample);
                pos += 1;
            }
            if pos >= samples.len() {
                finished.store(true, Ordering::SeqCst);
            }
        },
        |err| {
            tracing::error!("Audio output error: {}", err);
        },
        None,
    )
}
