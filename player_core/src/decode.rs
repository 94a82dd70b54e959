//! Whole-buffer audio decoding.
//!
//! Playback decodes everything accumulated so far in one call; there is no
//! progressive decoder. WAV input that stops in the middle of its data
//! chunk is accepted as-is, since the trigger fires long before a streamed
//! file is complete.

use std::io::Cursor;
use std::time::Duration;

use crate::error::DecodeError;
use crate::format::AudioFormat;

/// Decoded, interleaved samples normalised to [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

pub fn decode_audio(bytes: &[u8], format: &AudioFormat) -> Result<AudioBuffer, DecodeError> {
    match format {
        AudioFormat::Wav => decode_wav(bytes),
        AudioFormat::Pcm {
            sample_rate,
            channels,
            bits_per_sample,
        } => decode_pcm(bytes, *sample_rate, *channels, *bits_per_sample),
        AudioFormat::Other(mime) => Err(DecodeError::Unsupported(mime.clone())),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let mut samples = match spec.sample_format {
        hound::SampleFormat::Float => collect_samples(reader.into_samples::<f32>(), |s| s)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            collect_samples(reader.into_samples::<i32>(), |s| s as f32 * scale)?
        }
    };

    let channels = spec.channels.max(1);
    samples.truncate(samples.len() - samples.len() % channels as usize);
    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(AudioBuffer {
        samples,
        sample_rate: spec.sample_rate,
        channels,
    })
}

fn collect_samples<S, I, F>(iter: I, convert: F) -> Result<Vec<f32>, DecodeError>
where
    I: Iterator<Item = hound::Result<S>>,
    F: Fn(S) -> f32,
{
    let mut out = Vec::new();
    for sample in iter {
        match sample {
            Ok(s) => out.push(convert(s)),
            // The header already parsed, so a failed read means the data
            // chunk ends early. hound reports that as a short read, not EOF.
            Err(hound::Error::IoError(e)) => {
                tracing::debug!("WAV data truncated after {} samples: {}", out.len(), e);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

fn decode_pcm(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Result<AudioBuffer, DecodeError> {
    if bits_per_sample != 16 {
        return Err(DecodeError::Unsupported(format!(
            "{}-bit PCM",
            bits_per_sample
        )));
    }

    let channels = channels.max(1);
    let mut samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    samples.truncate(samples.len() - samples.len() % channels as usize);

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}
