use reqwest::header::{HeaderMap, CONTENT_TYPE};

/// Sample rate assumed for raw PCM when the server omits `X-Sample-Rate`.
pub const DEFAULT_PCM_SAMPLE_RATE: u32 = 24_000;

/// Payload format of a TTS response, derived from its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Pcm {
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    },
    Other(String),
}

impl Default for AudioFormat {
    fn default() -> Self {
        AudioFormat::Wav
    }
}

impl AudioFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mime = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();

        match mime.as_str() {
            // Servers that stream WAV segments often don't label them at all.
            "" | "audio/wav" | "audio/wave" | "audio/x-wav" | "application/octet-stream" => {
                AudioFormat::Wav
            }
            "audio/pcm" | "audio/l16" => AudioFormat::Pcm {
                sample_rate: header_number(headers, "x-sample-rate")
                    .unwrap_or(DEFAULT_PCM_SAMPLE_RATE),
                channels: header_number(headers, "x-channels").unwrap_or(1),
                bits_per_sample: header_number(headers, "x-bit-depth").unwrap_or(16),
            },
            other => AudioFormat::Other(other.to_string()),
        }
    }

    /// MIME type of the blob handed to a media sink. Raw PCM is wrapped
    /// in a WAV container before it reaches the sink.
    pub fn blob_mime(&self) -> &str {
        match self {
            AudioFormat::Wav | AudioFormat::Pcm { .. } => "audio/wav",
            AudioFormat::Other(mime) => mime,
        }
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
