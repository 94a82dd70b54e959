use std::io::Cursor;

fn spec16(sample_rate: u32, channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode f32 samples as a 16-bit PCM WAV (RIFF) file in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec16(sample_rate, channels))?;
        for &s in samples {
            // Convert f32 [-1.0,1.0] to i16
            let clamped = s.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Put a WAV header in front of raw 16-bit little-endian PCM so media
/// players can open it. A dangling odd byte is dropped.
pub fn wrap_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec16(sample_rate, channels))?;
        for pair in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
