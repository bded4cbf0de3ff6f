//! Audio file import
//!
//! Decodes WAV clip sources into planar float buffers at the render
//! sample rate. Sample rate conversion uses linear interpolation.

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::config::SAMPLE_RATE;
use crate::engine::buffer::AudioBuffer;
use crate::error::{MixdownError, Result};

/// Import a WAV file and convert it to the render format
///
/// # Errors
/// * `InvalidAudio` - If the file is missing, unreadable, empty, or has more
///   than 2 channels
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(MixdownError::InvalidAudio {
            reason: format!("file not found: {}", path.display()),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| MixdownError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(MixdownError::InvalidAudio {
            reason: format!(
                "{}: {}-channel audio (only mono/stereo supported)",
                path.display(),
                channels
            ),
            source: None,
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.is_empty() {
        return Err(MixdownError::InvalidAudio {
            reason: format!("{} contains no samples", path.display()),
            source: None,
        });
    }

    let channel_data = deinterleave(&samples, channels);
    let channel_data = if spec.sample_rate != SAMPLE_RATE {
        resample_channels(&channel_data, spec.sample_rate, SAMPLE_RATE)
    } else {
        channel_data
    };

    AudioBuffer::from_channels(channel_data, SAMPLE_RATE)
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |e: hound::Error| MixdownError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, bits) => Err(MixdownError::InvalidAudio {
            reason: format!("{}-bit integer audio is not supported", bits),
            source: None,
        }),
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            result[ch].push(sample);
        }
    }

    result
}

/// Resample audio channels to a different sample rate
fn resample_channels(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;

    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let value = if ch == 0 { 16384 } else { -8192 };
                writer.write_sample((value + i as i32 % 2) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_import_stereo_at_render_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 44100, 4410);

        let buffer = import_audio(&path).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 4410);
        assert_eq!(buffer.sample_rate, 44100);
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-3);
        assert!((buffer.channel(1)[0] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_import_resamples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono48k.wav");
        write_wav(&path, 1, 48000, 4800);

        let buffer = import_audio(&path).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.sample_rate, 44100);
        assert_eq!(buffer.len(), 4410);
    }

    #[test]
    fn test_import_missing_file() {
        let err = import_audio(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_import_rejects_surround() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quad.wav");
        write_wav(&path, 4, 44100, 10);
        assert!(import_audio(&path).is_err());
    }

    #[test]
    fn test_resample_linear_length() {
        let samples = vec![0.0_f32, 1.0, 0.0, -1.0];
        let up = resample_linear(&samples, 2.0);
        assert_eq!(up.len(), 8);
        assert!((up[1] - 0.5).abs() < 1e-6);
    }
}
