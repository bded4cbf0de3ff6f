//! WAV encoding for 16-bit PCM.
//!
//! Output is a canonical 44-byte RIFF header followed by interleaved
//! little-endian samples, written through `hound`.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use super::float_to_i16;
use crate::engine::buffer::AudioBuffer;
use crate::error::{MixdownError, Result};

const BITS_PER_SAMPLE: u16 = 16;

/// RIFF header bytes counted by `ChunkSize` besides the data payload
const RIFF_HEADER_OVERHEAD: u32 = 36;

/// Interleave a stereo pair into `L0,R0,L1,R1,...`
pub fn interleave(left: &[f32], right: &[f32]) -> Result<Vec<f32>> {
    if left.len() != right.len() {
        return Err(MixdownError::encode(format!(
            "channel length mismatch: left {} vs right {}",
            left.len(),
            right.len()
        )));
    }

    let mut out = Vec::with_capacity(left.len() * 2);
    for (&l, &r) in left.iter().zip(right) {
        out.push(l);
        out.push(r);
    }
    Ok(out)
}

/// `Subchunk2Size` for `sample_count` interleaved 16-bit samples
///
/// # Errors
/// * `Encode` - If the payload does not fit a RIFF size field
pub fn data_chunk_size(sample_count: usize) -> Result<u32> {
    u32::try_from(sample_count)
        .ok()
        .and_then(|n| n.checked_mul(u32::from(BITS_PER_SAMPLE / 8)))
        .filter(|size| size.checked_add(RIFF_HEADER_OVERHEAD).is_some())
        .ok_or_else(|| {
            MixdownError::encode(format!(
                "{} samples exceed the 4 GiB WAV size limit",
                sample_count
            ))
        })
}

/// Encode interleaved float samples as a 16-bit PCM WAV stream
///
/// # Errors
/// * `Encode` - If the stream would overflow the RIFF size fields or the
///   writer rejects the format
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let data_size = data_chunk_size(samples.len())?;

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| MixdownError::encode(format!("WAV write failed: {}", e));

    let mut cursor = Cursor::new(Vec::with_capacity(44 + data_size as usize));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
        for &sample in samples {
            writer.write_sample(float_to_i16(sample)).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

/// Encode a rendered stereo buffer
///
/// # Errors
/// * `Encode` - If the buffer is not 2-channel or its channels differ in length
pub fn encode_buffer(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    if buffer.channels() != 2 {
        return Err(MixdownError::encode(format!(
            "WAV export expects 2 channels, got {}",
            buffer.channels()
        )));
    }

    let interleaved = interleave(buffer.channel(0), buffer.channel(1))?;
    let bytes = encode_wav(&interleaved, buffer.sample_rate, 2)?;
    debug!(frames = buffer.len(), bytes = bytes.len(), "Encoded WAV");
    Ok(bytes)
}
