//! MP3 encoding
//!
//! Stereo float channels are converted to 16-bit PCM and fed to the codec in
//! fixed-size blocks; whatever the codec still buffers is flushed at the end.

use std::mem::MaybeUninit;

use mp3lame_encoder::{Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Quality};
use tracing::{debug, instrument};

use super::float_to_i16;
use crate::config::Mp3Config;
use crate::engine::buffer::AudioBuffer;
use crate::error::{MixdownError, Result};

/// Room reserved for the final flush (LAME needs at most 7200 bytes)
const FLUSH_RESERVE: usize = 7200;

/// Block-oriented stereo MP3 codec
pub trait Mp3Codec {
    /// Encode one block of left/right PCM; may return no bytes while the codec buffers
    fn encode_block(&mut self, left: &[i16], right: &[i16]) -> Result<Vec<u8>>;

    /// Emit any buffered frames
    fn flush(&mut self) -> Result<Vec<u8>>;
}

/// LAME-backed constant bitrate codec
pub struct LameCodec {
    encoder: Encoder,
}

impl LameCodec {
    pub fn new(sample_rate: u32, config: &Mp3Config) -> Result<Self> {
        let mut builder =
            Builder::new().ok_or_else(|| MixdownError::encode("LAME encoder init failed"))?;

        builder
            .set_num_channels(2)
            .map_err(|e| MixdownError::encode(format!("LAME set channels failed: {:?}", e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| MixdownError::encode(format!("LAME set sample rate failed: {:?}", e)))?;
        builder
            .set_brate(lame_bitrate(config.bitrate_kbps))
            .map_err(|e| MixdownError::encode(format!("LAME set bitrate failed: {:?}", e)))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| MixdownError::encode(format!("LAME set quality failed: {:?}", e)))?;

        let encoder = builder
            .build()
            .map_err(|e| MixdownError::encode(format!("LAME build failed: {:?}", e)))?;

        Ok(Self { encoder })
    }
}

impl Mp3Codec for LameCodec {
    fn encode_block(&mut self, left: &[i16], right: &[i16]) -> Result<Vec<u8>> {
        let input = DualPcm { left, right };
        let encoder = &mut self.encoder;
        write_spare(
            mp3lame_encoder::max_required_buffer_size(left.len()),
            |spare| {
                encoder
                    .encode(input, spare)
                    .map_err(|e| MixdownError::encode(format!("LAME encode failed: {:?}", e)))
            },
        )
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        let encoder = &mut self.encoder;
        write_spare(FLUSH_RESERVE, |spare| {
            encoder
                .flush::<FlushNoGap>(spare)
                .map_err(|e| MixdownError::encode(format!("LAME flush failed: {:?}", e)))
        })
    }
}

/// Let LAME fill a fresh buffer of `capacity` bytes and keep what it wrote
///
/// The encoder only exposes an uninitialized-slice API.
fn write_spare<F>(capacity: usize, fill: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut [MaybeUninit<u8>]) -> Result<usize>,
{
    let mut out = Vec::with_capacity(capacity);
    let written = fill(out.spare_capacity_mut())?;
    if written > out.capacity() {
        return Err(MixdownError::encode(format!(
            "LAME reported {} bytes for a {} byte buffer",
            written,
            out.capacity()
        )));
    }
    // SAFETY: the encoder initialized the first `written` bytes of spare
    // capacity, and `written` is within capacity
    unsafe {
        out.set_len(written);
    }
    Ok(out)
}

/// Map a kbps value onto the nearest LAME bitrate at or below it
fn lame_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=111 => Bitrate::Kbps96,
        112..=127 => Bitrate::Kbps112,
        128..=159 => Bitrate::Kbps128,
        160..=191 => Bitrate::Kbps160,
        192..=223 => Bitrate::Kbps192,
        224..=255 => Bitrate::Kbps224,
        256..=319 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Convert a float channel to 16-bit PCM
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| float_to_i16(s)).collect()
}

/// Run the block loop over a stereo PCM pair and concatenate codec output
pub fn encode_blocks<C: Mp3Codec + ?Sized>(
    codec: &mut C,
    left: &[i16],
    right: &[i16],
    block_size: usize,
) -> Result<Vec<u8>> {
    if left.len() != right.len() {
        return Err(MixdownError::encode(format!(
            "channel length mismatch: left {} vs right {}",
            left.len(),
            right.len()
        )));
    }
    if block_size == 0 {
        return Err(MixdownError::encode("block size must be positive"));
    }

    let mut stream = Vec::new();
    for (l, r) in left.chunks(block_size).zip(right.chunks(block_size)) {
        let chunk = codec.encode_block(l, r)?;
        if !chunk.is_empty() {
            stream.extend_from_slice(&chunk);
        }
    }

    let tail = codec.flush()?;
    if !tail.is_empty() {
        stream.extend_from_slice(&tail);
    }
    Ok(stream)
}

/// Encode a rendered stereo buffer with LAME
///
/// # Errors
/// * `Encode` - If the buffer is not stereo or the codec fails
#[instrument(skip(buffer, config), fields(frames = buffer.len(), kbps = config.bitrate_kbps))]
pub fn encode_buffer(buffer: &AudioBuffer, config: &Mp3Config) -> Result<Vec<u8>> {
    if buffer.channels() != 2 {
        return Err(MixdownError::encode(format!(
            "MP3 export expects 2 channels, got {}",
            buffer.channels()
        )));
    }

    let mut codec = LameCodec::new(buffer.sample_rate, config)?;
    encode_buffer_with(&mut codec, buffer, config.block_size)
}

/// Encode a stereo buffer with an arbitrary codec
pub fn encode_buffer_with<C: Mp3Codec + ?Sized>(
    codec: &mut C,
    buffer: &AudioBuffer,
    block_size: usize,
) -> Result<Vec<u8>> {
    let left = float_to_pcm16(buffer.channel(0));
    let right = float_to_pcm16(buffer.channel_for_output(1));
    let bytes = encode_blocks(codec, &left, &right, block_size)?;
    debug!(bytes = bytes.len(), "Encoded MP3");
    Ok(bytes)
}
