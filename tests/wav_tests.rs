//! WAV Encoder Tests
//!
//! Byte-level checks of the RIFF writer, cross-checked with hound.

use std::io::Cursor;

use hound::WavReader;
use pretty_assertions::assert_eq;
use test_case::test_case;

use mixdown::encode::wav::{encode_buffer, encode_wav, interleave};
use mixdown::engine::buffer::AudioBuffer;

fn header_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn expected_pcm(s: f32) -> i16 {
    let c = s.clamp(-1.0, 1.0);
    let scale = if c < 0.0 { 32768.0 } else { 32767.0 };
    (c * scale).round() as i16
}

/// Deterministic test signal that overshoots both rails
fn signal(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| ((i as f32 * 0.37).sin() * 1.3) + if i % 7 == 0 { -0.2 } else { 0.0 })
        .collect()
}

#[test_case(0 ; "empty")]
#[test_case(2 ; "one frame")]
#[test_case(1152 ; "one mp3 block")]
#[test_case(44100 ; "half second")]
fn test_header_sizes(n: usize) {
    let bytes = encode_wav(&signal(n), 44100, 2).unwrap();

    assert_eq!(header_u32(&bytes, 4), 36 + 2 * n as u32);
    assert_eq!(header_u32(&bytes, 40), 2 * n as u32);
    assert_eq!(bytes.len(), 44 + 2 * n);
}

#[test]
fn test_hound_decodes_expected_samples() {
    let samples = signal(2 * 3000);
    let bytes = encode_wav(&samples, 44100, 2).unwrap();

    let reader = WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration(), 3000);

    let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    let expected: Vec<i16> = samples.iter().map(|&s| expected_pcm(s)).collect();
    assert_eq!(decoded, expected);
}

#[test]
fn test_encoding_is_idempotent() {
    let samples = signal(4096);
    assert_eq!(
        encode_wav(&samples, 44100, 2).unwrap(),
        encode_wav(&samples, 44100, 2).unwrap()
    );
}

#[test]
fn test_stereo_buffer_interleaves_left_first() {
    let left = vec![0.25_f32, 0.5, 0.75];
    let right = vec![-0.25_f32, -0.5, -0.75];
    let buffer = AudioBuffer::from_channels(vec![left.clone(), right.clone()], 44100).unwrap();

    let from_buffer = encode_buffer(&buffer).unwrap();
    let from_pair = encode_wav(&interleave(&left, &right).unwrap(), 44100, 2).unwrap();
    assert_eq!(from_buffer, from_pair);

    let decoded: Vec<i16> = WavReader::new(Cursor::new(from_buffer))
        .unwrap()
        .into_samples::<i16>()
        .map(|s| s.unwrap())
        .collect();
    assert_eq!(decoded, vec![8192, -8192, 16384, -16384, 24575, -24576]);
}
