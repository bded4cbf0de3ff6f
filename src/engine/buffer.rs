//! Audio Buffer Management
//!
//! Planar 32-bit float buffers used for decoded clip sources, per-track
//! mixing scratch space and the final render result.

use crate::config::SAMPLE_RATE;
use crate::error::{MixdownError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Core audio buffer type
///
/// Stores audio as non-interleaved 32-bit floating point samples.
/// Each channel is a separate Vec<f32>.
///
/// # Example
/// ```
/// use mixdown::engine::buffer::{AudioBuffer, ChannelLayout};
///
/// // Create a 1-second stereo buffer at 44.1kHz
/// let buffer = AudioBuffer::new(44100, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz (default: 44100)
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new zeroed audio buffer at the render sample rate
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        let num_channels = layout.num_channels();
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Build a buffer from planar channel data
    ///
    /// Fails if there are no channels or the channels differ in length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(MixdownError::InvalidAudio {
                reason: "buffer has no channels".to_string(),
                source: None,
            });
        };
        let len = first.len();
        if let Some(bad) = samples.iter().position(|ch| ch.len() != len) {
            return Err(MixdownError::InvalidAudio {
                reason: format!(
                    "channel {} has {} samples, expected {}",
                    bad,
                    samples[bad].len(),
                    len
                ),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Read a source channel for a destination channel index
    ///
    /// Mono sources feed every destination channel (speaker up-mix).
    #[inline]
    pub fn channel_for_output(&self, output_channel: usize) -> &[f32] {
        let last = self.channels().saturating_sub(1);
        &self.samples[output_channel.min(last)]
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Sum another buffer into this one
    ///
    /// Channels and samples beyond this buffer's extent are dropped.
    pub fn mix_from(&mut self, other: &AudioBuffer) {
        for (ch, dest) in self.samples.iter_mut().enumerate() {
            let src = other.channel_for_output(ch);
            for (d, s) in dest.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
    }

    /// Zero every sample, keeping the allocation
    pub fn clear(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// Absolute peak across all channels (linear)
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }
}

// ============================================================================
// Tests
// ============================================================================
