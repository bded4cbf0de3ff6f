//! Limiter Effect
//!
//! Feed-forward dynamics limiter used on the master bus. With the
//! mastering settings (hard knee, 10000:1, instant attack) it behaves as a
//! brickwall at -1 dBFS with a 100ms recovery.

use crate::dsp::effect::Effect;
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::config::SAMPLE_RATE;

// ============================================================================
// Constants
// ============================================================================

/// Mastering threshold in dBFS
pub const MASTER_THRESHOLD_DB: f32 = -1.0;
/// Mastering knee width in dB (hard knee)
pub const MASTER_KNEE_DB: f32 = 0.0;
/// Mastering compression ratio
pub const MASTER_RATIO: f32 = 10000.0;
/// Mastering attack time in seconds
pub const MASTER_ATTACK_SECS: f32 = 0.0;
/// Mastering release time in seconds
pub const MASTER_RELEASE_SECS: f32 = 0.1;

/// Calculate envelope coefficient from a time constant
///
/// A zero time constant yields an instantaneous envelope.
#[inline]
fn time_to_coeff(time_secs: f32, sample_rate: f32) -> f32 {
    if time_secs <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_secs * sample_rate)).exp()
    }
}

// ============================================================================
// Limiter Effect
// ============================================================================

/// Dynamics limiter
///
/// # Example
/// ```
/// use mixdown::dsp::{Effect, Limiter};
///
/// let mut limiter = Limiter::mastering();
/// limiter.prepare(44100);
/// assert_eq!(limiter.threshold_db(), -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack_secs: f32,
    release_secs: f32,
    sample_rate: f32,
    envelope_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(
        threshold_db: f32,
        knee_db: f32,
        ratio: f32,
        attack_secs: f32,
        release_secs: f32,
    ) -> Self {
        let mut limiter = Self {
            threshold_db,
            knee_db: knee_db.max(0.0),
            ratio: ratio.max(1.0),
            attack_secs: attack_secs.max(0.0),
            release_secs: release_secs.max(0.0),
            sample_rate: SAMPLE_RATE as f32,
            envelope_db: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        };
        limiter.update_coefficients();
        limiter
    }

    /// The fixed master-bus settings
    pub fn mastering() -> Self {
        Self::new(
            MASTER_THRESHOLD_DB,
            MASTER_KNEE_DB,
            MASTER_RATIO,
            MASTER_ATTACK_SECS,
            MASTER_RELEASE_SECS,
        )
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn knee_db(&self) -> f32 {
        self.knee_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn attack_secs(&self) -> f32 {
        self.attack_secs
    }

    pub fn release_secs(&self) -> f32 {
        self.release_secs
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(self.attack_secs, self.sample_rate);
        self.release_coeff = time_to_coeff(self.release_secs, self.sample_rate);
    }

    /// Static gain reduction (dB, positive) for an input level
    fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let slope = 1.0 - 1.0 / self.ratio;

        if self.knee_db <= 0.0 {
            return if over > 0.0 { over * slope } else { 0.0 };
        }

        if 2.0 * over < -self.knee_db {
            0.0
        } else if 2.0 * over.abs() <= self.knee_db {
            let x = over + self.knee_db / 2.0;
            slope * x * x / (2.0 * self.knee_db)
        } else {
            over * slope
        }
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::mastering()
    }
}

impl Effect for Limiter {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let num_channels = buffer.channels();
        let num_samples = buffer.len();

        for i in 0..num_samples {
            // Linked detection across channels
            let mut peak = 0.0_f32;
            for ch in 0..num_channels {
                peak = peak.max(buffer.samples[ch][i].abs());
            }

            let target = self.gain_reduction_db(linear_to_db(peak));
            let coeff = if target > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target;

            let gain = db_to_linear(-self.envelope_db);
            for ch in 0..num_channels {
                buffer.samples[ch][i] *= gain;
            }
        }
        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "limiter"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;

    /// Helper to create a test buffer with known values
    fn create_test_buffer(value: f32, num_samples: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Stereo);
        for ch in 0..buffer.channels() {
            buffer.channel_mut(ch).fill(value);
        }
        buffer
    }

    #[test]
    fn test_mastering_settings() {
        let limiter = Limiter::mastering();
        assert_eq!(limiter.threshold_db(), -1.0);
        assert_eq!(limiter.knee_db(), 0.0);
        assert_eq!(limiter.ratio(), 10000.0);
        assert_eq!(limiter.attack_secs(), 0.0);
        assert!((limiter.release_secs() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_limiter_process_below_threshold() {
        let mut limiter = Limiter::mastering();
        limiter.prepare(44100);

        let level = db_to_linear(-6.0);
        let mut buffer = create_test_buffer(level, 1000);
        limiter.process(&mut buffer).unwrap();

        // Signal below threshold should pass through unchanged
        let processed = buffer.channel(0)[500];
        assert!((processed - level).abs() < 1e-6);
    }

    #[test]
    fn test_limiter_holds_threshold() {
        let mut limiter = Limiter::mastering();
        limiter.prepare(44100);

        let mut buffer = create_test_buffer(2.0, 1000);
        limiter.process(&mut buffer).unwrap();

        // Instant attack: even the first sample is caught
        let ceiling = db_to_linear(-1.0);
        for ch in 0..buffer.channels() {
            for &sample in buffer.channel(ch) {
                assert!(
                    sample.abs() <= ceiling + 1e-3,
                    "sample {} exceeds ceiling {}",
                    sample,
                    ceiling
                );
            }
        }
    }

    #[test]
    fn test_limiter_releases_gradually() {
        let mut limiter = Limiter::mastering();
        limiter.prepare(44100);

        let mut buffer = create_test_buffer(0.5, 2000);
        for ch in 0..2 {
            buffer.channel_mut(ch)[0] = 4.0;
        }
        limiter.process(&mut buffer).unwrap();

        // Right after the spike the quiet signal is still held down, then recovers
        let just_after = buffer.channel(0)[1];
        let later = buffer.channel(0)[1999];
        assert!(just_after < 0.5);
        assert!(later > just_after);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let limiter = Limiter::new(-10.0, 6.0, 4.0, 0.0, 0.1);
        let below = limiter.gain_reduction_db(-13.0 - 1e-3);
        let edge = limiter.gain_reduction_db(-13.0);
        assert!((below - edge).abs() < 1e-3);
        assert!(limiter.gain_reduction_db(0.0) > 0.0);
    }

    #[test]
    fn test_limiter_reset() {
        let mut limiter = Limiter::mastering();
        let mut buffer = create_test_buffer(3.0, 10);
        limiter.process(&mut buffer).unwrap();
        assert!(limiter.envelope_db > 0.0);
        limiter.reset();
        assert_eq!(limiter.envelope_db, 0.0);
    }
}
