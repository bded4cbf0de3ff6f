//! Automated Gain Effect
//!
//! Volume control driven by a `VOLUME-GAIN` automation curve (dB over
//! measures), evaluated per sample relative to the render origin.

use crate::dsp::effect::Effect;
use crate::engine::buffer::db_to_linear;
use crate::engine::timeline::time_to_measure;
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::project::Automation;
use crate::config::SAMPLE_RATE;

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Automated Gain
// ============================================================================

/// Gain effect following an automation curve
///
/// Automation values are clamped to -96..+24 dB; at -96 dB the output is
/// fully muted.
#[derive(Debug, Clone)]
pub struct AutomatedGain {
    automation: Automation,
    tempo: f64,
    origin: f64,
    sample_rate: u32,
}

impl AutomatedGain {
    /// Create a gain stage for a render starting at `origin` seconds
    pub fn new(automation: Automation, tempo: f64, origin: f64) -> Self {
        Self {
            automation,
            tempo,
            origin,
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Linear gain at a render-relative sample index
    fn gain_at(&self, index: usize) -> f32 {
        let seconds = self.origin + index as f64 / self.sample_rate as f64;
        let measure = time_to_measure(self.tempo, seconds);
        match self.automation.value_at(measure) {
            Some(db) if db <= MIN_GAIN_DB => 0.0,
            Some(db) => db_to_linear(db.min(MAX_GAIN_DB)),
            None => 1.0,
        }
    }
}

impl Effect for AutomatedGain {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        if self.automation.is_empty() {
            return Ok(());
        }
        for i in 0..buffer.len() {
            let gain = self.gain_at(i);
            for channel in &mut buffer.samples {
                channel[i] *= gain;
            }
        }
        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "volume"
    }
}

// ============================================================================
// Tests
// ============================================================================
