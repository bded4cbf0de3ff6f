//! Effect trait definition
//!
//! Base trait for every processing node a track signal can be routed
//! through: effect-chain members and the mastering limiter.

use crate::engine::AudioBuffer;
use crate::error::Result;

/// A processing node operating on a whole render buffer
///
/// Offline renders hand each node the complete track signal once, so
/// implementations see time as sample index / sample rate from the render
/// origin.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()>;

    /// Prepare the effect for the render sample rate
    fn prepare(&mut self, sample_rate: u32);

    /// Clear envelopes, filter history and other running state
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;
}
