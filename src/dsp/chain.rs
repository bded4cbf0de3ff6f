//! Effect chains
//!
//! The processing chain an external graph builder hands back for a track.
//! Routing a track into the chain means handing its signal to the first
//! effect; effects run in insertion order.

use super::Effect;
use crate::engine::AudioBuffer;
use crate::error::{MixdownError, Result};

/// Ordered chain of effects for one track
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
    sample_rate: u32,
}

impl EffectChain {
    /// Create a new empty effect chain for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            effects: Vec::new(),
            sample_rate,
        }
    }

    /// Append an effect, preparing it for the chain's sample rate
    pub fn push(&mut self, mut effect: Box<dyn Effect>) {
        effect.prepare(self.sample_rate);
        self.effects.push(effect);
    }

    /// Builder-style [`EffectChain::push`]
    pub fn with(mut self, effect: Box<dyn Effect>) -> Self {
        self.push(effect);
        self
    }

    /// Run the signal through every effect
    ///
    /// Stops at the first failing effect and reports which one it was.
    pub fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        for (position, effect) in self.effects.iter_mut().enumerate() {
            effect.process(buffer).map_err(|e| MixdownError::Render {
                reason: format!(
                    "effect '{}' at chain position {} failed",
                    effect.effect_type(),
                    position
                ),
                source: Some(Box::new(e)),
            })?;
        }
        Ok(())
    }

    /// Get the number of effects in the chain
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect type identifiers in processing order
    pub fn effect_types(&self) -> Vec<&'static str> {
        self.effects.iter().map(|e| e.effect_type()).collect()
    }
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("effects", &self.effect_types())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;

    struct Scale(f32);

    impl Effect for Scale {
        fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
            buffer.apply_gain(self.0);
            Ok(())
        }
        fn prepare(&mut self, _sample_rate: u32) {}
        fn reset(&mut self) {}
        fn effect_type(&self) -> &'static str {
            "scale"
        }
    }

    struct Broken;

    impl Effect for Broken {
        fn process(&mut self, _buffer: &mut AudioBuffer) -> Result<()> {
            Err(MixdownError::render("filter blew up"))
        }
        fn prepare(&mut self, _sample_rate: u32) {}
        fn reset(&mut self) {}
        fn effect_type(&self) -> &'static str {
            "broken"
        }
    }

    fn ones() -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![1.0; 4], vec![1.0; 4]], 44100).unwrap()
    }

    #[test]
    fn test_chain_new() {
        let chain = EffectChain::new(44100);
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut chain = EffectChain::new(44100)
            .with(Box::new(Scale(0.5)))
            .with(Box::new(Scale(0.5)));
        let mut buffer = ones();
        chain.process(&mut buffer).unwrap();
        assert_eq!(buffer.channel(0), &[0.25; 4]);
        assert_eq!(chain.effect_types(), vec!["scale", "scale"]);
    }

    #[test]
    fn test_chain_reports_failing_effect() {
        let mut chain = EffectChain::new(44100)
            .with(Box::new(Scale(0.5)))
            .with(Box::new(Broken));
        let mut buffer = AudioBuffer::new(4, ChannelLayout::Stereo);
        let err = chain.process(&mut buffer).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("position 1"));
    }
}
