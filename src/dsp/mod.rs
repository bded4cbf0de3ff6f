//! Processing nodes
//!
//! Effects a track signal can be routed through. The effect DSP of a
//! project's tracks is supplied by a chain builder; this module carries
//! the chain container, the master-bus limiter and the volume automation
//! stage used by the built-in builder.

mod chain;
mod effect;
mod gain;
mod limiter;

pub use chain::EffectChain;
pub use effect::Effect;
pub use gain::AutomatedGain;
pub use limiter::Limiter;
