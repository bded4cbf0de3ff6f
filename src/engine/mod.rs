//! Audio Engine Module
//!
//! Offline rendering core:
//! - Audio buffer management
//! - Timeline scheduling
//! - Mix graph construction
//! - Offline render driver
//! - Clip source import

pub mod buffer;
pub mod graph;
pub mod io;
pub mod render;
pub mod timeline;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use graph::{
    Bus, ChainBuilder, ClipId, ClipState, ClipStates, MixGraph, NoEffects, TrackPeak,
    VolumeAutomation,
};
pub use io::import_audio;
pub use render::{
    OfflineBackend, RenderBackend, RenderOptions, RenderResult, RenderSession, RenderState,
    Renderer,
};
pub use timeline::{measure_to_time, schedule_clip, Placement, PlaybackInstruction};
