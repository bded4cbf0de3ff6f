//! Mixdown - Offline Project Renderer
//!
//! Renders a compiled multi-track music project into distributable audio:
//! 1. Timeline scheduling of measure-positioned clips
//! 2. Per-track mix graph with optional effect chains and a mastering limiter
//! 3. Offline render pass at 44.1 kHz stereo
//! 4. WAV / MP3 encoding and per-track ZIP export
//!
//! # Pipeline
//!
//! ```text
//! Script -> Compiler -> Project -> MixGraph -> Renderer -> AudioBuffer -> Encoder -> Artifact
//! ```
//!
//! The multi-track exporter runs the whole pipeline once per audible track
//! on isolated copies of the project and packages the results.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod encode;
pub mod engine;
pub mod error;
pub mod export;
pub mod logging;
pub mod project;

pub use encode::{ArtifactKind, EncodedArtifact};
pub use engine::{AudioBuffer, RenderOptions, RenderResult, Renderer};
pub use error::{ErrorKind, MixdownError, Result};
pub use export::{Compiler, Exporter, Script};
pub use project::{Clip, Project, Track, TrackRole};
