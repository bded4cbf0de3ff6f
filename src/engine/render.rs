//! Offline rendering
//!
//! Drives one non-realtime render pass per request:
//!
//! ```text
//! Idle -> GraphBuilt -> Rendering -> Complete
//!                                 \-> Failed
//! ```
//!
//! Entering `Rendering` is the single suspension point: the graph is moved
//! onto a blocking task and the caller awaits its result. Every pass owns
//! its own graph and output buffer, so concurrent renders share nothing
//! but read-only clip audio.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::RenderConfig;
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::graph::{play_source, ChainBuilder, MixGraph, NoEffects, TrackPeak};
use crate::engine::timeline::{measure_to_time, Placement, PlaybackInstruction};
use crate::error::{MixdownError, Result};
use crate::project::{Clip, Project};

// ============================================================================
// State machine
// ============================================================================

/// Lifecycle of a render session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    GraphBuilt,
    Rendering,
    Complete,
    Failed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => write!(f, "Idle"),
            RenderState::GraphBuilt => write!(f, "GraphBuilt"),
            RenderState::Rendering => write!(f, "Rendering"),
            RenderState::Complete => write!(f, "Complete"),
            RenderState::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-request render parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOptions {
    /// Timeline position (seconds) the render begins from
    pub origin: f64,
}

impl RenderOptions {
    pub fn from_origin(origin: f64) -> Self {
        Self { origin }
    }
}

/// Raw multichannel output of one render pass
///
/// Produced once per pass and consumed by value by an encoder.
#[derive(Debug)]
pub struct RenderResult {
    buffer: AudioBuffer,
    track_peaks: Vec<TrackPeak>,
    pass_id: Uuid,
}

impl RenderResult {
    pub fn new(buffer: AudioBuffer, track_peaks: Vec<TrackPeak>, pass_id: Uuid) -> Self {
        Self {
            buffer,
            track_peaks,
            pass_id,
        }
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> AudioBuffer {
        self.buffer
    }

    /// Peak levels seen by the analysers of directly-routed tracks
    pub fn track_peaks(&self) -> &[TrackPeak] {
        &self.track_peaks
    }

    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Executes a built graph
///
/// Runs on a blocking thread; implementations may take as long as they
/// need. There is no cancellation.
pub trait RenderBackend: Send + Sync {
    fn render(&self, graph: MixGraph, frames: usize) -> Result<(AudioBuffer, Vec<TrackPeak>)>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// In-process pull renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl RenderBackend for OfflineBackend {
    fn render(&self, graph: MixGraph, frames: usize) -> Result<(AudioBuffer, Vec<TrackPeak>)> {
        graph.render(frames)
    }

    fn name(&self) -> &str {
        "offline"
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Shared render configuration: settings, chain builder and backend
///
/// Cheap to clone; each clone starts independent sessions.
#[derive(Clone)]
pub struct Renderer {
    config: RenderConfig,
    builder: Arc<dyn ChainBuilder>,
    backend: Arc<dyn RenderBackend>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            builder: Arc::new(NoEffects),
            backend: Arc::new(OfflineBackend),
        }
    }

    pub fn with_chain_builder(mut self, builder: Arc<dyn ChainBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Start a new session in the `Idle` state
    pub fn session(&self) -> RenderSession {
        RenderSession {
            renderer: self.clone(),
            state: RenderState::Idle,
            pending: None,
            pass_id: Uuid::new_v4(),
        }
    }

    /// Build and render a project in one call
    pub async fn render(&self, project: &Project, options: RenderOptions) -> Result<RenderResult> {
        let mut session = self.session();
        session.build_graph(project, options)?;
        session.start_rendering().await
    }

    /// Mix a set of clips onto one timeline without tracks, effects or limiter
    ///
    /// Each clip plays its `start..end` span beginning at its measure;
    /// clips with `end < start` are skipped.
    #[instrument(skip(self, clips), fields(count = clips.len()))]
    pub async fn merge_clips(&self, clips: &[Clip], tempo: f64) -> Result<AudioBuffer> {
        debug!("Merging clips");
        let length = clips
            .iter()
            .map(|clip| clip.measure + (clip.end - clip.start))
            .fold(0.0_f64, f64::max);
        let duration = measure_to_time(tempo, length + 1.0);
        let frames = (self.config.sample_rate as f64 * duration) as usize;

        let instructions: Vec<PlaybackInstruction> = clips
            .iter()
            .filter(|clip| clip.end >= clip.start)
            .map(|clip| PlaybackInstruction {
                audio: clip.audio.clone(),
                when: measure_to_time(tempo, clip.measure),
                offset: measure_to_time(tempo, clip.start),
                duration: measure_to_time(tempo, clip.end - clip.start),
                placement: Placement::Future,
                pitch_shifted: false,
            })
            .collect();

        let layout = channel_layout(&self.config)?;
        let sample_rate = self.config.sample_rate;
        let merged = tokio::task::spawn_blocking(move || {
            let mut mix = AudioBuffer::new(frames, layout);
            mix.sample_rate = sample_rate;
            for instruction in &instructions {
                play_source(instruction, 1.0, &mut mix);
            }
            mix
        })
        .await
        .map_err(|e| MixdownError::Render {
            reason: "clip merge task failed".to_string(),
            source: Some(Box::new(e)),
        })?;

        debug!("Merged clips");
        Ok(merged)
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn channel_layout(config: &RenderConfig) -> Result<ChannelLayout> {
    ChannelLayout::from_count(config.channels).ok_or_else(|| MixdownError::Config {
        reason: format!("cannot render {} channels", config.channels),
    })
}

/// One render pass
pub struct RenderSession {
    renderer: Renderer,
    state: RenderState,
    pending: Option<(MixGraph, usize)>,
    pass_id: Uuid,
}

impl RenderSession {
    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    /// Idle -> GraphBuilt
    ///
    /// Rejects a zero-length project with `EmptyResult` before any graph is
    /// built.
    pub fn build_graph(&mut self, project: &Project, options: RenderOptions) -> Result<()> {
        if self.state != RenderState::Idle {
            return Err(MixdownError::render(format!(
                "cannot build a graph in state {}",
                self.state
            )));
        }
        let result = self.try_build(project, options);
        if result.is_err() {
            self.state = RenderState::Failed;
        }
        result
    }

    fn try_build(&mut self, project: &Project, options: RenderOptions) -> Result<()> {
        if project.is_empty() {
            return Err(MixdownError::EmptyResult);
        }
        project.validate()?;
        let config = &self.renderer.config;
        config.validate()?;

        let duration = project.render_duration();
        let frames = (config.sample_rate as f64 * duration) as usize;
        debug!(
            pass = %self.pass_id,
            duration_secs = duration,
            frames,
            origin = options.origin,
            "Begin rendering result to buffer."
        );

        let graph = MixGraph::build(
            project,
            self.renderer.builder.as_ref(),
            options.origin,
            config.sample_rate,
            config.channels,
        )?;
        self.pending = Some((graph, frames));
        self.state = RenderState::GraphBuilt;
        Ok(())
    }

    /// GraphBuilt -> Rendering -> Complete | Failed
    #[instrument(skip(self), fields(pass = %self.pass_id, backend = self.renderer.backend.name()))]
    pub async fn start_rendering(&mut self) -> Result<RenderResult> {
        let Some((graph, frames)) = self.pending.take() else {
            return Err(MixdownError::render(format!(
                "cannot start rendering in state {}",
                self.state
            )));
        };
        self.state = RenderState::Rendering;

        let backend = Arc::clone(&self.renderer.backend);
        let joined = tokio::task::spawn_blocking(move || backend.render(graph, frames)).await;

        let outcome = match joined {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err @ MixdownError::Render { .. })) => Err(err),
            Ok(Err(err)) => Err(MixdownError::Render {
                reason: "backend failed".to_string(),
                source: Some(Box::new(err)),
            }),
            Err(join_err) => Err(MixdownError::Render {
                reason: "backend panicked".to_string(),
                source: Some(Box::new(join_err)),
            }),
        };

        match outcome {
            Ok((buffer, peaks)) => {
                self.state = RenderState::Complete;
                debug!(frames = buffer.len(), "Render to buffer completed.");
                Ok(RenderResult::new(buffer, peaks, self.pass_id))
            }
            Err(err) => {
                self.state = RenderState::Failed;
                warn!(error = %err, "Render failed");
                Err(err)
            }
        }
    }
}
