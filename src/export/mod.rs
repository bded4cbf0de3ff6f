//! Export pipeline
//!
//! Compile a script into a project, render it offline and encode the result.
//! Multi-track export renders one isolated copy of the project per audible
//! track, concurrently, and packages the WAVs into a single archive once
//! every render has settled.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::Mp3Config;
use crate::encode::{archive, mp3, wav, ArtifactKind, EncodedArtifact};
use crate::engine::render::{RenderOptions, Renderer};
use crate::error::{BoxedCause, MixdownError, Result};
use crate::project::Project;

// ============================================================================
// Compiler contract
// ============================================================================

/// A named unit of source handed to a compiler
#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    pub source: String,
}

impl Script {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Read a script from disk, named after its file
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, source })
    }

    /// Script name without its extension (`song.py` -> `song`)
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Turns script source into a project representation
pub trait Compiler: Send + Sync {
    fn compile(&self, script: &Script) -> std::result::Result<Project, BoxedCause>;
}

// ============================================================================
// Exporter
// ============================================================================

/// Compile, render and encode scripts into downloadable artifacts
#[derive(Clone)]
pub struct Exporter {
    compiler: Arc<dyn Compiler>,
    renderer: Renderer,
    mp3: Mp3Config,
}

impl Exporter {
    pub fn new(compiler: Arc<dyn Compiler>, renderer: Renderer) -> Self {
        Self {
            compiler,
            renderer,
            mp3: Mp3Config::default(),
        }
    }

    pub fn with_mp3_config(mut self, mp3: Mp3Config) -> Self {
        self.mp3 = mp3;
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Compile a script and check the result is renderable
    ///
    /// The compiler runs on the blocking pool; it may parse and decode audio.
    ///
    /// # Errors
    /// * `Compile` - If the compiler fails or produces an invalid project
    /// * `EmptyResult` - If the project has zero length
    pub async fn compile(&self, script: &Script) -> Result<Project> {
        let compiler = Arc::clone(&self.compiler);
        let owned = script.clone();
        let compiled = tokio::task::spawn_blocking(move || compiler.compile(&owned))
            .await
            .map_err(|e| MixdownError::Compile {
                reason: format!("compile task for '{}' failed", script.name),
                source: Some(Box::new(e)),
            })?;

        let project = compiled.map_err(|e| MixdownError::Compile {
            reason: format!("failed to compile '{}'", script.name),
            source: Some(e),
        })?;

        project.validate().map_err(|e| MixdownError::Compile {
            reason: format!("'{}' produced an invalid project", script.name),
            source: Some(Box::new(e)),
        })?;

        if project.is_empty() {
            warn!(script = %script.name, "Script produced an empty project");
            return Err(MixdownError::EmptyResult);
        }
        Ok(project)
    }

    /// Render a script to a WAV artifact named after it
    #[instrument(skip(self, script), fields(script = %script.name))]
    pub async fn wav(&self, script: &Script) -> Result<EncodedArtifact> {
        let project = self.compile(script).await?;
        self.wav_from_project(&project, script.base_name(), RenderOptions::default())
            .await
    }

    /// Render a script to an MP3 artifact named after it
    #[instrument(skip(self, script), fields(script = %script.name, kbps = self.mp3.bitrate_kbps))]
    pub async fn mp3(&self, script: &Script) -> Result<EncodedArtifact> {
        let project = self.compile(script).await?;
        self.mp3_from_project(&project, script.base_name(), RenderOptions::default())
            .await
    }

    /// Render each audible track of a script in isolation into a ZIP of WAVs
    #[instrument(skip(self, script), fields(script = %script.name))]
    pub async fn multi_track(&self, script: &Script) -> Result<EncodedArtifact> {
        let project = self.compile(script).await?;
        self.multi_track_from_project(&project, script.base_name())
            .await
    }

    pub async fn wav_from_project(
        &self,
        project: &Project,
        name: &str,
        options: RenderOptions,
    ) -> Result<EncodedArtifact> {
        let result = self.renderer.render(project, options).await?;
        let bytes = wav::encode_buffer(result.buffer())?;

        let artifact = EncodedArtifact::new(name, ArtifactKind::Wav, bytes);
        info!(artifact = %artifact.filename, bytes = artifact.len(), "Exported WAV");
        Ok(artifact)
    }

    pub async fn mp3_from_project(
        &self,
        project: &Project,
        name: &str,
        options: RenderOptions,
    ) -> Result<EncodedArtifact> {
        let result = self.renderer.render(project, options).await?;
        let config = self.mp3.clone();
        let buffer = result.into_buffer();

        let bytes = tokio::task::spawn_blocking(move || mp3::encode_buffer(&buffer, &config))
            .await
            .map_err(|e| MixdownError::Encode {
                reason: format!("mp3 encode task failed: {}", e),
            })??;

        let artifact = EncodedArtifact::new(name, ArtifactKind::Mp3, bytes);
        info!(artifact = %artifact.filename, bytes = artifact.len(), "Exported MP3");
        Ok(artifact)
    }

    /// Export every audible track of `project` as `<trackIndex>.wav` in one archive
    ///
    /// Renders run concurrently on isolated copies of the project. The archive
    /// is built only after every render has produced its WAV; the first failed
    /// render aborts the rest and rejects the export.
    pub async fn multi_track_from_project(
        &self,
        project: &Project,
        name: &str,
    ) -> Result<EncodedArtifact> {
        if project.is_empty() {
            return Err(MixdownError::EmptyResult);
        }

        let tracks = project.audible_track_indices();
        let total = tracks.len();
        if total == 0 {
            warn!("Project has no audible tracks, archive will be empty");
        }

        let mut pending = JoinSet::new();
        for (slot, &track_index) in tracks.iter().enumerate() {
            let renderer = self.renderer.clone();
            let isolated = project.isolate(track_index);
            pending.spawn(async move {
                let wav = match renderer.render(&isolated, RenderOptions::default()).await {
                    Ok(result) => wav::encode_buffer(result.buffer()),
                    Err(e) => Err(e),
                };
                (slot, track_index, wav)
            });
        }

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
        let mut completed = 0usize;

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((slot, track_index, Ok(bytes))) => {
                    slots[slot] = Some(bytes);
                    completed += 1;
                    debug!(track_index, completed, total, "Track render settled");
                }
                Ok((_, track_index, Err(e))) => {
                    warn!(track_index, error = %e, "Track render rejected, aborting export");
                    pending.abort_all();
                    return Err(MixdownError::TrackExport {
                        track_index,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    pending.abort_all();
                    return Err(MixdownError::Render {
                        reason: "track export task failed".to_string(),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }

        if completed != total {
            return Err(MixdownError::render(format!(
                "only {} of {} track renders settled",
                completed, total
            )));
        }

        let entries: Vec<(String, Vec<u8>)> = tracks
            .iter()
            .zip(slots)
            .filter_map(|(track_index, bytes)| {
                bytes.map(|bytes| (format!("{}.wav", track_index), bytes))
            })
            .collect();

        let artifact = EncodedArtifact::new(name, ArtifactKind::Zip, archive::write_zip(&entries)?);
        info!(
            artifact = %artifact.filename,
            entries = entries.len(),
            bytes = artifact.len(),
            "Exported tracks"
        );
        Ok(artifact)
    }
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("renderer", &self.renderer)
            .field("mp3", &self.mp3)
            .finish()
    }
}
