//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::MixdownConfig;
use crate::encode::EncodedArtifact;
use crate::engine::render::{RenderOptions, Renderer};
use crate::engine::timeline::{schedule_clip, Placement};
use crate::engine::VolumeAutomation;
use crate::error::Result;
use crate::export::{Exporter, Script};
use crate::project::{ManifestCompiler, ProjectManifest};

use super::OutputFormat;

fn exporter_for(manifest: &Path, config: &MixdownConfig) -> Exporter {
    let renderer = Renderer::new(config.render.clone()).with_chain_builder(Arc::new(
        VolumeAutomation {
            sample_rate: config.render.sample_rate,
        },
    ));
    Exporter::new(Arc::new(ManifestCompiler::for_manifest(manifest)), renderer)
        .with_mp3_config(config.mp3.clone())
}

fn report(artifact: &EncodedArtifact, output: &Path) -> Result<()> {
    let path = artifact.write_to(output)?;
    println!("Wrote {} ({} bytes)", path.display(), artifact.len());
    println!("SHA-256: {}", artifact.sha256());
    Ok(())
}

/// Render a manifest to one WAV or MP3 file.
pub async fn render(
    manifest: &Path,
    format: OutputFormat,
    output: &Path,
    origin: f64,
    config: &MixdownConfig,
) -> Result<()> {
    info!("Rendering {} as {:?}", manifest.display(), format);

    let script = Script::from_path(manifest)?;
    let exporter = exporter_for(manifest, config);
    let project = exporter.compile(&script).await?;
    let options = RenderOptions::from_origin(origin);

    let artifact = match format {
        OutputFormat::Wav => {
            exporter
                .wav_from_project(&project, script.base_name(), options)
                .await?
        }
        OutputFormat::Mp3 => {
            exporter
                .mp3_from_project(&project, script.base_name(), options)
                .await?
        }
    };

    report(&artifact, output)
}

/// Export each audible track of a manifest into a ZIP archive.
pub async fn stems(manifest: &Path, output: &Path, config: &MixdownConfig) -> Result<()> {
    info!("Exporting stems for {}", manifest.display());

    let script = Script::from_path(manifest)?;
    let artifact = exporter_for(manifest, config).multi_track(&script).await?;
    report(&artifact, output)
}

/// Print tempo, length and track layout of a manifest.
pub fn show_info(manifest: &Path) -> Result<()> {
    let parsed = ProjectManifest::load(manifest)?;
    let project = ManifestCompiler::for_manifest(manifest).compile_manifest(&parsed)?;
    project.validate()?;

    println!("Project: {}", manifest.display());
    println!("Tempo: {} BPM", project.tempo);
    println!(
        "Length: {} measures ({:.3}s rendered)",
        project.length,
        project.render_duration()
    );
    println!("{:-<60}", "");

    for (i, track) in project.tracks.iter().enumerate() {
        let effects: Vec<&str> = track.effects.keys().map(String::as_str).collect();
        println!(
            "{:>3}  {:<10} {:>3} clip(s)  {}",
            i,
            format!("{:?}", track.role),
            track.clips.len(),
            effects.join(", ")
        );
    }

    Ok(())
}

/// Print every clip's playback instruction for a render from `origin`.
pub fn show_schedule(manifest: &Path, origin: f64) -> Result<()> {
    let parsed = ProjectManifest::load(manifest)?;
    let project = ManifestCompiler::for_manifest(manifest).compile_manifest(&parsed)?;
    project.validate()?;

    println!("Schedule from {:.3}s:", origin);
    println!("{:-<72}", "");

    for (t, track) in project.tracks.iter().enumerate() {
        for (c, clip) in track.clips.iter().enumerate() {
            let label = if clip.filekey.is_empty() {
                format!("clip {}", c)
            } else {
                clip.filekey.clone()
            };

            match schedule_clip(clip, project.tempo, origin) {
                Some(instruction) => {
                    let state = match instruction.placement {
                        Placement::InProgress => "in progress",
                        Placement::Future => "future",
                    };
                    println!(
                        "track {:>2}  {:<24} when {:>8.3}s  offset {:>8.3}s  duration {:>8.3}s  {}{}",
                        t,
                        label,
                        instruction.when,
                        instruction.offset,
                        instruction.duration,
                        state,
                        if instruction.pitch_shifted { " (pitch-shifted)" } else { "" }
                    );
                }
                None => println!("track {:>2}  {:<24} skipped (before origin)", t, label),
            }
        }
    }

    Ok(())
}
