//! JSON project manifests
//!
//! A manifest describes a project by reference: clips point at WAV files on
//! disk, relative to the manifest's directory. [`ManifestCompiler`] decodes
//! those files and produces a [`Project`].
//!
//! ```json
//! {
//!   "tempo": 120,
//!   "length": 8,
//!   "tracks": [
//!     { "role": "master", "clips": [] },
//!     { "clips": [{ "file": "drums.wav", "measure": 1, "end": 4 }],
//!       "effects": { "VOLUME-GAIN": [{ "measure": 1, "value": -6 }] } },
//!     { "role": "metronome", "clips": [] }
//!   ]
//! }
//! ```
//!
//! When no track names a role, the first track is the master and the last
//! is the metronome.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Automation, Clip, PitchShift, Project, SharedAudio, Track, TrackRole};
use crate::engine::io::import_audio;
use crate::engine::timeline::time_to_measure;
use crate::error::{BoxedCause, MixdownError, Result};
use crate::export::{Compiler, Script};

fn unity() -> f32 {
    1.0
}

/// Serialized project description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Beats per minute
    pub tempo: f64,
    /// Arrangement length (measures)
    pub length: f64,
    pub tracks: Vec<TrackManifest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackManifest {
    pub role: Option<TrackRole>,
    pub clips: Vec<ClipManifest>,
    pub effects: BTreeMap<String, Automation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipManifest {
    /// WAV file, relative to the manifest
    pub file: PathBuf,
    #[serde(default)]
    pub start: f64,
    /// Defaults to the full length of the file
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub measure: f64,
    #[serde(default = "unity")]
    pub gain: f32,
    #[serde(default)]
    pub pitchshift: Option<PitchShiftManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchShiftManifest {
    pub file: PathBuf,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: Option<f64>,
}

impl ProjectManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Compiles manifests into projects, decoding each referenced file once
pub struct ManifestCompiler {
    base_dir: PathBuf,
    cache: Mutex<HashMap<PathBuf, SharedAudio>>,
}

impl ManifestCompiler {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Compiler for a manifest file, resolving clips next to it
    pub fn for_manifest(path: &Path) -> Self {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::new(base)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn compile_manifest(&self, manifest: &ProjectManifest) -> Result<Project> {
        let explicit_roles = manifest.tracks.iter().any(|t| t.role.is_some());

        let mut tracks = Vec::with_capacity(manifest.tracks.len());
        for track in &manifest.tracks {
            let mut compiled = Track::new(track.role.unwrap_or_default());
            for clip in &track.clips {
                compiled.clips.push(self.compile_clip(clip, manifest.tempo)?);
            }
            for (key, curve) in &track.effects {
                compiled
                    .effects
                    .insert(key.clone(), Automation::new(curve.points().to_vec()));
            }
            tracks.push(compiled);
        }

        let project = if explicit_roles {
            Project::new(tracks, manifest.tempo, manifest.length)
        } else {
            Project::from_positional(tracks, manifest.tempo, manifest.length)
        };
        debug!(
            tracks = project.tracks.len(),
            tempo = project.tempo,
            length = project.length,
            "Compiled manifest"
        );
        Ok(project)
    }

    fn compile_clip(&self, clip: &ClipManifest, tempo: f64) -> Result<Clip> {
        let audio = self.load(&clip.file)?;
        let end = clip
            .end
            .unwrap_or_else(|| time_to_measure(tempo, audio.duration_secs()));

        let mut compiled = Clip::new(audio, clip.start, end, clip.measure)
            .with_filekey(clip.file.display().to_string())
            .with_gain(clip.gain);

        if let Some(shift) = &clip.pitchshift {
            let audio = self.load(&shift.file)?;
            let end = shift
                .end
                .unwrap_or_else(|| time_to_measure(tempo, audio.duration_secs()));
            compiled = compiled.with_pitchshift(PitchShift {
                audio,
                start: shift.start,
                end,
            });
        }
        Ok(compiled)
    }

    fn load(&self, file: &Path) -> Result<SharedAudio> {
        let path = self.base_dir.join(file);
        let mut cache = self.cache.lock().map_err(|_| MixdownError::InvalidAudio {
            reason: "audio cache poisoned".to_string(),
            source: None,
        })?;

        if let Some(audio) = cache.get(&path) {
            return Ok(audio.clone());
        }

        let audio = Arc::new(import_audio(&path)?);
        debug!(file = %path.display(), frames = audio.len(), "Decoded clip audio");
        cache.insert(path, audio.clone());
        Ok(audio)
    }
}

impl Compiler for ManifestCompiler {
    fn compile(&self, script: &Script) -> std::result::Result<Project, BoxedCause> {
        let manifest = ProjectManifest::from_json(&script.source)?;
        Ok(self.compile_manifest(&manifest)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_tone(path: &Path, frames: usize) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * 2 {
            writer.write_sample(8192i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let manifest = ProjectManifest::from_json(
            r#"{ "tempo": 120, "length": 4, "tracks": [ { "clips": [ { "file": "a.wav" } ] } ] }"#,
        )
        .unwrap();

        let clip = &manifest.tracks[0].clips[0];
        assert_eq!(manifest.tracks[0].role, None);
        assert_eq!(clip.start, 0.0);
        assert_eq!(clip.end, None);
        assert_eq!(clip.gain, 1.0);
        assert!(clip.pitchshift.is_none());
    }

    #[test]
    fn test_compile_positional_roles_and_default_end() {
        let dir = tempdir().unwrap();
        // 2 seconds = 1 measure at 120 BPM
        write_tone(&dir.path().join("loop.wav"), 88200);

        let manifest = ProjectManifest::from_json(
            r#"{ "tempo": 120, "length": 4, "tracks": [
                { "clips": [] },
                { "clips": [ { "file": "loop.wav", "measure": 1 } ] },
                { "clips": [ { "file": "loop.wav", "end": 0.5, "gain": 0.5 } ] },
                { "clips": [] }
            ] }"#,
        )
        .unwrap();

        let compiler = ManifestCompiler::new(dir.path());
        let project = compiler.compile_manifest(&manifest).unwrap();

        assert_eq!(project.tracks[0].role, TrackRole::Master);
        assert_eq!(project.tracks[3].role, TrackRole::Metronome);
        assert_eq!(project.audible_track_indices(), vec![1, 2]);

        let first = &project.tracks[1].clips[0];
        assert!((first.end - 1.0).abs() < 1e-9);
        assert_eq!(first.measure, 1.0);

        let second = &project.tracks[2].clips[0];
        assert_eq!(second.end, 0.5);
        assert_eq!(second.gain, 0.5);
        assert!(Arc::ptr_eq(&first.audio, &second.audio));
    }

    #[test]
    fn test_explicit_roles_are_kept() {
        let manifest = ProjectManifest::from_json(
            r#"{ "tempo": 100, "length": 2, "tracks": [
                { "role": "audio" }, { "role": "master" }, { "role": "metronome" }
            ] }"#,
        )
        .unwrap();

        let project = ManifestCompiler::new(".").compile_manifest(&manifest).unwrap();
        assert_eq!(project.master_index(), Some(1));
        assert_eq!(project.audible_track_indices(), vec![0]);
    }

    #[test]
    fn test_pitchshift_and_effects() {
        let dir = tempdir().unwrap();
        write_tone(&dir.path().join("vox.wav"), 44100);
        write_tone(&dir.path().join("vox_up.wav"), 22050);

        let manifest = ProjectManifest::from_json(
            r#"{ "tempo": 120, "length": 2, "tracks": [
                { "clips": [] },
                { "clips": [ { "file": "vox.wav", "pitchshift": { "file": "vox_up.wav" } } ],
                  "effects": { "VOLUME-GAIN": [
                    { "measure": 2, "value": -12 }, { "measure": 0, "value": 0 } ] } },
                { "clips": [] }
            ] }"#,
        )
        .unwrap();

        let project = ManifestCompiler::new(dir.path()).compile_manifest(&manifest).unwrap();
        let clip = &project.tracks[1].clips[0];
        let source = clip.source();
        assert!(source.pitch_shifted);
        assert!((source.end - 0.25).abs() < 1e-9);

        let curve = &project.tracks[1].effects["VOLUME-GAIN"];
        assert_eq!(curve.points()[0].measure, 0.0);
        assert_eq!(curve.value_at(1.0), Some(-6.0));
    }

    #[test]
    fn test_missing_file_fails_compile() {
        let dir = tempdir().unwrap();
        let compiler = ManifestCompiler::new(dir.path());
        let script = Script::new(
            "song.json",
            r#"{ "tempo": 120, "length": 1, "tracks": [ { "clips": [ { "file": "nope.wav" } ] }, {} ] }"#,
        );
        assert!(compiler.compile(&script).is_err());
    }

    #[test]
    fn test_malformed_json_fails_compile() {
        let compiler = ManifestCompiler::new(".");
        assert!(compiler.compile(&Script::new("bad.json", "{ tempo: }")).is_err());
    }
}
