//! Project representation
//!
//! A compiled project: tracks with explicit roles, time-positioned clips
//! referencing shared decoded audio, per-track effect automation and a
//! fixed tempo. Positions are in measures; the engine converts them to
//! seconds with the 4/4 rule in [`crate::engine::timeline`].
//!
//! Clip audio is shared read-only through `Arc`, so cloning a project
//! copies every mutable field while the decoded PCM stays in one place.

pub mod manifest;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::buffer::AudioBuffer;
use crate::engine::timeline::measure_to_time;
use crate::error::{MixdownError, Result};

pub use manifest::{ManifestCompiler, ProjectManifest};

/// Decoded clip audio, shared read-only between clips and project copies
pub type SharedAudio = Arc<AudioBuffer>;

/// Effect key whose automation drives track volume (dB)
pub const VOLUME_GAIN_KEY: &str = "VOLUME-GAIN";

// ============================================================================
// Clips
// ============================================================================

/// Pitch-shifted replacement audio for a clip
///
/// When present it replaces the clip's audio and span entirely.
#[derive(Debug, Clone)]
pub struct PitchShift {
    pub audio: SharedAudio,
    /// Offset into `audio` where playback begins (measures)
    pub start: f64,
    /// Offset into `audio` where playback ends (measures)
    pub end: f64,
}

/// A placed, time-bounded reference into a source audio buffer
#[derive(Debug, Clone)]
pub struct Clip {
    /// Name of the sound this clip plays, for logs
    pub filekey: String,
    pub audio: SharedAudio,
    /// Offset into `audio` where playback begins (measures)
    pub start: f64,
    /// Offset into `audio` where playback ends (measures)
    pub end: f64,
    /// Placement on the arrangement timeline (measures)
    pub measure: f64,
    /// Linear level this clip is mixed at
    pub gain: f32,
    pub pitchshift: Option<PitchShift>,
}

/// The audio and span a clip actually plays
#[derive(Debug, Clone, Copy)]
pub struct ClipSource<'a> {
    pub audio: &'a SharedAudio,
    pub start: f64,
    pub end: f64,
    pub pitch_shifted: bool,
}

impl Clip {
    pub fn new(audio: SharedAudio, start: f64, end: f64, measure: f64) -> Self {
        Self {
            filekey: String::new(),
            audio,
            start,
            end,
            measure,
            gain: 1.0,
            pitchshift: None,
        }
    }

    pub fn with_filekey(mut self, filekey: impl Into<String>) -> Self {
        self.filekey = filekey.into();
        self
    }

    pub fn with_pitchshift(mut self, pitchshift: PitchShift) -> Self {
        self.pitchshift = Some(pitchshift);
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Resolve the source this clip plays, substituting pitch-shifted audio
    pub fn source(&self) -> ClipSource<'_> {
        match &self.pitchshift {
            Some(shift) => ClipSource {
                audio: &shift.audio,
                start: shift.start,
                end: shift.end,
                pitch_shifted: true,
            },
            None => ClipSource {
                audio: &self.audio,
                start: self.start,
                end: self.end,
                pitch_shifted: false,
            },
        }
    }

    /// Length of the played span in measures
    pub fn length_measures(&self) -> f64 {
        let source = self.source();
        source.end - source.start
    }
}

// ============================================================================
// Automation
// ============================================================================

/// One breakpoint of an automation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    /// Timeline position (measures)
    pub measure: f64,
    pub value: f32,
}

/// Piecewise-linear parameter curve over the timeline
///
/// Holds the first value before the first point and the last value after
/// the last point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Automation {
    points: Vec<AutomationPoint>,
}

impl Automation {
    pub fn new(mut points: Vec<AutomationPoint>) -> Self {
        points.sort_by(|a, b| a.measure.total_cmp(&b.measure));
        Self { points }
    }

    /// Constant curve
    pub fn constant(value: f32) -> Self {
        Self::new(vec![AutomationPoint {
            measure: 0.0,
            value,
        }])
    }

    pub fn points(&self) -> &[AutomationPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Curve value at a timeline position, or None for an empty curve
    pub fn value_at(&self, measure: f64) -> Option<f32> {
        let first = self.points.first()?;
        if measure <= first.measure {
            return Some(first.value);
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if measure <= b.measure {
                let span = b.measure - a.measure;
                if span <= 0.0 {
                    return Some(b.value);
                }
                let t = ((measure - a.measure) / span) as f32;
                return Some(a.value + (b.value - a.value) * t);
            }
        }
        self.points.last().map(|p| p.value)
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// What a track is for in the mixdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    /// Final summing bus carrying the mastering limiter
    Master,
    /// A regular audible track
    #[default]
    Audio,
    /// Click/count-off track, never mixed down
    Metronome,
}

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub role: TrackRole,
    pub clips: Vec<Clip>,
    /// Effect key (e.g. `VOLUME-GAIN`) to automation curve
    pub effects: BTreeMap<String, Automation>,
}

impl Track {
    pub fn new(role: TrackRole) -> Self {
        Self {
            role,
            clips: Vec::new(),
            effects: BTreeMap::new(),
        }
    }

    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }

    pub fn with_effect(mut self, key: impl Into<String>, automation: Automation) -> Self {
        self.effects.insert(key.into(), automation);
        self
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone)]
pub struct Project {
    pub tracks: Vec<Track>,
    /// Beats per minute
    pub tempo: f64,
    /// Arrangement length (measures)
    pub length: f64,
}

impl Project {
    pub fn new(tracks: Vec<Track>, tempo: f64, length: f64) -> Self {
        Self {
            tracks,
            tempo,
            length,
        }
    }

    /// Build a project from the positional convention: the first track is
    /// the master bus and the last is the metronome
    pub fn from_positional(mut tracks: Vec<Track>, tempo: f64, length: f64) -> Self {
        let last = tracks.len().saturating_sub(1);
        for (i, track) in tracks.iter_mut().enumerate() {
            track.role = if i == 0 {
                TrackRole::Master
            } else if i == last {
                TrackRole::Metronome
            } else {
                TrackRole::Audio
            };
        }
        Self::new(tracks, tempo, length)
    }

    /// Check structural invariants before rendering
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(MixdownError::InvalidProject {
                reason: format!("tempo must be positive, got {}", self.tempo),
            });
        }
        if !(self.length.is_finite() && self.length >= 0.0) {
            return Err(MixdownError::InvalidProject {
                reason: format!("length must be non-negative, got {}", self.length),
            });
        }
        if self.tracks.len() < 2 {
            return Err(MixdownError::InvalidProject {
                reason: format!(
                    "a project needs a master and a metronome track, got {} track(s)",
                    self.tracks.len()
                ),
            });
        }
        let masters = self.count_role(TrackRole::Master);
        if masters != 1 {
            return Err(MixdownError::InvalidProject {
                reason: format!("expected exactly one master track, found {}", masters),
            });
        }
        if self.count_role(TrackRole::Metronome) > 1 {
            return Err(MixdownError::InvalidProject {
                reason: "more than one metronome track".to_string(),
            });
        }
        for (t, track) in self.tracks.iter().enumerate() {
            for (c, clip) in track.clips.iter().enumerate() {
                let source = clip.source();
                if source.start > source.end {
                    return Err(MixdownError::InvalidProject {
                        reason: format!(
                            "clip {} on track {} starts after it ends ({} > {})",
                            c, t, source.start, source.end
                        ),
                    });
                }
                if clip.measure < 0.0 {
                    return Err(MixdownError::InvalidProject {
                        reason: format!("clip {} on track {} has a negative position", c, t),
                    });
                }
            }
        }
        Ok(())
    }

    fn count_role(&self, role: TrackRole) -> usize {
        self.tracks.iter().filter(|t| t.role == role).count()
    }

    /// Whether the project resolves to zero-length output
    pub fn is_empty(&self) -> bool {
        self.length <= 0.0
    }

    /// Convert a measure position to seconds at this project's tempo
    pub fn measure_to_time(&self, measures: f64) -> f64 {
        measure_to_time(self.tempo, measures)
    }

    /// Total render duration, padded by one measure for trailing decay
    pub fn render_duration(&self) -> f64 {
        self.measure_to_time(self.length + 1.0)
    }

    pub fn master_index(&self) -> Option<usize> {
        self.tracks.iter().position(|t| t.role == TrackRole::Master)
    }

    /// Indices of the tracks that are exported individually
    pub fn audible_track_indices(&self) -> Vec<usize> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.role == TrackRole::Audio)
            .map(|(i, _)| i)
            .collect()
    }

    /// Copy of this project in which only `target` (plus the master and
    /// metronome framing) is audible
    pub fn isolate(&self, target: usize) -> Project {
        let mut copy = self.clone();
        for (i, track) in copy.tracks.iter_mut().enumerate() {
            if i == target || track.role != TrackRole::Audio {
                continue;
            }
            for clip in &mut track.clips {
                clip.gain = 0.0;
            }
        }
        copy
    }
}
