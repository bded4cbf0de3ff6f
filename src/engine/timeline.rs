//! Timeline scheduling
//!
//! Converts measure-based clip placement into sample-accurate playback
//! instructions relative to a render origin. All projects are 4/4.

use crate::project::{Clip, SharedAudio};

/// Beats in one measure
pub const BEATS_PER_MEASURE: f64 = 4.0;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Convert a measure count to seconds at the given tempo (BPM)
///
/// Equal to `240 * measures / tempo`.
#[inline]
pub fn measure_to_time(tempo: f64, measures: f64) -> f64 {
    SECONDS_PER_MINUTE * BEATS_PER_MEASURE * measures / tempo
}

/// Convert seconds back to a (fractional) measure position
#[inline]
pub fn time_to_measure(tempo: f64, seconds: f64) -> f64 {
    seconds * tempo / (SECONDS_PER_MINUTE * BEATS_PER_MEASURE)
}

/// Where a scheduled clip sits relative to the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Origin falls inside the clip; playback starts at render time 0
    InProgress,
    /// Clip starts after the origin
    Future,
}

/// One start/offset/duration instruction for a clip source
#[derive(Debug, Clone)]
pub struct PlaybackInstruction {
    pub audio: SharedAudio,
    /// Render time at which playback begins (seconds)
    pub when: f64,
    /// Position in the source audio where playback begins (seconds)
    pub offset: f64,
    /// How long the source plays (seconds)
    pub duration: f64,
    pub placement: Placement,
    pub pitch_shifted: bool,
}

impl PlaybackInstruction {
    /// Render time at which playback stops (seconds)
    pub fn stop(&self) -> f64 {
        self.when + self.duration
    }
}

/// Schedule a clip for a render starting at `origin` seconds
///
/// Returns `None` for a clip that ended before the origin. Pitch-shifted
/// clips use their replacement audio and span throughout.
pub fn schedule_clip(clip: &Clip, tempo: f64, origin: f64) -> Option<PlaybackInstruction> {
    let source = clip.source();
    let start = measure_to_time(tempo, source.start);
    let end = measure_to_time(tempo, source.end);
    let location = measure_to_time(tempo, clip.measure);
    let clip_duration = end - start;

    if origin > location + clip_duration {
        return None;
    }

    let instruction = if origin > location {
        let elapsed = origin - location;
        PlaybackInstruction {
            audio: source.audio.clone(),
            when: 0.0,
            offset: start + elapsed,
            duration: clip_duration - elapsed,
            placement: Placement::InProgress,
            pitch_shifted: source.pitch_shifted,
        }
    } else {
        PlaybackInstruction {
            audio: source.audio.clone(),
            when: location - origin,
            offset: start,
            duration: clip_duration,
            placement: Placement::Future,
            pitch_shifted: source.pitch_shifted,
        }
    };
    Some(instruction)
}
