//! Mix graph construction
//!
//! Builds the per-render routing for a project:
//!
//! ```text
//! audio track:  clips -> track gain -> effect chain ------------> master bus
//!                                   \-> analyser (no chain) ---/
//! master track: master bus -> limiter -> track gain (+ own clips) -> effect chain -> output
//! ```
//!
//! The metronome track is never part of the graph. Per-clip scratch
//! state lives in [`ClipStates`], owned by the graph, so project records
//! are never written during a render.

use tracing::debug;

use crate::dsp::{AutomatedGain, Effect, EffectChain, Limiter};
use crate::engine::buffer::{linear_to_db, AudioBuffer, ChannelLayout};
use crate::engine::timeline::{schedule_clip, PlaybackInstruction};
use crate::error::{MixdownError, Result};
use crate::project::{Project, Track, TrackRole, VOLUME_GAIN_KEY};

// ============================================================================
// Chain builder contract
// ============================================================================

/// Where a track's chain output is summed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    /// The master bus feeding the master track's limiter
    Master,
    /// The final render output
    Output,
}

/// Builds a track's effect chain
///
/// Returning `None` routes the track around the effect stage.
pub trait ChainBuilder: Send + Sync {
    fn build_chain(
        &self,
        track: &Track,
        track_index: usize,
        tempo: f64,
        origin: f64,
        bus: Bus,
    ) -> Option<EffectChain>;
}

/// Builder that never provides a chain
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl ChainBuilder for NoEffects {
    fn build_chain(&self, _: &Track, _: usize, _: f64, _: f64, _: Bus) -> Option<EffectChain> {
        None
    }
}

/// Builder honouring `VOLUME-GAIN` automation; other effect keys are ignored
#[derive(Debug, Clone, Copy)]
pub struct VolumeAutomation {
    pub sample_rate: u32,
}

impl Default for VolumeAutomation {
    fn default() -> Self {
        Self {
            sample_rate: crate::config::SAMPLE_RATE,
        }
    }
}

impl ChainBuilder for VolumeAutomation {
    fn build_chain(
        &self,
        track: &Track,
        _track_index: usize,
        tempo: f64,
        origin: f64,
        _bus: Bus,
    ) -> Option<EffectChain> {
        let automation = track.effects.get(VOLUME_GAIN_KEY)?;
        let gain = AutomatedGain::new(automation.clone(), tempo, origin);
        Some(EffectChain::new(self.sample_rate).with(Box::new(gain)))
    }
}

// ============================================================================
// Render-local clip state
// ============================================================================

/// Identity of a clip within one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId {
    pub track: usize,
    pub clip: usize,
}

/// Per-render state of one clip
#[derive(Debug, Clone)]
pub struct ClipState {
    /// Gain applied to the clip source
    pub gain: f32,
    /// Whether the clip sounds within this render window
    pub playing: bool,
    pub instruction: Option<PlaybackInstruction>,
}

/// Side table of clip state for one render pass, indexed by [`ClipId`]
#[derive(Debug, Clone, Default)]
pub struct ClipStates {
    tracks: Vec<Vec<ClipState>>,
}

impl ClipStates {
    fn with_tracks(count: usize) -> Self {
        Self {
            tracks: vec![Vec::new(); count],
        }
    }

    fn insert(&mut self, id: ClipId, state: ClipState) {
        let clips = &mut self.tracks[id.track];
        debug_assert_eq!(clips.len(), id.clip);
        clips.push(state);
    }

    pub fn get(&self, id: ClipId) -> Option<&ClipState> {
        self.tracks.get(id.track).and_then(|t| t.get(id.clip))
    }

    /// Clips that sound in this render window, in track/clip order
    pub fn playing(&self) -> Vec<ClipId> {
        self.iter()
            .filter(|(_, state)| state.playing)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClipId, &ClipState)> {
        self.tracks.iter().enumerate().flat_map(|(track, clips)| {
            clips
                .iter()
                .enumerate()
                .map(move |(clip, state)| (ClipId { track, clip }, state))
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Peak level observed by a track's analyser during a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPeak {
    pub track_index: usize,
    pub peak_db: f32,
}

/// Routing for one track
#[derive(Debug)]
pub struct TrackGraph {
    pub index: usize,
    pub role: TrackRole,
    /// Shared gain applied to the summed clips
    pub gain: f32,
    pub chain: Option<EffectChain>,
}

/// The complete routing of one render pass
#[derive(Debug)]
pub struct MixGraph {
    tracks: Vec<TrackGraph>,
    master: usize,
    limiter: Limiter,
    clip_states: ClipStates,
    sample_rate: u32,
    channels: usize,
}

impl MixGraph {
    /// Wire every non-metronome track of a project for a render at `origin`
    pub fn build(
        project: &Project,
        builder: &dyn ChainBuilder,
        origin: f64,
        sample_rate: u32,
        channels: usize,
    ) -> Result<Self> {
        let master_index = project
            .master_index()
            .ok_or_else(|| MixdownError::InvalidProject {
                reason: "project has no master track".to_string(),
            })?;

        let mut clip_states = ClipStates::with_tracks(project.tracks.len());
        let mut tracks = Vec::with_capacity(project.tracks.len());
        let mut master = 0;

        for (i, track) in project.tracks.iter().enumerate() {
            if track.role == TrackRole::Metronome {
                continue;
            }
            let bus = if i == master_index {
                Bus::Output
            } else {
                Bus::Master
            };
            let chain = builder.build_chain(track, i, project.tempo, origin, bus);

            for (c, clip) in track.clips.iter().enumerate() {
                let instruction = schedule_clip(clip, project.tempo, origin);
                if let Some(scheduled) = &instruction {
                    if scheduled.pitch_shifted {
                        debug!(
                            "Using pitchshifted audio for {} on track {}",
                            clip.filekey, i
                        );
                    }
                }
                clip_states.insert(
                    ClipId { track: i, clip: c },
                    ClipState {
                        gain: clip.gain,
                        playing: instruction.is_some(),
                        instruction,
                    },
                );
            }

            if i == master_index {
                master = tracks.len();
            }
            tracks.push(TrackGraph {
                index: i,
                role: track.role,
                gain: 1.0,
                chain,
            });
        }

        let mut limiter = Limiter::mastering();
        limiter.prepare(sample_rate);

        Ok(Self {
            tracks,
            master,
            limiter,
            clip_states,
            sample_rate,
            channels,
        })
    }

    pub fn tracks(&self) -> &[TrackGraph] {
        &self.tracks
    }

    pub fn clip_states(&self) -> &ClipStates {
        &self.clip_states
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pull `frames` samples through the graph
    ///
    /// Returns the output buffer and the peaks seen by each analyser.
    pub fn render(mut self, frames: usize) -> Result<(AudioBuffer, Vec<TrackPeak>)> {
        let layout = ChannelLayout::from_count(self.channels).ok_or_else(|| {
            MixdownError::render(format!("cannot render {} channels", self.channels))
        })?;
        let mut master_bus = AudioBuffer::new(frames, layout);
        master_bus.sample_rate = self.sample_rate;
        let mut scratch = master_bus.clone();
        let mut peaks = Vec::new();

        for (position, track) in self.tracks.iter_mut().enumerate() {
            if position == self.master {
                continue;
            }
            scratch.clear();
            mix_track_clips(&self.clip_states, track, &mut scratch);

            match track.chain.as_mut() {
                Some(chain) => chain.process(&mut scratch)?,
                None => peaks.push(TrackPeak {
                    track_index: track.index,
                    peak_db: linear_to_db(scratch.peak()),
                }),
            }
            master_bus.mix_from(&scratch);
        }

        let master = &mut self.tracks[self.master];
        scratch.clear();
        mix_track_clips(&self.clip_states, master, &mut scratch);
        self.limiter.process(&mut master_bus)?;
        master_bus.apply_gain(master.gain);
        scratch.mix_from(&master_bus);
        if let Some(chain) = master.chain.as_mut() {
            chain.process(&mut scratch)?;
        }

        if let Some(bad) = scratch.samples.iter().flatten().find(|s| !s.is_finite()) {
            return Err(MixdownError::render(format!(
                "graph produced a non-finite sample ({})",
                bad
            )));
        }
        Ok((scratch, peaks))
    }
}

/// Sum a track's scheduled clips through its shared gain
fn mix_track_clips(states: &ClipStates, track: &TrackGraph, out: &mut AudioBuffer) {
    let Some(clips) = states.tracks.get(track.index) else {
        return;
    };
    for state in clips {
        if let Some(instruction) = &state.instruction {
            play_source(instruction, state.gain * track.gain, out);
        }
    }
}

/// Write one scheduled source into `out`, resampling linearly when the
/// source rate differs from the output rate
pub(crate) fn play_source(instruction: &PlaybackInstruction, gain: f32, out: &mut AudioBuffer) {
    if gain == 0.0 || instruction.duration <= 0.0 {
        return;
    }
    let source = &instruction.audio;
    if source.is_empty() || source.sample_rate == 0 {
        return;
    }

    let out_rate = out.sample_rate as f64;
    let step = source.sample_rate as f64 / out_rate;
    let first_frame = (instruction.when * out_rate).round() as usize;
    let frame_count = (instruction.duration * out_rate).round() as usize;
    let source_start = instruction.offset * source.sample_rate as f64;
    let source_len = source.len();

    for (ch, dest) in out.samples.iter_mut().enumerate() {
        let src = source.channel_for_output(ch);
        for i in 0..frame_count {
            let Some(slot) = dest.get_mut(first_frame + i) else {
                break;
            };
            let pos = source_start + i as f64 * step;
            let idx = pos.floor() as usize;
            if idx >= source_len {
                break;
            }
            let frac = (pos - idx as f64) as f32;
            let sample = if frac > 0.0 && idx + 1 < source_len {
                src[idx] * (1.0 - frac) + src[idx + 1] * frac
            } else {
                src[idx]
            };
            *slot += sample * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Automation, Clip, SharedAudio};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RATE: u32 = 44100;

    fn constant_audio(value: f32, seconds: f64) -> SharedAudio {
        let frames = (seconds * RATE as f64) as usize;
        Arc::new(AudioBuffer::from_channels(vec![vec![value; frames]; 2], RATE).unwrap())
    }

    /// Master, one audio track, metronome. 120bpm so a measure is 2s.
    fn project(audio_clip: Clip) -> Project {
        let metronome = Track::default().with_clip(Clip::new(constant_audio(0.9, 0.1), 0.0, 0.05, 0.0));
        Project::from_positional(
            vec![Track::default(), Track::default().with_clip(audio_clip), metronome],
            120.0,
            1.0,
        )
    }

    #[test]
    fn test_metronome_is_not_routed() {
        let clip = Clip::new(constant_audio(0.25, 2.0), 0.0, 1.0, 0.0);
        let graph = MixGraph::build(&project(clip), &NoEffects, 0.0, RATE, 2).unwrap();
        let indices: Vec<usize> = graph.tracks().iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(graph.clip_states().get(ClipId { track: 2, clip: 0 }).is_none());
    }

    #[test]
    fn test_clip_states_mark_playing() {
        let mut p = project(Clip::new(constant_audio(0.25, 2.0), 0.0, 1.0, 0.0));
        p.tracks[1]
            .clips
            .push(Clip::new(constant_audio(0.25, 2.0), 0.0, 0.5, 2.0));

        // origin 3s: first clip (0..2s) is past, second (4..5s) is future
        let graph = MixGraph::build(&p, &NoEffects, 3.0, RATE, 2).unwrap();
        let states = graph.clip_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states.playing(), vec![ClipId { track: 1, clip: 1 }]);
        assert!(!states.get(ClipId { track: 1, clip: 0 }).unwrap().playing);
    }

    #[test]
    fn test_direct_route_reaches_output() {
        let clip = Clip::new(constant_audio(0.25, 2.0), 0.0, 1.0, 0.0);
        let graph = MixGraph::build(&project(clip), &NoEffects, 0.0, RATE, 2).unwrap();
        let (out, peaks) = graph.render(RATE as usize * 4).unwrap();

        assert!((out.channel(0)[1000] - 0.25).abs() < 1e-6);
        assert!((out.channel(1)[1000] - 0.25).abs() < 1e-6);
        // clip stops after one measure
        assert_eq!(out.channel(0)[RATE as usize * 3], 0.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].track_index, 1);
    }

    #[test]
    fn test_clip_gain_is_applied() {
        let clip = Clip::new(constant_audio(0.5, 2.0), 0.0, 1.0, 0.0).with_gain(0.0);
        let graph = MixGraph::build(&project(clip), &NoEffects, 0.0, RATE, 2).unwrap();
        let (out, _) = graph.render(RATE as usize).unwrap();
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_master_limiter_catches_overs() {
        let clip = Clip::new(constant_audio(1.0, 2.0), 0.0, 1.0, 0.0);
        let mut p = project(clip.clone());
        p.tracks.insert(2, Track::default().with_clip(clip));
        let p = Project::from_positional(p.tracks, 120.0, 1.0);

        let graph = MixGraph::build(&p, &NoEffects, 0.0, RATE, 2).unwrap();
        let (out, _) = graph.render(RATE as usize).unwrap();
        // two full-scale tracks sum to 2.0 before the limiter
        assert!(out.peak() < 0.9);
    }

    #[test]
    fn test_volume_chain_routes_through_effects() {
        let clip = Clip::new(constant_audio(0.5, 2.0), 0.0, 1.0, 0.0);
        let mut p = project(clip);
        p.tracks[1]
            .effects
            .insert(VOLUME_GAIN_KEY.to_string(), Automation::constant(-96.0));

        let graph = MixGraph::build(&p, &VolumeAutomation::default(), 0.0, RATE, 2).unwrap();
        assert_eq!(graph.tracks()[1].chain.as_ref().map(|c| c.len()), Some(1));
        let (out, peaks) = graph.render(RATE as usize).unwrap();
        assert_eq!(out.peak(), 0.0);
        // chained tracks bypass the analyser
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_builder_sees_every_routed_track() {
        struct Counting(AtomicUsize);
        impl ChainBuilder for Counting {
            fn build_chain(&self, _: &Track, i: usize, _: f64, _: f64, bus: Bus) -> Option<EffectChain> {
                self.0.fetch_add(1, Ordering::SeqCst);
                assert_eq!(bus == Bus::Output, i == 0);
                None
            }
        }
        let builder = Counting(AtomicUsize::new(0));
        let clip = Clip::new(constant_audio(0.5, 2.0), 0.0, 1.0, 0.0);
        MixGraph::build(&project(clip), &builder, 0.0, RATE, 2).unwrap();
        assert_eq!(builder.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_play_source_offsets_into_source() {
        let ramp: Vec<f32> = (0..RATE as usize).map(|i| i as f32).collect();
        let audio = Arc::new(AudioBuffer::from_channels(vec![ramp], RATE).unwrap());
        let instruction = PlaybackInstruction {
            audio,
            when: 0.5,
            offset: 0.25,
            duration: 0.1,
            placement: crate::engine::timeline::Placement::Future,
            pitch_shifted: false,
        };
        let mut out = AudioBuffer::new(RATE as usize, ChannelLayout::Stereo);
        play_source(&instruction, 1.0, &mut out);

        let start = RATE as usize / 2;
        assert_eq!(out.channel(0)[start - 1], 0.0);
        assert_eq!(out.channel(0)[start], (RATE / 4) as f32);
        assert_eq!(out.channel(1)[start + 10], (RATE / 4 + 10) as f32);
        let end = start + (0.1 * RATE as f64).round() as usize;
        assert_eq!(out.channel(0)[end], 0.0);
    }
}
