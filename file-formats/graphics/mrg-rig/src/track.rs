//! Dense per-joint animation tracks
//!
//! A track holds one composed local matrix and one cumulative scale per
//! frame. Successive animation blocks are appended back to back with a
//! [`BLOCK_GAP`] frame separation, so frame numbers are strictly increasing
//! but not contiguous across block boundaries.

use glam::{DMat4, DVec3};

/// Frames left between the end of one merged block and the start of the next
pub const BLOCK_GAP: u32 = 60;

/// Most frames a single animation block may declare
pub const MAX_FRAMES: u32 = 0x4000;

/// One sample of a dense track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub frame: u32,
    pub transform: DMat4,
    pub cumulative_scale: DVec3,
}

/// Uniformly resampled animation output for one joint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationTrack {
    frames: Vec<u32>,
    transforms: Vec<DMat4>,
    scales: Vec<DVec3>,
}

impl AnimationTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Frame numbers, strictly increasing
    pub fn frames(&self) -> &[u32] {
        &self.frames
    }

    /// Composed local matrices, parallel to [`frames`](Self::frames)
    pub fn transforms(&self) -> &[DMat4] {
        &self.transforms
    }

    /// Cumulative scales, parallel to [`frames`](Self::frames)
    pub fn scales(&self) -> &[DVec3] {
        &self.scales
    }

    /// Frame number at which the next merged block starts
    pub fn next_block_start(&self) -> u32 {
        self.frames
            .last()
            .map_or(0, |last| last.saturating_add(BLOCK_GAP))
    }

    pub(crate) fn push(&mut self, frame: u32, transform: DMat4, cumulative_scale: DVec3) {
        debug_assert!(
            self.frames.last().is_none_or(|last| *last < frame),
            "track frames must be strictly increasing"
        );
        self.frames.push(frame);
        self.transforms.push(transform);
        self.scales.push(cumulative_scale);
    }

    /// Index of the sample that applies at `frame`
    ///
    /// Returns the exact match when there is one, otherwise the last sample
    /// before `frame` (step hold). Frames before the first sample resolve to
    /// the first sample. Returns None for an empty track.
    pub fn sample_index(&self, frame: u32) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }

        let after = self.frames.partition_point(|&f| f <= frame);
        Some(after.saturating_sub(1))
    }

    /// Composed local matrix at `frame`
    pub fn transform_at(&self, frame: u32) -> Option<DMat4> {
        self.sample_index(frame).map(|index| self.transforms[index])
    }

    /// Cumulative scale at `frame`
    pub fn scale_at(&self, frame: u32) -> Option<DVec3> {
        self.sample_index(frame).map(|index| self.scales[index])
    }

    pub fn sample(&self, index: usize) -> Option<TrackSample> {
        Some(TrackSample {
            frame: *self.frames.get(index)?,
            transform: *self.transforms.get(index)?,
            cumulative_scale: *self.scales.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = TrackSample> + '_ {
        (0..self.len()).filter_map(|index| self.sample(index))
    }
}
