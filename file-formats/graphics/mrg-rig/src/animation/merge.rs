//! Keyframe resampling into dense per-joint tracks
//!
//! Position, rotation and scale are keyed independently, each with its own
//! irregular spacing. Merging walks every output frame of a block, samples
//! each channel at that frame and composes one local matrix against the
//! parent's cumulative scale at the same frame. Parents are merged before
//! their children so the inherited scale is always available.

use glam::DVec3;

use crate::joint::Joint;
use crate::math;

/// Relative deviation from 1.0 below which the scaling fix is dropped
pub const SCALING_FIX_TOLERANCE: f64 = 0.01;

/// One decoded keyframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Frame index within the block
    pub frame: i32,
    /// Position, scale, or XYZ Euler rotation in radians
    pub value: DVec3,
}

/// Raw keyframe streams of one joint for one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointKeyframes {
    pub position: Vec<Keyframe>,
    pub rotation: Vec<Keyframe>,
    pub scale: Vec<Keyframe>,
}

impl JointKeyframes {
    /// True when no channel carries keys
    pub fn is_static(&self) -> bool {
        self.position.is_empty() && self.rotation.is_empty() && self.scale.is_empty()
    }
}

/// Per-block switches that change how channels are resampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    /// Interpolate rotations along the shorter quaternion arc
    pub shortest_path_rotation: bool,
    /// Estimate and divide out a position scaling factor
    pub scaling_fix: bool,
}

#[derive(Debug, Clone, Copy)]
enum Interpolation {
    Linear,
    Spherical { shortest_path: bool },
}

impl Interpolation {
    fn blend(self, from: DVec3, to: DVec3, t: f64) -> DVec3 {
        match self {
            Self::Linear => math::lerp(from, to, t),
            Self::Spherical { shortest_path } => math::to_euler(math::slerp(
                math::to_quaternion(from),
                math::to_quaternion(to),
                t,
                shortest_path,
            )),
        }
    }
}

/// Forward-only sampler over one keyframe stream
///
/// Frames must be queried in increasing order. Before the first key the first
/// key is held; past the last key the last key is held, which also makes a
/// single-key stream constant.
#[derive(Debug)]
struct ChannelCursor<'a> {
    keys: &'a [Keyframe],
    current: usize,
    interpolation: Interpolation,
}

impl<'a> ChannelCursor<'a> {
    fn new(keys: &'a [Keyframe], interpolation: Interpolation) -> Self {
        Self {
            keys,
            current: 0,
            interpolation,
        }
    }

    /// Value at `frame`, or None for an empty stream
    fn sample(&mut self, frame: i32) -> Option<DVec3> {
        while self
            .keys
            .get(self.current + 1)
            .is_some_and(|next| next.frame <= frame)
        {
            self.current += 1;
        }

        let key = self.keys.get(self.current)?;
        if frame <= key.frame {
            return Some(key.value);
        }

        let Some(next) = self.keys.get(self.current + 1) else {
            return Some(key.value);
        };

        let t = (f64::from(frame) - f64::from(key.frame))
            / (f64::from(next.frame) - f64::from(key.frame));
        Some(self.interpolation.blend(key.value, next.value, t))
    }
}

/// Estimate the per-axis factor dividing out the "stretchy limbs" artifact
///
/// Compares the first position key with the bind position carried through
/// the parent's scale. Axes with an unusable ratio borrow from another axis;
/// all axes then take the largest ratio. Returns ONE when the deviation is
/// within [`SCALING_FIX_TOLERANCE`] or the joint is one of the first two in
/// traversal order.
pub fn estimate_scaling_fix(
    first_position: DVec3,
    bind_position: DVec3,
    parent_scale: DVec3,
    order: usize,
) -> DVec3 {
    let usable = |ratio: f64| ratio.is_finite() && ratio != 0.0;

    let mut ratio = (first_position / (bind_position * parent_scale)).to_array();
    if !usable(ratio[0]) {
        ratio[0] = if usable(ratio[1]) { ratio[1] } else { ratio[2] };
    }
    if !usable(ratio[0]) {
        return DVec3::ONE;
    }
    for axis in 1..3 {
        if !usable(ratio[axis]) {
            ratio[axis] = ratio[0];
        }
    }

    let largest = ratio[0].max(ratio[1]).max(ratio[2]);
    if order > 1 && (largest - 1.0).abs() > SCALING_FIX_TOLERANCE {
        DVec3::splat(largest)
    } else {
        DVec3::ONE
    }
}

/// Parent cumulative scale at `frame`, ONE for the root
fn inherited_scale(parent: Option<&Joint>, frame: u32) -> DVec3 {
    parent.map_or(DVec3::ONE, |parent| {
        parent
            .track()
            .scale_at(frame)
            .unwrap_or_else(|| parent.cumulative_scale())
    })
}

/// Frames `base_frame..base_frame + frame_count`, cut short at `u32::MAX`
fn frame_range(base_frame: u32, frame_count: u32) -> std::ops::Range<u32> {
    base_frame..base_frame.saturating_add(frame_count)
}

/// Append one block's worth of dense samples to a joint's track
///
/// `parent` must already hold this block's samples. Frames are appended from
/// `base_frame` to `base_frame + frame_count - 1`; frames past `u32::MAX`
/// are not produced.
pub fn merge_joint(
    joint: &mut Joint,
    parent: Option<&Joint>,
    keys: &JointKeyframes,
    base_frame: u32,
    frame_count: u32,
    options: &MergeOptions,
) {
    let bind = *joint.bind_pose();

    if keys.is_static() {
        // Bind pose, re-corrected for the parent's scale at each frame
        for frame in frame_range(base_frame, frame_count) {
            let parent_scale = inherited_scale(parent, frame);
            let local = math::transform(bind.position, bind.rotation, bind.scale, parent_scale);
            joint
                .track_mut()
                .push(frame, local, parent_scale * bind.scale);
        }
        return;
    }

    let mut positions = ChannelCursor::new(&keys.position, Interpolation::Linear);
    let mut rotations = ChannelCursor::new(
        &keys.rotation,
        Interpolation::Spherical {
            shortest_path: options.shortest_path_rotation,
        },
    );
    let mut scales = ChannelCursor::new(&keys.scale, Interpolation::Linear);

    let scaling_fix = match keys.position.first() {
        Some(first) if options.scaling_fix => {
            let fix = estimate_scaling_fix(
                first.value,
                bind.position,
                inherited_scale(parent, base_frame),
                joint.order(),
            );
            if fix != DVec3::ONE {
                log::trace!(
                    "Joint {} (id {}) positions scaled down by {:.4}",
                    joint.order(),
                    joint.id(),
                    fix.x
                );
            }
            fix
        }
        _ => DVec3::ONE,
    };

    for frame in frame_range(base_frame, frame_count) {
        let i = frame - base_frame;
        let block_frame = i32::try_from(i).unwrap_or(i32::MAX);
        let parent_scale = inherited_scale(parent, frame);

        let rotation = rotations.sample(block_frame).unwrap_or(bind.rotation);
        let scale = scales.sample(block_frame).unwrap_or(bind.scale);
        let position = positions
            .sample(block_frame)
            .map_or(bind.position, |position| {
                position / (parent_scale * scaling_fix)
            });

        let local = math::transform(position, rotation, scale, parent_scale);
        joint.track_mut().push(frame, local, parent_scale * scale);
    }
}
