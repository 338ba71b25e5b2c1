//! Skeleton trees decoded from joint records
//!
//! Joint records carry no count. Each record links to its first child and
//! its next sibling through offsets relative to the start of the bone block,
//! with zero meaning "none". The tree is recovered by walking those links
//! child-first, which yields a depth-first pre-order numbering. Both the
//! build and the visitor walk use an explicit work stack, so tree depth is
//! bounded by [`MAX_JOINTS`] rather than the call stack.

use std::collections::HashSet;
use std::ops::Range;

use glam::{DMat4, DVec3};

use crate::error::{MrgError, Result};
use crate::joint::{BindPose, Joint};
use crate::math;
use crate::reader::{ByteReader, resolve_offset};
use crate::visit::SkeletonVisitor;

/// Upper bound on joints in one skeleton
pub const MAX_JOINTS: usize = 4096;

/// A joint record as stored in the bone block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointRecord {
    pub scale: [f64; 3],
    pub id: u16,
    /// Fixed-point XYZ rotation, 1/65536 of a turn
    pub rotation: [i32; 3],
    pub child_offset: i32,
    pub position: [f64; 3],
    pub sibling_offset: i32,
}

impl JointRecord {
    pub const SIZE: usize = 0x40;

    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = ByteReader::at(buf, offset, Self::SIZE)?;

        let scale = reader.read_f32x3()?;
        let _padding = reader.read_i16()?;
        let id = reader.read_u16()?;
        let rotation = reader.read_i32x3()?;
        let child_offset = reader.read_i32()?;
        let position = reader.read_f32x3()?;
        let sibling_offset = reader.read_i32()?;
        // 4 reserved floats
        reader.skip(16)?;

        Ok(Self {
            scale,
            id,
            rotation,
            child_offset,
            position,
            sibling_offset,
        })
    }

    pub fn bind_pose(&self) -> BindPose {
        BindPose::new(
            DVec3::from_array(self.scale),
            DVec3::from_array(self.position),
            math::rotation_from_turns(self.rotation),
        )
    }
}

/// State threaded through one skeleton build
struct BuildContext<'a> {
    buf: &'a [u8],
    base: usize,
    joints: Vec<Joint>,
    visited: HashSet<usize>,
}

impl<'a> BuildContext<'a> {
    fn new(buf: &'a [u8], base: usize) -> Self {
        Self {
            buf,
            base,
            joints: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Traversal order the next joint receives
    fn next_order(&self) -> usize {
        self.joints.len()
    }

    /// Walk child and sibling links from the root record
    ///
    /// Each pending link carries the parent its record attaches to. A
    /// record's sibling link is pushed before its child link so the child
    /// subtree is numbered first.
    fn build(&mut self) -> Result<()> {
        let mut pending: Vec<(i32, Option<usize>)> = vec![(0, None)];

        while let Some((relative, parent)) = pending.pop() {
            let offset = resolve_offset(self.base, relative)?;
            if !self.visited.insert(offset) {
                return Err(MrgError::CyclicJointLink { offset });
            }
            if self.joints.len() >= MAX_JOINTS {
                return Err(MrgError::TooManyJoints(MAX_JOINTS));
            }

            let record = JointRecord::read(self.buf, offset)?;
            let order = self.next_order();
            let parent_joint = parent.and_then(|index| self.joints.get(index));
            let joint = Joint::new(record.id, order, record.bind_pose(), parent_joint);

            log::trace!(
                "Joint {} (id {}) at {:#x}, parent {:?}",
                order,
                record.id,
                offset,
                parent
            );

            self.joints.push(joint);
            if let Some(parent) = parent.and_then(|index| self.joints.get_mut(index)) {
                parent.add_child(order);
            }

            if record.sibling_offset != 0 {
                if parent.is_none() {
                    return Err(MrgError::ValidationError(format!(
                        "root joint at {offset:#x} links a sibling; a skeleton has one root"
                    )));
                }
                pending.push((record.sibling_offset, parent));
            }
            if record.child_offset != 0 {
                pending.push((record.child_offset, Some(order)));
            }
        }

        Ok(())
    }
}

/// Pending step of a visitor walk
enum WalkStep {
    Enter(usize, usize),
    Leave(usize, usize),
}

/// A joint tree with a single root
///
/// Joints are stored in traversal order, so a joint's index is its
/// [`order`](Joint::order) and every parent precedes its children.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
}

impl Skeleton {
    /// Build a skeleton from the bone block starting at `offset`
    ///
    /// The root record sits at the start of the block.
    pub fn from_buffer(buf: &[u8], offset: usize) -> Result<Self> {
        let mut context = BuildContext::new(buf, offset);
        context.build()?;

        log::debug!(
            "Built skeleton with {} joints from bone block at {:#x}",
            context.joints.len(),
            offset
        );

        Ok(Self {
            joints: context.joints,
        })
    }

    /// Number of joints, one more than the highest traversal order
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    /// All joints in traversal order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Persistent IDs in traversal order
    pub fn joint_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.joints.iter().map(Joint::id)
    }

    /// First joint in depth-first order with the given persistent ID
    pub fn find(&self, id: u16) -> Option<&Joint> {
        self.joints.iter().find(|joint| joint.id() == id)
    }

    /// Joint with the given traversal order
    pub fn find_by_order(&self, order: usize) -> Option<&Joint> {
        self.joints.get(order)
    }

    /// First joint under `start` (inclusive) with the given persistent ID
    pub fn find_in_subtree(&self, start: usize, id: u16) -> Option<&Joint> {
        self.joints[self.subtree(start)]
            .iter()
            .find(|joint| joint.id() == id)
    }

    /// Joint with the given traversal order, if it lies under `start`
    pub fn find_by_order_in_subtree(&self, start: usize, order: usize) -> Option<&Joint> {
        if self.subtree(start).contains(&order) {
            self.joints.get(order)
        } else {
            None
        }
    }

    /// Indices of `start` and all its descendants, in pre-order
    ///
    /// Pre-order storage keeps every subtree contiguous: it ends after the
    /// joint reached by following last children down from `start`. Empty
    /// when `start` is out of range.
    pub fn subtree(&self, start: usize) -> Range<usize> {
        if start >= self.joints.len() {
            return 0..0;
        }

        let mut last = start;
        while let Some(&child) = self.joints[last].children().last() {
            last = child;
        }
        start..last + 1
    }

    /// Split borrow of a joint and its already-updated parent
    pub(crate) fn joint_and_parent_mut(&mut self, index: usize) -> (&mut Joint, Option<&Joint>) {
        let (before, rest) = self.joints.split_at_mut(index);
        let joint = &mut rest[0];
        let parent = joint.parent().and_then(|parent| before.get(parent));
        (joint, parent)
    }

    /// Recompose bind-pose matrices for `start` and its descendants
    pub fn update_tree(&mut self, start: usize) {
        for index in self.subtree(start) {
            let (joint, parent) = self.joint_and_parent_mut(index);
            joint.rebind(parent);
        }
    }

    /// Replace degenerate bind scales
    ///
    /// Walks down single-child chains from the root to the first joint with
    /// several children and fixes that subtree. If that joint is the root
    /// itself, each of its children is fixed instead so the root keeps its
    /// own scale.
    pub fn fix_scaling(&mut self) {
        let mut current = 0;
        while let [only_child] = self.joints[current].children() {
            current = *only_child;
        }

        let starts = if current == 0 {
            self.joints[0].children().to_vec()
        } else {
            vec![current]
        };

        for start in starts {
            let mut changed = 0;
            for index in self.subtree(start) {
                if self.joints[index].fix_scale() {
                    changed += 1;
                }
            }
            if changed > 0 {
                log::debug!("Fixed degenerate scale on {changed} joints under joint {start}");
            }
            self.update_tree(start);
        }
    }

    /// Pose the whole skeleton at an animation frame
    pub fn set_frame(&mut self, frame: u32) {
        self.set_animation_frame(0, frame);
    }

    /// Pose `start` and its descendants at an animation frame
    ///
    /// Joints without an animation track keep their current local matrix but
    /// still follow their parent.
    pub fn set_animation_frame(&mut self, start: usize, frame: u32) {
        for index in self.subtree(start) {
            let (joint, parent) = self.joint_and_parent_mut(index);
            joint.pose(frame, parent);
        }
    }

    /// Frames of the merged animation, taken from the root's track
    pub fn frames(&self) -> &[u32] {
        self.root().track().frames()
    }

    /// Inverse-bind matrices in traversal order
    pub fn inverse_bind_matrices(&self) -> Vec<DMat4> {
        self.joints
            .iter()
            .map(|joint| *joint.inverse_bind_transform())
            .collect()
    }

    /// Visit every joint depth-first, root first
    pub fn walk<V: SkeletonVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut steps = vec![WalkStep::Enter(0, 0)];

        while let Some(step) = steps.pop() {
            match step {
                WalkStep::Enter(index, depth) => {
                    let Some(joint) = self.joints.get(index) else {
                        continue;
                    };
                    visitor.enter_joint(joint, depth);
                    steps.push(WalkStep::Leave(index, depth));
                    steps.extend(
                        joint
                            .children()
                            .iter()
                            .rev()
                            .map(|&child| WalkStep::Enter(child, depth + 1)),
                    );
                }
                WalkStep::Leave(index, depth) => visitor.leave_joint(&self.joints[index], depth),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn joints_mut(&mut self) -> &mut [Joint] {
        &mut self.joints
    }
}
