//! Skeleton joints and their bind-pose transforms

use glam::{DMat3, DMat4, DVec3};

use crate::math;
use crate::track::AnimationTrack;

/// Axis scales below this are treated as degenerate by the scaling fix
pub const MIN_BIND_SCALE: f64 = 0.01;

/// Bind-pose inputs for one joint
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct BindPose {
    pub scale: DVec3,
    pub position: DVec3,
    /// XYZ Euler angles in radians
    pub rotation: DVec3,
}

impl BindPose {
    pub fn new(scale: DVec3, position: DVec3, rotation: DVec3) -> Self {
        Self {
            scale,
            position,
            rotation,
        }
    }

    /// Scale/rotation/translation product with no parent correction
    pub fn local_matrix(&self) -> DMat4 {
        math::transform_skewed(self.position, self.rotation, self.scale)
    }
}

impl Default for BindPose {
    fn default() -> Self {
        Self::new(DVec3::ONE, DVec3::ZERO, DVec3::ZERO)
    }
}

/// One node of a skeleton
///
/// Joints live in the owning [`Skeleton`](crate::skeleton::Skeleton)'s arena,
/// indexed by traversal order. `parent` and `children` are indices into that
/// arena; the parent link is only ever used for upward queries.
#[derive(Debug, Clone)]
pub struct Joint {
    id: u16,
    order: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    bind: BindPose,
    cumulative_scale: DVec3,
    local: DMat4,
    world: DMat4,
    inverse_bind: DMat4,
    posed_frame: Option<u32>,
    track: AnimationTrack,
}

impl Joint {
    /// Create a joint in its bind pose
    ///
    /// With a parent, the cumulative scale picks up the parent's, and the
    /// local matrix is skew-corrected for the parent's cumulative scale
    /// before the world matrix is composed.
    pub fn new(id: u16, order: usize, bind: BindPose, parent: Option<&Joint>) -> Self {
        let mut joint = Self {
            id,
            order,
            parent: parent.map(Joint::order),
            children: Vec::new(),
            bind,
            cumulative_scale: bind.scale,
            local: DMat4::IDENTITY,
            world: DMat4::IDENTITY,
            inverse_bind: DMat4::IDENTITY,
            posed_frame: None,
            track: AnimationTrack::new(),
        };
        joint.rebind(parent);
        joint
    }

    /// Persistent ID from the source data
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Depth-first traversal index, 0 for the root
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn bind_pose(&self) -> &BindPose {
        &self.bind
    }

    /// Product of this joint's bind scale with every ancestor's
    pub fn cumulative_scale(&self) -> DVec3 {
        self.cumulative_scale
    }

    /// Local matrix currently installed (bind pose or an animation frame)
    pub fn local_transform(&self) -> &DMat4 {
        &self.local
    }

    pub fn world_transform(&self) -> &DMat4 {
        &self.world
    }

    pub fn inverse_bind_transform(&self) -> &DMat4 {
        &self.inverse_bind
    }

    /// Frame this joint is posed at, or None in bind pose
    pub fn posed_frame(&self) -> Option<u32> {
        self.posed_frame
    }

    pub fn track(&self) -> &AnimationTrack {
        &self.track
    }

    /// Place a mesh position in model space
    pub fn transform_vertex(&self, vertex: DVec3) -> DVec3 {
        self.world.transform_point3(vertex)
    }

    /// Transform a normal or direction
    ///
    /// Uses the transpose of the inverse-bind linear part, i.e. the
    /// inverse-transpose of the world linear part, so non-uniform scale does
    /// not skew normals.
    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        DMat3::from_mat4(self.inverse_bind).transpose() * vector
    }

    pub(crate) fn add_child(&mut self, child: usize) {
        self.children.push(child);
    }

    pub(crate) fn track_mut(&mut self) -> &mut AnimationTrack {
        &mut self.track
    }

    /// Recompute cumulative scale, local, world and inverse-bind from the bind pose
    pub(crate) fn rebind(&mut self, parent: Option<&Joint>) {
        self.local = self.bind.local_matrix();
        self.cumulative_scale = self.bind.scale;

        if let Some(parent) = parent {
            self.cumulative_scale *= parent.cumulative_scale;
            math::apply_skew_correction(&mut self.local, parent.cumulative_scale);
        }

        self.posed_frame = None;
        self.update_world(parent);
    }

    /// Install an animation frame's local matrix and recompose
    pub(crate) fn pose(&mut self, frame: u32, parent: Option<&Joint>) {
        if let Some(local) = self.track.transform_at(frame) {
            self.local = local;
            self.posed_frame = Some(frame);
        }
        self.update_world(parent);
    }

    fn update_world(&mut self, parent: Option<&Joint>) {
        self.world = match parent {
            Some(parent) => parent.world * self.local,
            None => self.local,
        };
        self.inverse_bind = math::inverse_bind(&self.world);
    }

    /// Replace degenerate bind scale axes with 1.0
    ///
    /// Returns true when any axis changed. Matrices are not recomposed here;
    /// the skeleton recomposes the affected subtree afterwards.
    pub(crate) fn fix_scale(&mut self) -> bool {
        let mut changed = false;
        for axis in 0..3 {
            if self.bind.scale[axis] < MIN_BIND_SCALE {
                self.bind.scale[axis] = 1.0;
                changed = true;
            }
        }
        changed
    }
}
