//! Transform math for joint composition and keyframe interpolation
//!
//! Rotations are stored as Euler angles in radians, ordered X, Y, Z, and
//! compose as `R = Rz * Ry * Rx`. Matrices follow glam's column-vector
//! convention, so a joint's world matrix is `parent_world * local`.
//!
//! Two composition routines exist because a parent's non-uniform scale does
//! not commute with a child's rotation. [`transform_skewed`] is the plain
//! scale/rotation/translation product; [`transform`] additionally rescales
//! each off-diagonal term coupling axis `i` to axis `j` by
//! `parent_scale[i] / parent_scale[j]`.

use std::f64::consts::TAU;

use glam::{DMat3, DMat4, DQuat, DVec3, DVec4};

/// Fixed-point rotation units per full turn
pub const TURN_UNITS: f64 = 65536.0;

/// Below this, an interpolation angle is treated as zero
const ANGLE_EPSILON: f64 = 1e-10;

/// Convert a 1/65536-turn fixed-point angle to radians
pub fn turns_to_radians(units: i32) -> f64 {
    TAU * f64::from(units) / TURN_UNITS
}

/// Convert a fixed-point XYZ rotation triple to radians
pub fn rotation_from_turns(units: [i32; 3]) -> DVec3 {
    DVec3::new(
        turns_to_radians(units[0]),
        turns_to_radians(units[1]),
        turns_to_radians(units[2]),
    )
}

/// Convert XYZ Euler angles to a unit quaternion
pub fn to_quaternion(euler: DVec3) -> DQuat {
    let (sx, cx) = (euler.x * 0.5).sin_cos();
    let (sy, cy) = (euler.y * 0.5).sin_cos();
    let (sz, cz) = (euler.z * 0.5).sin_cos();

    DQuat::from_xyzw(
        sx * cy * cz - cx * sy * sz,
        cx * sy * cz + sx * cy * sz,
        cx * cy * sz - sx * sy * cz,
        cx * cy * cz + sx * sy * sz,
    )
    .normalize()
}

/// Convert a quaternion back to XYZ Euler angles
///
/// The pitch term is clamped to `[-1, 1]` before `asin`, since rounding can
/// push it just past the domain near gimbal lock.
pub fn to_euler(quaternion: DQuat) -> DVec3 {
    let q = quaternion.normalize();

    let x = (2.0 * (q.w * q.x + q.y * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
    let y = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0).asin();
    let z = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z));

    DVec3::new(x, y, z)
}

/// Spherical linear interpolation between two unit quaternions
///
/// With `shortest_path`, a negative dot product flips the target so the
/// blend takes the shorter arc. Without it the raw arc is followed.
pub fn slerp(from: DQuat, to: DQuat, t: f64, shortest_path: bool) -> DQuat {
    let mut dot = from.dot(to).clamp(-1.0, 1.0);
    let mut to = to;

    if shortest_path && dot < 0.0 {
        dot = -dot;
        to = -to;
    }

    let theta = dot.acos();
    let sin_theta = theta.sin();

    let (w_from, w_to) = if sin_theta.abs() < ANGLE_EPSILON {
        (1.0 - t, t)
    } else {
        (
            ((1.0 - t) * theta).sin() / sin_theta,
            (t * theta).sin() / sin_theta,
        )
    };

    let blended = from * w_from + to * w_to;
    let length = blended.length();
    if length > ANGLE_EPSILON && length.is_finite() {
        blended / length
    } else {
        from
    }
}

/// Component-wise linear interpolation of two vectors
pub fn lerp(a: DVec3, b: DVec3, t: f64) -> DVec3 {
    a * (1.0 - t) + b * t
}

/// Compose scale, rotation and translation into a local matrix
pub fn transform_skewed(position: DVec3, rotation: DVec3, scale: DVec3) -> DMat4 {
    let (sx, cx) = rotation.x.sin_cos();
    let (sy, cy) = rotation.y.sin_cos();
    let (sz, cz) = rotation.z.sin_cos();

    DMat4::from_cols(
        DVec4::new(cy * cz, cy * sz, -sy, 0.0) * scale.x,
        DVec4::new(sx * sy * cz - cx * sz, sx * sy * sz + cx * cz, sx * cy, 0.0) * scale.y,
        DVec4::new(cx * sy * cz + sx * sz, cx * sy * sz - sx * cz, cx * cy, 0.0) * scale.z,
        position.extend(1.0),
    )
}

/// Compose a local matrix corrected for the parent's cumulative scale
pub fn transform(position: DVec3, rotation: DVec3, scale: DVec3, parent_scale: DVec3) -> DMat4 {
    let mut matrix = transform_skewed(position, rotation, scale);
    apply_skew_correction(&mut matrix, parent_scale);
    matrix
}

/// Rescale the off-diagonal rotation terms by the parent's axis ratios
///
/// Ratios that are not finite (a parent collapsed to zero on an axis) leave
/// the entry untouched.
pub fn apply_skew_correction(matrix: &mut DMat4, parent_scale: DVec3) {
    let scale = parent_scale.to_array();

    for (i, numerator) in scale.iter().enumerate() {
        let column = matrix.col_mut(i);
        for (j, denominator) in scale.iter().enumerate() {
            if i == j {
                continue;
            }
            let ratio = numerator / denominator;
            if ratio.is_finite() {
                column[j] *= ratio;
            }
        }
    }
}

/// Invert an affine world matrix for skinning
///
/// The linear part is the inverse of the world's upper 3x3; the translation
/// is the world translation carried back through that inverse.
pub fn inverse_bind(world: &DMat4) -> DMat4 {
    let linear = DMat3::from_mat4(*world).inverse();
    let translation = -(linear * world.w_axis.truncate());

    DMat4::from_cols(
        linear.x_axis.extend(0.0),
        linear.y_axis.extend(0.0),
        linear.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}
