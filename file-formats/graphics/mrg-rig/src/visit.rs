//! Read-only traversal for interchange emitters

use crate::joint::Joint;

/// Callbacks for a depth-first walk over a finished skeleton
///
/// Emitters that write nested markup open an element in
/// [`enter_joint`](Self::enter_joint) and close it in
/// [`leave_joint`](Self::leave_joint). `depth` is 0 for the root.
pub trait SkeletonVisitor {
    fn enter_joint(&mut self, joint: &Joint, depth: usize);

    fn leave_joint(&mut self, _joint: &Joint, _depth: usize) {}
}
