//! Skeletal rigs and keyframe animation for MRG model archives.
//!
//! A model in the archive carries a bone block, a linked tree of joint
//! records, and a chain of animation blocks whose position, rotation and
//! scale channels are keyed independently. This crate rebuilds the joint
//! tree, composes bind-pose and inverse-bind matrices under non-uniform
//! parent scale, and resamples every animation block into one dense track
//! per joint so that a skeleton can be posed at any frame.
//!
//! # Examples
//!
//! ```no_run
//! use mrg_rig::{QuirkTable, Rig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let archive = std::fs::read("MRG.BIN")?;
//! let mut rig = Rig::load(&archive, 0x2A_0000, &QuirkTable::builtin())?;
//!
//! let frames = rig.frames().to_vec();
//! for frame in frames {
//!     rig.pose(frame);
//!     if let Some(joint) = rig.skeleton().find(3) {
//!         let vertex = joint.transform_vertex(glam::DVec3::ZERO);
//!         println!("{:.3} {vertex}", mrg_rig::frame_time(frame));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod animation;
pub mod error;
pub mod joint;
pub mod math;
pub mod model;
pub mod quirks;
pub mod reader;
pub mod skeleton;
pub mod track;
pub mod visit;

#[cfg(test)]
#[path = "../tests/common/fixtures.rs"]
mod fixtures;

pub use animation::{AnimationBlock, AnimationHeader, JointKeyframes, Keyframe, MergeOptions};
pub use error::{MrgError, Result};
pub use joint::{BindPose, Joint};
pub use model::{FRAMES_PER_SECOND, ModelHeader, Rig, frame_time};
pub use quirks::{AssetQuirks, QuirkTable, ScalingFixMode};
pub use skeleton::{JointRecord, Skeleton};
pub use track::{AnimationTrack, TrackSample};
pub use visit::SkeletonVisitor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
