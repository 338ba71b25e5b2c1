//! Animation block chains and their merge into the skeleton
//!
//! Blocks follow each other in the archive, each declaring its own byte
//! length. Every block's keyframes are resampled into the joints' dense
//! tracks, with successive blocks separated by
//! [`BLOCK_GAP`](crate::track::BLOCK_GAP) frames.

pub mod block;
pub mod merge;

pub use block::{
    ANIMATION_MAGIC, AnimationBlock, AnimationHeader, AnimationSubheader, ChannelRef,
    EntryLayout, JointEntry,
};
pub use merge::{JointKeyframes, Keyframe, MergeOptions, estimate_scaling_fix};

use crate::error::{MrgError, Result};
use crate::quirks::AssetQuirks;
use crate::reader::resolve_offset;
use crate::skeleton::Skeleton;
use crate::track::MAX_FRAMES;

impl Skeleton {
    /// Merge every animation block in the chain starting at `offset`
    ///
    /// The chain ends at the first header whose identifier does not match or
    /// when too few bytes remain for a header. Blocks declaring a different
    /// joint count are skipped unless `quirks` allows the mismatch. Returns
    /// the number of blocks merged.
    pub fn load_animations(
        &mut self,
        buf: &[u8],
        offset: usize,
        quirks: &AssetQuirks,
    ) -> Result<usize> {
        let mut offset = offset;
        let mut merged = 0;

        while buf.len().saturating_sub(offset) >= AnimationHeader::SIZE {
            let header = AnimationHeader::read(buf, offset)?;
            if !header.is_valid() {
                log::debug!(
                    "Animation chain ends at {:#x} (identifier {:#010x})",
                    offset,
                    header.identifier
                );
                break;
            }

            if header.byte_length <= 0 {
                return Err(MrgError::InvalidBlockLength {
                    offset,
                    length: header.byte_length,
                });
            }
            let next = resolve_offset(offset, header.byte_length)?;

            let count_matches =
                usize::try_from(header.joint_count).is_ok_and(|count| count == self.joint_count());
            if !count_matches && !quirks.allow_joint_count_mismatch {
                log::warn!(
                    "Skipping animation block at {:#x}: {} joints, skeleton has {}",
                    offset,
                    header.joint_count,
                    self.joint_count()
                );
                offset = next;
                continue;
            }

            let block = AnimationBlock::read(buf, offset, header)?;
            let options = MergeOptions {
                shortest_path_rotation: quirks.shortest_path_rotation,
                scaling_fix: quirks.scaling_fix.enabled_for(header.layout_marker),
            };

            log::debug!(
                "Merging animation block at {:#x}: {} frames, {:?}, scaling fix {}",
                offset,
                block.frame_count(),
                block.layout,
                options.scaling_fix
            );

            self.merge_block(buf, &block, &options)?;
            merged += 1;
            offset = next;
        }

        Ok(merged)
    }

    /// Decode one block's keyframes and merge them
    ///
    /// All joints are decoded before any track is touched, so a decode error
    /// leaves the skeleton unchanged. Joints without an entry in the block
    /// hold their bind pose for its duration.
    pub fn merge_block(
        &mut self,
        buf: &[u8],
        block: &AnimationBlock,
        options: &MergeOptions,
    ) -> Result<()> {
        let keyframes = (0..self.joint_count())
            .map(|order| {
                block
                    .keyframes(buf, order)
                    .map(Option::unwrap_or_default)
            })
            .collect::<Result<Vec<_>>>()?;

        self.merge_animation(&keyframes, block.frame_count(), options)
    }

    /// Resample decoded keyframes, indexed by traversal order, into dense tracks
    ///
    /// The block starts [`BLOCK_GAP`](crate::track::BLOCK_GAP) frames after
    /// the root's last frame, or at 0 for the first block. Missing entries are
    /// treated as static joints. Fails without touching any track when
    /// `frame_count` exceeds [`MAX_FRAMES`] or the block would run past the
    /// last representable frame.
    pub fn merge_animation(
        &mut self,
        keyframes: &[JointKeyframes],
        frame_count: u32,
        options: &MergeOptions,
    ) -> Result<()> {
        if frame_count > MAX_FRAMES {
            return Err(MrgError::ValidationError(format!(
                "{frame_count} frames exceed the per-block limit of {MAX_FRAMES}"
            )));
        }
        let base_frame = self.root().track().next_block_start();
        if base_frame.checked_add(frame_count).is_none() {
            return Err(MrgError::ValidationError(format!(
                "{frame_count} frames starting at frame {base_frame} overflow the frame range"
            )));
        }
        let no_motion = JointKeyframes::default();

        for order in 0..self.joint_count() {
            let keys = keyframes.get(order).unwrap_or(&no_motion);
            let (joint, parent) = self.joint_and_parent_mut(order);
            merge::merge_joint(joint, parent, keys, base_frame, frame_count, options);
        }
        Ok(())
    }
}
