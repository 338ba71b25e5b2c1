//! Model headers and the rig loading pipeline

use crate::error::{MrgError, Result};
use crate::quirks::{QuirkTable, asset_index};
use crate::reader::{ByteReader, resolve_offset};
use crate::skeleton::Skeleton;

/// Identifier at the start of every model header
pub const MODEL_MAGIC: u32 = 0x0030_4852;

/// Playback rate of merged animation frames
pub const FRAMES_PER_SECOND: u32 = 30;

/// Seconds from the start of the merged animation to `frame`
pub fn frame_time(frame: u32) -> f64 {
    f64::from(frame) / f64::from(FRAMES_PER_SECOND)
}

/// An offset/size pair locating a model section relative to the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Section {
    pub offset: i32,
    pub size: i32,
}

impl Section {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let offset = reader.read_i32()?;
        let size = reader.read_i32()?;
        Ok(Self { offset, size })
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Model header
///
/// Only the bone and animation offsets are consumed here; the remaining
/// sections belong to mesh and texture extraction and are exposed as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub texture_offset: i32,
    pub animation_offset: i32,
    pub bones: Section,
    pub mesh_map: Section,
    pub mesh: Section,
    pub transparent_mesh_map: Section,
    pub transparent_mesh: Section,
    pub texture_list: Section,
    pub texture_joint_map: Section,
    pub transparent_texture_joint_map: Section,
    pub texture_region_map: Section,
}

impl ModelHeader {
    pub const SIZE: usize = 0x68;

    pub fn read(buf: &[u8], base: usize) -> Result<Self> {
        let mut reader = ByteReader::at(buf, base, Self::SIZE)?;

        let magic = reader.read_u32()?;
        if magic != MODEL_MAGIC {
            return Err(MrgError::InvalidMagic {
                expected: MODEL_MAGIC,
                actual: magic,
            });
        }

        let _unknown = reader.read_u32()?;
        let texture_offset = reader.read_i32()?;
        let animation_offset = reader.read_i32()?;
        let bones = Section::read(&mut reader)?;
        let mesh_map = Section::read(&mut reader)?;
        let mesh = Section::read(&mut reader)?;
        let transparent_mesh_map = Section::read(&mut reader)?;
        let transparent_mesh = Section::read(&mut reader)?;
        let texture_list = Section::read(&mut reader)?;
        let texture_joint_map = Section::read(&mut reader)?;
        let transparent_texture_joint_map = Section::read(&mut reader)?;
        let texture_region_map = Section::read(&mut reader)?;
        // 4 unknown words
        reader.skip(16)?;

        Ok(Self {
            texture_offset,
            animation_offset,
            bones,
            mesh_map,
            mesh,
            transparent_mesh_map,
            transparent_mesh,
            texture_list,
            texture_joint_map,
            transparent_texture_joint_map,
            texture_region_map,
        })
    }
}

/// A model's skeleton with every animation block merged
#[derive(Debug, Clone)]
pub struct Rig {
    header: ModelHeader,
    base: usize,
    skeleton: Skeleton,
    blocks_merged: usize,
}

impl Rig {
    /// Load the rig of the model whose header starts at `base`
    ///
    /// Builds the skeleton, merges the animation chain using the quirks of
    /// the asset containing `base`, then fixes degenerate bind scales.
    /// Animations are merged against the unfixed bind pose.
    pub fn load(buf: &[u8], base: usize, quirk_table: &QuirkTable) -> Result<Self> {
        let header = ModelHeader::read(buf, base)?;
        let asset = asset_index(base);
        let quirks = quirk_table.for_offset(base);

        log::debug!("Loading rig for asset {asset} at {base:#x}: {quirks:?}");

        let mut skeleton = Skeleton::from_buffer(buf, resolve_offset(base, header.bones.offset)?)?;
        let blocks_merged =
            skeleton.load_animations(buf, resolve_offset(base, header.animation_offset)?, &quirks)?;
        skeleton.fix_scaling();

        log::info!(
            "Asset {}: {} joints, {} animation blocks, {} frames",
            asset,
            skeleton.joint_count(),
            blocks_merged,
            skeleton.frames().len()
        );

        Ok(Self {
            header,
            base,
            skeleton,
            blocks_merged,
        })
    }

    pub fn header(&self) -> &ModelHeader {
        &self.header
    }

    /// Offset of the model header in the archive
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn asset_index(&self) -> u32 {
        asset_index(self.base)
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn into_skeleton(self) -> Skeleton {
        self.skeleton
    }

    /// Number of animation blocks merged into the tracks
    pub fn blocks_merged(&self) -> usize {
        self.blocks_merged
    }

    /// Frames a consumer can pose, in order
    pub fn frames(&self) -> &[u32] {
        self.skeleton.frames()
    }

    /// Pose the whole skeleton at `frame`
    pub fn pose(&mut self, frame: u32) {
        self.skeleton.set_frame(frame);
    }
}
