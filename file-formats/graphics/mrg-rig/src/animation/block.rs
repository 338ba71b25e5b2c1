//! Animation block records
//!
//! A block is a header, a subheader, a table of per-joint channel entries and
//! the keyframe data those entries point at. All offsets inside a block are
//! relative to the block start.

use glam::DVec3;

use crate::error::{MrgError, Result};
use crate::math;
use crate::reader::{ByteReader, resolve_offset};
use crate::track::MAX_FRAMES;

use super::merge::{JointKeyframes, Keyframe};

/// Identifier carried by every animation block header
pub const ANIMATION_MAGIC: u32 = 0x1A54_4F4D;

/// Size of one keyframe record
pub const KEYFRAME_SIZE: usize = 0x10;

/// Animation block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHeader {
    pub identifier: u32,
    /// Total block size; the next block starts this many bytes later
    pub byte_length: i32,
    /// Encoding marker; see [`ALL_POSITIONS_ANIMATED`](crate::quirks::ALL_POSITIONS_ANIMATED)
    pub layout_marker: u32,
    pub joint_count: i32,
    pub subheader_offset: i32,
}

impl AnimationHeader {
    pub const SIZE: usize = 0x1C;

    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = ByteReader::at(buf, offset, Self::SIZE)?;

        let identifier = reader.read_u32()?;
        let byte_length = reader.read_i32()?;
        let _reserved = reader.read_u32()?;
        let layout_marker = reader.read_u32()?;
        let joint_count = reader.read_i32()?;
        let subheader_offset = reader.read_i32()?;
        let _reserved = reader.read_u32()?;

        Ok(Self {
            identifier,
            byte_length,
            layout_marker,
            joint_count,
            subheader_offset,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.identifier == ANIMATION_MAGIC
    }
}

/// Animation block subheader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSubheader {
    pub entry_table_offset: i32,
    pub frame_count: i32,
    pub data_offset: i32,
}

impl AnimationSubheader {
    pub const SIZE: usize = 0x10;

    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = ByteReader::at(buf, offset, Self::SIZE)?;

        let entry_table_offset = reader.read_i32()?;
        let frame_count = reader.read_i32()?;
        let _reserved = reader.read_i32()?;
        let data_offset = reader.read_i32()?;

        Ok(Self {
            entry_table_offset,
            frame_count,
            data_offset,
        })
    }
}

/// Shape of the per-joint entry table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLayout {
    /// Position and rotation channels
    PositionRotation,
    /// Position, rotation and scale channels
    PositionRotationScale,
}

impl EntryLayout {
    pub fn stride(self) -> usize {
        match self {
            Self::PositionRotation => 0x10,
            Self::PositionRotationScale => 0x18,
        }
    }

    /// Scale entries are detected by the table filling the gap up to the data
    fn detect(subheader: &AnimationSubheader, joint_count: usize) -> Self {
        let table_len =
            i64::from(subheader.data_offset) - i64::from(subheader.entry_table_offset);
        let scaled_len = Self::PositionRotationScale.stride() as i64 * joint_count as i64;
        if table_len == scaled_len {
            Self::PositionRotationScale
        } else {
            Self::PositionRotation
        }
    }
}

/// Location of one keyframe channel inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelRef {
    pub offset: i32,
    pub count: i32,
}

impl ChannelRef {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Channel table entry for one joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JointEntry {
    pub position: ChannelRef,
    pub rotation: ChannelRef,
    pub scale: Option<ChannelRef>,
}

impl JointEntry {
    fn read(buf: &[u8], offset: usize, layout: EntryLayout) -> Result<Self> {
        let mut reader = ByteReader::at(buf, offset, layout.stride())?;

        let entry = match layout {
            EntryLayout::PositionRotation => {
                let position_offset = reader.read_i32()?;
                let rotation_offset = reader.read_i32()?;
                let position_count = reader.read_i32()?;
                let rotation_count = reader.read_i32()?;
                Self {
                    position: ChannelRef {
                        offset: position_offset,
                        count: position_count,
                    },
                    rotation: ChannelRef {
                        offset: rotation_offset,
                        count: rotation_count,
                    },
                    scale: None,
                }
            }
            EntryLayout::PositionRotationScale => {
                let position_offset = reader.read_i32()?;
                let rotation_offset = reader.read_i32()?;
                let scale_offset = reader.read_i32()?;
                let position_count = reader.read_i32()?;
                let rotation_count = reader.read_i32()?;
                let scale_count = reader.read_i32()?;
                Self {
                    position: ChannelRef {
                        offset: position_offset,
                        count: position_count,
                    },
                    rotation: ChannelRef {
                        offset: rotation_offset,
                        count: rotation_count,
                    },
                    scale: Some(ChannelRef {
                        offset: scale_offset,
                        count: scale_count,
                    }),
                }
            }
        };

        Ok(entry)
    }
}

/// A decoded animation block header with its channel table
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationBlock {
    pub offset: usize,
    pub header: AnimationHeader,
    pub subheader: AnimationSubheader,
    pub layout: EntryLayout,
    pub entries: Vec<JointEntry>,
}

impl AnimationBlock {
    /// Read the subheader and channel table of a block whose header is valid
    pub fn read(buf: &[u8], offset: usize, header: AnimationHeader) -> Result<Self> {
        let joint_count = usize::try_from(header.joint_count).map_err(|_| {
            MrgError::ParseError(format!(
                "animation block at {offset:#x} declares {} joints",
                header.joint_count
            ))
        })?;

        let subheader_at = resolve_offset(offset, header.subheader_offset)?;
        let subheader = AnimationSubheader::read(buf, subheader_at)?;
        let frames_in_range = u32::try_from(subheader.frame_count)
            .is_ok_and(|frames| frames <= MAX_FRAMES);
        if !frames_in_range {
            return Err(MrgError::ParseError(format!(
                "animation block at {offset:#x} declares {} frames (limit {MAX_FRAMES})",
                subheader.frame_count
            )));
        }

        let layout = EntryLayout::detect(&subheader, joint_count);
        let table_at = resolve_offset(offset, subheader.entry_table_offset)?;

        let mut entries = Vec::with_capacity(joint_count.min(buf.len() / layout.stride()));
        for index in 0..joint_count {
            let entry_at = table_at
                .checked_add(index * layout.stride())
                .ok_or_else(|| MrgError::ParseError("entry table offset overflow".to_string()))?;
            entries.push(JointEntry::read(buf, entry_at, layout)?);
        }

        Ok(Self {
            offset,
            header,
            subheader,
            layout,
            entries,
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.subheader.frame_count.unsigned_abs()
    }

    /// Decode the keyframe streams for the joint at `order`
    ///
    /// Returns None when the block has no entry for that joint. The root
    /// never takes a scale channel.
    pub fn keyframes(&self, buf: &[u8], order: usize) -> Result<Option<JointKeyframes>> {
        let Some(entry) = self.entries.get(order) else {
            return Ok(None);
        };

        let position = self.read_vectors(buf, entry.position)?;
        let rotation = self.read_rotations(buf, entry.rotation)?;
        let scale = match entry.scale {
            Some(channel) if order > 0 => self.read_vectors(buf, channel)?,
            _ => Vec::new(),
        };

        Ok(Some(JointKeyframes {
            position,
            rotation,
            scale,
        }))
    }

    fn channel_records(&self, channel: ChannelRef) -> Result<(usize, usize)> {
        let count = usize::try_from(channel.count).map_err(|_| {
            MrgError::ParseError(format!(
                "animation block at {:#x} has a channel with {} keyframes",
                self.offset, channel.count
            ))
        })?;
        if count == 0 {
            return Ok((0, 0));
        }
        Ok((resolve_offset(self.offset, channel.offset)?, count))
    }

    fn read_vectors(&self, buf: &[u8], channel: ChannelRef) -> Result<Vec<Keyframe>> {
        let (start, count) = self.channel_records(channel)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut reader = ByteReader::at(buf, start, count * KEYFRAME_SIZE)?;
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let frame = reader.read_i32()?;
            let value = DVec3::from_array(reader.read_f32x3()?);
            keys.push(Keyframe { frame, value });
        }
        Ok(keys)
    }

    fn read_rotations(&self, buf: &[u8], channel: ChannelRef) -> Result<Vec<Keyframe>> {
        let (start, count) = self.channel_records(channel)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut reader = ByteReader::at(buf, start, count * KEYFRAME_SIZE)?;
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let frame = reader.read_i32()?;
            let value = math::rotation_from_turns(reader.read_i32x3()?);
            keys.push(Keyframe { frame, value });
        }
        Ok(keys)
    }
}
