//! Per-asset animation heuristics
//!
//! Some archive assets only animate correctly with corrective heuristics
//! recovered by reverse engineering. Which asset needs which heuristic is
//! data, not code: callers pass a [`QuirkTable`] (or a single
//! [`AssetQuirks`]) into loading.

use std::collections::HashMap;

/// Archive bytes reserved per asset; an asset's index is its offset divided by this
pub const ASSET_STRIDE: usize = 0x10_0000;

/// Animation header marker meaning every joint carries its own position channel
pub const ALL_POSITIONS_ANIMATED: u32 = 0x02E3_0000;

/// Asset index for an archive offset
pub fn asset_index(offset: usize) -> u32 {
    (offset / ASSET_STRIDE) as u32
}

/// How the position scaling fix is selected for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalingFixMode {
    /// Enabled only for blocks whose header carries [`ALL_POSITIONS_ANIMATED`]
    #[default]
    Auto,
    /// Always enabled
    Forced,
    /// Never enabled, whatever the block header says
    Suppressed,
}

impl ScalingFixMode {
    /// Whether the fix applies to a block with the given layout marker
    pub fn enabled_for(self, layout_marker: u32) -> bool {
        match self {
            Self::Auto => layout_marker == ALL_POSITIONS_ANIMATED,
            Self::Forced => true,
            Self::Suppressed => false,
        }
    }
}

/// Heuristic switches for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct AssetQuirks {
    pub scaling_fix: ScalingFixMode,
    /// Interpolate rotations along the shorter quaternion arc
    pub shortest_path_rotation: bool,
    /// Merge animation blocks whose joint count differs from the skeleton's
    pub allow_joint_count_mismatch: bool,
}

/// Lookup of [`AssetQuirks`] by asset index
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct QuirkTable {
    entries: HashMap<u32, AssetQuirks>,
}

const FORCED_SCALING_FIX: [u32; 17] = [
    23, 128, 155, 199, 206, 217, 292, 302, 368, 374, 505, 519, 524, 527, 539, 596, 646,
];

const SUPPRESSED_SCALING_FIX: [u32; 1] = [178];

const SHORTEST_PATH_ROTATION: [u32; 15] = [
    18, 56, 155, 343, 431, 504, 508, 512, 525, 567, 654, 665, 668, 675, 680,
];

const JOINT_COUNT_MISMATCH: [u32; 2] = [87, 550];

impl QuirkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of the assets known to need heuristics
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for asset in FORCED_SCALING_FIX {
            table.entry(asset).scaling_fix = ScalingFixMode::Forced;
        }
        for asset in SUPPRESSED_SCALING_FIX {
            table.entry(asset).scaling_fix = ScalingFixMode::Suppressed;
        }
        for asset in SHORTEST_PATH_ROTATION {
            table.entry(asset).shortest_path_rotation = true;
        }
        for asset in JOINT_COUNT_MISMATCH {
            table.entry(asset).allow_joint_count_mismatch = true;
        }
        table
    }

    /// Quirks for an asset, defaulting when the asset is not listed
    pub fn get(&self, asset: u32) -> AssetQuirks {
        self.entries.get(&asset).copied().unwrap_or_default()
    }

    /// Quirks for the asset containing an archive offset
    pub fn for_offset(&self, offset: usize) -> AssetQuirks {
        self.get(asset_index(offset))
    }

    pub fn insert(&mut self, asset: u32, quirks: AssetQuirks) -> Option<AssetQuirks> {
        self.entries.insert(asset, quirks)
    }

    /// Mutable quirks for an asset, inserting defaults first
    pub fn entry(&mut self, asset: u32) -> &mut AssetQuirks {
        self.entries.entry(asset).or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
