//! Single cave voxel.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::geometry::{chunk_coord, Vector3i};

/// Highest y a block can be stored at.
pub const MAX_Y: i32 = 255;

/// Density of an open (air-like) cave block.
pub const MAX_DENSITY: i8 = i8::MAX;

/// Bit flags carried by a [`CaveBlock`].
pub mod flags {
    pub const WATER: u8 = 0b0000_0001;
    pub const FLOOR: u8 = 0b0000_0010;
    pub const CEILING: u8 = 0b0000_0100;
    pub const ROOM: u8 = 0b0000_1000;
    pub const SKIP_DECORATION: u8 = 0b0001_0000;
    pub const FLAT: u8 = 0b0100_0000;
}

/// A carved voxel.
///
/// Equality and hashing only consider the position, so a set of blocks never
/// holds two entries for the same voxel regardless of their flags.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CaveBlock {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub density: i8,
    pub flags: u8,
}

impl CaveBlock {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z, density: MAX_DENSITY, flags: 0 }
    }

    pub fn at(position: Vector3i) -> Self {
        Self::new(position.x, position.y, position.z)
    }

    pub fn with_flags(position: Vector3i, flags: u8) -> Self {
        Self { flags, ..Self::at(position) }
    }

    pub fn position(&self) -> Vector3i {
        Vector3i::new(self.x, self.y, self.z)
    }

    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn set(&mut self, flag: u8, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn is_water(&self) -> bool {
        self.has(flags::WATER)
    }

    pub fn is_room(&self) -> bool {
        self.has(flags::ROOM)
    }

    /// Chunk holding this block.
    pub fn chunk(&self) -> (i32, i32) {
        (chunk_coord(self.x), chunk_coord(self.z))
    }

    /// Position inside its chunk packed into 16 bits: 4 bits x, 8 bits y,
    /// 4 bits z (x in the low bits).
    ///
    /// Only valid for `0 <= y <= 255`.
    pub fn packed_local(&self) -> u16 {
        let x = (self.x & 15) as u16;
        let z = (self.z & 15) as u16;
        let y = (self.y & 0xFF) as u16;
        x | (y << 4) | (z << 12)
    }

    /// Rebuild a block from its chunk and packed in-chunk position.
    pub fn from_packed_local(chunk_x: i32, chunk_z: i32, packed: u16, density: i8, flags: u8) -> Self {
        let x = (packed & 0xF) as i32;
        let y = ((packed >> 4) & 0xFF) as i32;
        let z = ((packed >> 12) & 0xF) as i32;

        Self {
            x: (chunk_x << 4) + x,
            y,
            z: (chunk_z << 4) + z,
            density,
            flags,
        }
    }
}

impl PartialEq for CaveBlock {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

impl Eq for CaveBlock {}

impl Hash for CaveBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position().packed().hash(state);
    }
}

impl From<Vector3i> for CaveBlock {
    fn from(position: Vector3i) -> Self {
        CaveBlock::at(position)
    }
}
