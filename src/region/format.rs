//! Serialized layout of a region file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block::{CaveBlock, MAX_Y};
use crate::error::RegionError;

/// "CAVE" in ASCII.
pub const REGION_MAGIC: u32 = 0x4341_5645;
pub const REGION_VERSION: u16 = 1;

/// One block inside a chunk: packed local position, density and flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord(pub u16, pub i8, pub u8);

impl BlockRecord {
    pub fn from_block(block: &CaveBlock) -> Result<Self, RegionError> {
        if !(0..=MAX_Y).contains(&block.y) {
            return Err(RegionError::OutOfRange { y: block.y });
        }
        Ok(Self(block.packed_local(), block.density, block.flags))
    }

    pub fn to_block(self, chunk_x: i32, chunk_z: i32) -> CaveBlock {
        CaveBlock::from_packed_local(chunk_x, chunk_z, self.0, self.1, self.2)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub x: i16,
    pub z: i16,
    pub blocks: Vec<BlockRecord>,
}

impl ChunkRecord {
    pub fn new(chunk_x: i32, chunk_z: i32, blocks: &[CaveBlock]) -> Result<Self, RegionError> {
        let blocks = blocks.iter().map(BlockRecord::from_block).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { x: chunk_x as i16, z: chunk_z as i16, blocks })
    }

    pub fn blocks(&self) -> impl Iterator<Item = CaveBlock> + '_ {
        let (x, z) = (self.x as i32, self.z as i32);
        self.blocks.iter().map(move |b| b.to_block(x, z))
    }
}

/// Full content of `region_{id}.bin`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionFile {
    pub magic: u32,
    pub version: u16,
    pub region_id: u32,
    pub chunks: Vec<ChunkRecord>,
}

impl RegionFile {
    pub fn new(region_id: u32, chunks: Vec<ChunkRecord>) -> Self {
        Self { magic: REGION_MAGIC, version: REGION_VERSION, region_id, chunks }
    }

    /// Check the header of a freshly decoded file.
    pub fn validate(&self, path: &Path) -> Result<(), RegionError> {
        if self.magic != REGION_MAGIC {
            return Err(RegionError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("bad magic {:#010x}", self.magic),
            });
        }
        if self.version != REGION_VERSION {
            return Err(RegionError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("unsupported version {}", self.version),
            });
        }
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.chunks.iter().map(|c| c.blocks.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::flags;

    #[test]
    fn test_block_record_keeps_flags_and_position() {
        let mut block = CaveBlock::new(37, 200, 18);
        block.set(flags::WATER, true);
        block.density = 42;

        let record = BlockRecord::from_block(&block).unwrap();
        let back = record.to_block(2, 1);

        assert_eq!(back.position(), block.position());
        assert_eq!(back.density, 42);
        assert!(back.is_water());
    }

    #[test]
    fn test_out_of_column_block_rejected() {
        assert!(matches!(
            BlockRecord::from_block(&CaveBlock::new(1, 256, 1)),
            Err(RegionError::OutOfRange { y: 256 })
        ));
        assert!(BlockRecord::from_block(&CaveBlock::new(1, -1, 1)).is_err());
    }

    #[test]
    fn test_bad_magic_is_corrupted() {
        let mut file = RegionFile::new(3, Vec::new());
        assert!(file.validate(Path::new("r.bin")).is_ok());

        file.magic = 0;
        assert!(matches!(file.validate(Path::new("r.bin")), Err(RegionError::Corrupted { .. })));
    }
}
