//! On-disk cave storage.
//!
//! Blocks are grouped by chunk and chunks by region; each region is one
//! bincode file named `region_{id}.bin`. A `manifest.json` next to the
//! region files records how the map was generated. At runtime a
//! [`CaveChunksProvider`] loads regions lazily and answers point queries.

pub mod format;
pub mod manifest;
pub mod provider;
pub mod storage;

pub use format::{BlockRecord, ChunkRecord, RegionFile, REGION_MAGIC, REGION_VERSION};
pub use manifest::Manifest;
pub use provider::CaveChunksProvider;
pub use storage::{CaveRegion, RegionReader, RegionWriter};

use std::path::{Path, PathBuf};

use crate::geometry::CHUNK_SIZE;

/// Mapping from chunk coordinates to region files.
///
/// Chunk coordinates here are generation coordinates, always in
/// `[0, world_size / 16)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionGrid {
    pub world_size: i32,
    pub region_size: i32,
}

impl RegionGrid {
    pub fn new(world_size: i32, region_size: i32) -> Self {
        Self { world_size, region_size }
    }

    /// Regions along one side of the world.
    pub fn grid_width(&self) -> i32 {
        (self.world_size + self.region_size - 1) / self.region_size
    }

    /// Chunks along one side of a region.
    pub fn chunks_per_region_side(&self) -> i32 {
        self.region_size >> 4
    }

    pub fn region_id(&self, chunk_x: i32, chunk_z: i32) -> u32 {
        let cprs = self.chunks_per_region_side();
        (chunk_x / cprs + (chunk_z / cprs) * self.grid_width()) as u32
    }

    /// Number of region files covering the whole world.
    pub fn region_count(&self) -> u32 {
        (self.grid_width() * self.grid_width()) as u32
    }

    /// Generation chunk holding a runtime (world-centered) block coordinate.
    pub fn runtime_chunk(&self, world: i32) -> i32 {
        (world >> 4) + (self.world_size >> 5)
    }

    /// Generation block coordinate of a runtime block coordinate.
    pub fn to_generation(&self, world: i32) -> i32 {
        world + self.world_size / 2
    }

    /// Runtime block coordinate of a generation block coordinate.
    pub fn to_runtime(&self, generation: i32) -> i32 {
        generation - self.world_size / 2
    }

    pub fn chunks_in_world(&self) -> i32 {
        self.world_size / CHUNK_SIZE
    }
}

/// Path of the file holding region `id`.
pub fn region_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("region_{}.bin", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_id_is_deterministic() {
        let grid = RegionGrid::new(2048, 512);

        assert_eq!(grid.grid_width(), 4);
        assert_eq!(grid.chunks_per_region_side(), 32);
        assert_eq!(grid.region_id(0, 0), 0);
        assert_eq!(grid.region_id(31, 31), 0);
        assert_eq!(grid.region_id(32, 0), 1);
        assert_eq!(grid.region_id(0, 32), 4);
        assert_eq!(grid.region_id(127, 127), 15);
    }

    #[test]
    fn test_chunks_in_same_region_share_file() {
        let grid = RegionGrid::new(1024, 512);
        let id = grid.region_id(40, 10);

        for cx in 32..64 {
            for cz in 0..32 {
                assert_eq!(grid.region_id(cx, cz), id);
            }
        }
        assert_eq!(region_path(Path::new("out"), id), Path::new("out").join("region_1.bin"));
    }

    #[test]
    fn test_runtime_coordinates_are_centered() {
        let grid = RegionGrid::new(2048, 512);

        assert_eq!(grid.runtime_chunk(-1024), 0);
        assert_eq!(grid.runtime_chunk(0), 64);
        assert_eq!(grid.runtime_chunk(-1), 63);
        assert_eq!(grid.to_generation(-1024), 0);
        assert_eq!(grid.to_runtime(1024), 0);
    }

    #[test]
    fn test_partial_region_grid_rounds_up() {
        let grid = RegionGrid::new(1000, 512);
        assert_eq!(grid.grid_width(), 2);
        assert_eq!(grid.region_count(), 4);
    }
}
