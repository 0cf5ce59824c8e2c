//! Aggregate of every carved block.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use crate::block::{flags, CaveBlock, MAX_Y};
use crate::error::RegionError;
use crate::geometry::{neighbors_horizontal, Vector3i, NEIGHBORS_26};
use crate::noise_field::WaterNoise;
use crate::prefab::PrefabIndex;
use crate::region::{RegionGrid, RegionWriter};
use crate::tunnel::CaveTunnel;

/// All cave blocks of a world, keyed by packed position.
#[derive(Default)]
pub struct CaveMap {
    blocks: HashMap<u64, CaveBlock>,
}

impl CaveMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaveBlock> + '_ {
        self.blocks.values()
    }

    pub fn get(&self, position: &Vector3i) -> Option<&CaveBlock> {
        self.blocks.get(&position.packed())
    }

    pub fn is_cave(&self, position: &Vector3i) -> bool {
        self.blocks.contains_key(&position.packed())
    }

    pub fn is_water(&self, position: &Vector3i) -> bool {
        self.get(position).map_or(false, |b| b.is_water())
    }

    pub fn water_count(&self) -> usize {
        self.blocks.values().filter(|b| b.is_water()).count()
    }

    /// Add tunnel blocks. Blocks already carved keep their flags.
    pub fn add_tunnel(&mut self, tunnel: &CaveTunnel) {
        for block in &tunnel.blocks {
            self.blocks.entry(block.position().packed()).or_insert(*block);
        }
    }

    /// Add blocks carrying `flags`, merging the flags into blocks already
    /// present.
    pub fn add_blocks<I: IntoIterator<Item = CaveBlock>>(&mut self, blocks: I, flags: u8) {
        for mut block in blocks {
            block.flags |= flags;
            self.blocks
                .entry(block.position().packed())
                .and_modify(|existing| existing.flags |= block.flags)
                .or_insert(block);
        }
    }

    /// Add room blocks, replacing anything carved at the same positions.
    pub fn add_room<I: IntoIterator<Item = CaveBlock>>(&mut self, blocks: I) {
        for mut block in blocks {
            block.flags |= flags::ROOM;
            self.blocks.insert(block.position().packed(), block);
        }
    }

    /// Flag existing blocks as water; positions that are not cave are
    /// ignored.
    pub fn set_water<'a, I: IntoIterator<Item = &'a Vector3i>>(&mut self, positions: I) {
        for position in positions {
            if let Some(block) = self.blocks.get_mut(&position.packed()) {
                block.set(flags::WATER, true);
            }
        }
    }

    /// Bottom of the cave column containing `position`.
    fn lowest_point(&self, position: Vector3i) -> Option<Vector3i> {
        if !self.is_cave(&position) {
            return None;
        }
        let mut current = position;
        while current.y > 0 && self.is_cave(&(current - Vector3i::UP)) {
            current = current - Vector3i::UP;
        }
        Some(current)
    }

    /// Positions flooded by a pool starting at `start`.
    ///
    /// The pool spreads through cave blocks no higher than the bottom of
    /// the start column. It is discarded if it reaches a prefab marker,
    /// since the water would pour into the prefab.
    pub fn expand_water(&self, start: Vector3i, index: &PrefabIndex) -> HashSet<Vector3i> {
        let Some(bottom) = self.lowest_point(start) else {
            return HashSet::new();
        };

        let mut queue = VecDeque::from([bottom]);
        let mut visited: HashSet<Vector3i> = HashSet::from([bottom]);

        while let Some(current) = queue.pop_front() {
            if index.intersect_marker(&current) {
                return HashSet::new();
            }

            for offset in NEIGHBORS_26.iter() {
                let next = current + *offset;
                if next.y <= bottom.y && self.is_cave(&next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited
    }

    /// Flood the pools under each local minimum the water noise accepts.
    ///
    /// Returns the number of blocks flagged.
    pub fn fill_water<I>(&mut self, minima: I, noise: &WaterNoise, index: &PrefabIndex) -> usize
    where
        I: IntoIterator<Item = CaveBlock>,
    {
        let mut flooded = 0;
        let mut pools = 0;

        for minimum in minima {
            let start = minimum.position();
            if !noise.is_water(start.x, start.z) || self.is_water(&start) {
                continue;
            }

            let pool = self.expand_water(start, index);
            if pool.is_empty() {
                continue;
            }

            pools += 1;
            flooded += pool.len();
            self.set_water(&pool);
        }

        log::info!("{} water pools, {} blocks flooded", pools, flooded);
        flooded
    }

    /// Set FLOOR, CEILING and FLAT on every block from its neighbours,
    /// returning the number of floor blocks.
    ///
    /// A floor has rock below and cave above, a ceiling the reverse. A block
    /// is flat when all eight horizontal neighbours are cave.
    pub fn mark_surfaces(&mut self) -> usize {
        let surface = flags::FLOOR | flags::CEILING | flags::FLAT;
        let updates: Vec<(u64, u8)> = self
            .blocks
            .iter()
            .map(|(&key, block)| {
                let p = block.position();
                let below = self.is_cave(&(p - Vector3i::UP));
                let above = self.is_cave(&(p + Vector3i::UP));
                let mut bits = 0;
                if !below && above {
                    bits |= flags::FLOOR;
                }
                if below && !above {
                    bits |= flags::CEILING;
                }
                if neighbors_horizontal().all(|o| self.is_cave(&(p + o))) {
                    bits |= flags::FLAT;
                }
                (key, bits)
            })
            .collect();

        let mut floors = 0;
        for (key, bits) in updates {
            if let Some(block) = self.blocks.get_mut(&key) {
                block.flags = (block.flags & !surface) | bits;
                if bits & flags::FLOOR != 0 {
                    floors += 1;
                }
            }
        }
        floors
    }

    /// Blocks grouped by chunk, each chunk sorted by in-chunk position.
    ///
    /// Blocks outside the storable column are dropped.
    pub fn chunks(&self) -> BTreeMap<(i32, i32), Vec<CaveBlock>> {
        let mut chunks: BTreeMap<(i32, i32), Vec<CaveBlock>> = BTreeMap::new();
        let mut clipped = 0;
        for block in self.blocks.values() {
            if !(0..=MAX_Y).contains(&block.y) {
                clipped += 1;
                continue;
            }
            chunks.entry(block.chunk()).or_default().push(*block);
        }
        if clipped > 0 {
            log::warn!("{} blocks outside 0..={} not saved", clipped, MAX_Y);
        }
        for blocks in chunks.values_mut() {
            blocks.sort_by_key(|b| b.packed_local());
        }
        chunks
    }

    /// Write the map as region files, returning the number of files.
    pub fn save<P: AsRef<Path>>(&self, dir: P, grid: RegionGrid) -> Result<usize, RegionError> {
        RegionWriter::new(dir, grid).write_chunks(&self.chunks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::WaterLevel;
    use crate::prefab::{CavePrefab, Marker, NodeRef};
    use crate::region::RegionReader;
    use tempfile::tempdir;

    fn basin() -> CaveMap {
        let mut map = CaveMap::new();
        let mut blocks = Vec::new();
        for x in 0..10 {
            for z in 0..3 {
                blocks.push(CaveBlock::new(x + 20, 5, z + 20));
            }
        }
        for y in 6..10 {
            blocks.push(CaveBlock::new(25, y, 21));
        }
        map.add_blocks(blocks, 0);
        map
    }

    #[test]
    fn test_room_overwrites_tunnel_flags() {
        let mut map = CaveMap::new();
        let tunnel = CaveTunnel {
            start: NodeRef::new(0, 0),
            end: NodeRef::new(1, 0),
            path: Vec::new(),
            blocks: [CaveBlock::new(1, 2, 3), CaveBlock::new(1, 2, 4)].into_iter().collect(),
        };
        map.add_tunnel(&tunnel);
        map.add_room([CaveBlock::new(1, 2, 3)]);
        map.add_tunnel(&tunnel);

        assert_eq!(map.blocks_count(), 2);
        assert!(map.get(&Vector3i::new(1, 2, 3)).unwrap().is_room());
        assert!(!map.get(&Vector3i::new(1, 2, 4)).unwrap().is_room());
    }

    #[test]
    fn test_water_fills_basin_floor() {
        let mut map = basin();
        let index = PrefabIndex::new(128);
        let noise = WaterNoise::new(1, WaterLevel::Full);

        let flooded = map.fill_water([CaveBlock::new(25, 8, 21)], &noise, &index);

        assert_eq!(flooded, 30);
        assert!(map.is_water(&Vector3i::new(20, 5, 20)));
        assert!(!map.is_water(&Vector3i::new(25, 6, 21)));
        assert_eq!(map.water_count(), 30);
    }

    #[test]
    fn test_water_pool_touching_marker_is_dropped() {
        let mut map = basin();
        let mut index = PrefabIndex::new(128);
        let mut prefab = CavePrefab::new(0, "gate", Vector3i::new(30, 0, 20), Vector3i::new(10, 10, 10));
        prefab.markers.push(Marker::new(Vector3i::new(-1, 5, 0), Vector3i::new(1, 3, 3)));
        prefab.update_nodes();
        index.add(prefab);

        let noise = WaterNoise::new(1, WaterLevel::Full);
        assert_eq!(map.fill_water([CaveBlock::new(25, 8, 21)], &noise, &index), 0);
        assert_eq!(map.water_count(), 0);
    }

    #[test]
    fn test_no_water_without_noise() {
        let mut map = basin();
        let noise = WaterNoise::new(1, WaterLevel::None);
        assert_eq!(map.fill_water([CaveBlock::new(25, 8, 21)], &noise, &PrefabIndex::new(128)), 0);
    }

    #[test]
    fn test_save_writes_all_blocks() {
        let dir = tempdir().unwrap();
        let map = basin();
        let grid = RegionGrid::new(128, 64);

        let files = map.save(dir.path(), grid).unwrap();
        assert_eq!(files, 1);

        let region = RegionReader::load(crate::region::region_path(dir.path(), 0)).unwrap();
        assert_eq!(region.block_count(), map.blocks_count());
    }

    #[test]
    fn test_save_clips_blocks_above_column() {
        let dir = tempdir().unwrap();
        let mut map = CaveMap::new();
        map.add_blocks((250..262).map(|y| CaveBlock::new(10, y, 10)), 0);
        map.add_blocks([CaveBlock::new(10, -1, 10)], 0);

        let files = map.save(dir.path(), RegionGrid::new(128, 64)).unwrap();
        assert_eq!(files, 1);

        let region = RegionReader::load(crate::region::region_path(dir.path(), 0)).unwrap();
        assert_eq!(region.block_count(), 6);
    }

    #[test]
    fn test_surfaces_marked_from_neighbours() {
        let mut map = CaveMap::new();
        // 3x3 slab two blocks high
        let slab = (0..3).flat_map(|x| (0..3).flat_map(move |z| (5..7).map(move |y| CaveBlock::new(x, y, z))));
        map.add_blocks(slab, 0);
        map.add_blocks([CaveBlock::new(8, 5, 8)], 0);

        let floors = map.mark_surfaces();
        assert_eq!(floors, 9);

        let centre_floor = map.get(&Vector3i::new(1, 5, 1)).unwrap();
        assert!(centre_floor.has(flags::FLOOR));
        assert!(centre_floor.has(flags::FLAT));
        assert!(!centre_floor.has(flags::CEILING));

        let corner_ceiling = map.get(&Vector3i::new(0, 6, 0)).unwrap();
        assert!(corner_ceiling.has(flags::CEILING));
        assert!(!corner_ceiling.has(flags::FLAT));

        let lone = map.get(&Vector3i::new(8, 5, 8)).unwrap();
        assert!(!lone.has(flags::FLOOR) && !lone.has(flags::CEILING) && !lone.has(flags::FLAT));
    }

    #[test]
    fn test_surface_marking_is_idempotent() {
        let mut map = basin();
        map.mark_surfaces();
        let before: Vec<u8> = map.chunks().into_values().flatten().map(|b| b.flags).collect();
        map.mark_surfaces();
        let after: Vec<u8> = map.chunks().into_values().flatten().map(|b| b.flags).collect();
        assert_eq!(before, after);
    }
}
