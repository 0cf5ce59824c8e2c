//! Runtime cave queries backed by region files.
//!
//! Coordinates passed to the provider are runtime world coordinates, centered
//! on the world origin. Regions are loaded on first use and kept in a small
//! FIFO cache.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::manifest::Manifest;
use super::storage::{CaveRegion, RegionReader};
use super::{region_path, RegionGrid};
use crate::block::CaveBlock;
use crate::error::RegionError;
use crate::geometry::{neighbors_no_vertical, Vector3i};

/// Default number of regions kept in memory.
pub const DEFAULT_CACHED_REGIONS: usize = 4;

/// Expansions allowed per spawn search.
const MAX_SPAWN_ROLLS: usize = 200;

/// Loaded regions, evicted oldest first. Regions that failed to load are
/// cached as `None` so a missing file is reported once.
struct RegionCache {
    capacity: usize,
    order: VecDeque<u32>,
    regions: HashMap<u32, Option<Arc<CaveRegion>>>,
}

impl RegionCache {
    fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), order: VecDeque::new(), regions: HashMap::new() }
    }

    fn get(&self, id: u32) -> Option<Option<Arc<CaveRegion>>> {
        self.regions.get(&id).cloned()
    }

    fn insert(&mut self, id: u32, region: Option<Arc<CaveRegion>>) {
        if self.regions.contains_key(&id) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.regions.remove(&oldest);
            }
        }
        self.order.push_back(id);
        self.regions.insert(id, region);
    }

    fn len(&self) -> usize {
        self.regions.len()
    }
}

pub struct CaveChunksProvider {
    dir: PathBuf,
    grid: RegionGrid,
    cache: Mutex<RegionCache>,
}

impl CaveChunksProvider {
    pub fn new<P: AsRef<Path>>(dir: P, grid: RegionGrid, max_cached_regions: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            grid,
            cache: Mutex::new(RegionCache::new(max_cached_regions)),
        }
    }

    /// Provider for an output directory, sized from its manifest.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, RegionError> {
        let manifest = Manifest::load(dir.as_ref())?;
        let grid = RegionGrid::new(manifest.world_size, manifest.region_size);
        Ok(Self::new(dir, grid, DEFAULT_CACHED_REGIONS))
    }

    pub fn grid(&self) -> RegionGrid {
        self.grid
    }

    /// Number of regions currently held, including failed loads.
    pub fn cached_regions(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, RegionCache> {
        // A panic while holding the lock leaves the cache consistent.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn region(&self, id: u32) -> Option<Arc<CaveRegion>> {
        let mut cache = self.lock_cache();
        if let Some(cached) = cache.get(id) {
            return cached;
        }

        let path = region_path(&self.dir, id);
        let region = match RegionReader::load(&path) {
            Ok(region) => Some(Arc::new(region)),
            Err(RegionError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::warn!("cave region not found '{}'", path.display());
                None
            }
            Err(e) => {
                log::error!("cave region unavailable: {}", e);
                None
            }
        };

        cache.insert(id, region.clone());
        region
    }

    /// Region holding a generation chunk, `None` outside the world.
    fn region_for_chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<CaveRegion>> {
        let chunks = self.grid.chunks_in_world();
        if chunk_x < 0 || chunk_z < 0 || chunk_x >= chunks || chunk_z >= chunks {
            return None;
        }
        self.region(self.grid.region_id(chunk_x, chunk_z))
    }

    /// Cave block at a runtime position, in generation coordinates.
    fn block(&self, x: i32, y: i32, z: i32) -> Option<CaveBlock> {
        let region = self.region_for_chunk(self.grid.runtime_chunk(x), self.grid.runtime_chunk(z))?;
        region
            .get(self.grid.to_generation(x), y, self.grid.to_generation(z))
            .copied()
    }

    pub fn is_cave(&self, x: i32, y: i32, z: i32) -> bool {
        self.block(x, y, z).is_some()
    }

    pub fn is_water(&self, x: i32, y: i32, z: i32) -> bool {
        self.block(x, y, z).map_or(false, |b| b.is_water())
    }

    /// Blocks of a runtime chunk, positioned in runtime coordinates.
    pub fn cave_blocks(&self, chunk_x: i32, chunk_z: i32) -> Vec<CaveBlock> {
        let offset = self.grid.world_size >> 5;
        let (gx, gz) = (chunk_x + offset, chunk_z + offset);

        let Some(region) = self.region_for_chunk(gx, gz) else {
            return Vec::new();
        };

        region
            .chunk_blocks(gx, gz)
            .map(|b| CaveBlock {
                x: self.grid.to_runtime(b.x),
                z: self.grid.to_runtime(b.z),
                ..*b
            })
            .collect()
    }

    /// Cave position farther than `min_distance` from `position` with solid
    /// ground below it.
    ///
    /// Walks the cave outward from `position`, always expanding the farthest
    /// known block first with a little jitter, and gives up after a fixed
    /// number of expansions.
    pub fn spawn_position_near(&self, position: Vector3i, min_distance: i32, rng: &mut ChaCha8Rng) -> Option<Vector3i> {
        let sqr_min_distance = min_distance.saturating_mul(min_distance);
        let mut queue: BinaryHeap<(i64, Reverse<u64>, Vector3i)> = BinaryHeap::new();
        let mut visited: HashSet<Vector3i> = HashSet::new();
        let mut sequence = 0u64;

        queue.push((i64::MAX, Reverse(sequence), position));
        visited.insert(position);

        for _ in 0..MAX_SPAWN_ROLLS {
            let Some((_, _, current)) = queue.pop() else {
                break;
            };

            if current.sqr_distance(&position) > sqr_min_distance
                && self.is_cave(current.x, current.y, current.z)
                && !self.is_cave(current.x, current.y - 1, current.z)
            {
                return Some(current);
            }

            for offset in neighbors_no_vertical() {
                let next = current + offset;
                if visited.contains(&next) || !self.is_cave(next.x, next.y, next.z) {
                    continue;
                }
                visited.insert(next);

                let distance = (next.sqr_distance(&position) as f64).sqrt().round() as i64;
                sequence += 1;
                queue.push((distance + rng.gen_range(-1..=1), Reverse(sequence), next));
            }
        }

        None
    }
}
