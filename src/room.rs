//! Cellular-automaton room interiors.
//!
//! A room starts from thresholded noise inside its box, is smoothed a few
//! times so the open cells clump into caverns, then every marker digs a
//! short corridor to the nearest open cell so the room joins its tunnels.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::block::{flags, CaveBlock};
use crate::geometry::{neighbors_no_vertical, Vector3i, NEIGHBORS_26};
use crate::noise_field::NoiseField;
use crate::prefab::CavePrefab;
use crate::seeds::CaveSeeds;
use crate::sphere::SphereCache;

/// Smoothing passes applied after the initial fill.
const SMOOTHING_PASSES: usize = 10;
/// A cell with more open neighbours than this opens, with exactly this many
/// it flips a coin.
const NEIGHBOR_CRITERION: usize = 13;
/// Radius of the corridor dug from each marker.
const MARKER_RADIUS: i32 = 3;
/// Corridor search budget.
const MAX_PATH_ITERATIONS: usize = 10_000;

/// Boolean voxel grid covering one room box.
#[derive(Clone, Debug)]
pub struct RoomGrid {
    size: Vector3i,
    cells: Vec<bool>,
}

impl RoomGrid {
    pub fn new(size: Vector3i) -> Self {
        let len = (size.x.max(0) * size.y.max(0) * size.z.max(0)) as usize;
        Self { size, cells: vec![false; len] }
    }

    pub fn size(&self) -> Vector3i {
        self.size
    }

    pub fn is_inside(&self, p: &Vector3i) -> bool {
        p.x >= 0 && p.y >= 0 && p.z >= 0 && p.x < self.size.x && p.y < self.size.y && p.z < self.size.z
    }

    fn index(&self, p: &Vector3i) -> usize {
        (p.x + p.y * self.size.x + p.z * self.size.x * self.size.y) as usize
    }

    pub fn get(&self, p: &Vector3i) -> bool {
        self.is_inside(p) && self.cells[self.index(p)]
    }

    pub fn set(&mut self, p: &Vector3i, open: bool) {
        if self.is_inside(p) {
            let i = self.index(p);
            self.cells[i] = open;
        }
    }

    pub fn open_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    fn interior_points(&self) -> impl Iterator<Item = Vector3i> {
        let size = self.size;
        (1..size.z - 1).flat_map(move |z| {
            (1..size.y - 1).flat_map(move |y| (1..size.x - 1).map(move |x| Vector3i::new(x, y, z)))
        })
    }

    /// Open interior cells where the noise field says cave.
    pub fn fill_from_noise(&mut self, noise: &NoiseField) {
        for p in self.interior_points().collect::<Vec<_>>() {
            self.set(&p, noise.is_cave(p.x, p.y, p.z));
        }
    }

    fn open_neighbors(&self, p: &Vector3i) -> usize {
        NEIGHBORS_26.iter().filter(|&&o| self.get(&(*p + o))).count()
    }

    /// One automaton step. The outer shell is always closed afterwards.
    pub fn smooth(&mut self, rng: &mut ChaCha8Rng) {
        let mut next = RoomGrid::new(self.size);

        for p in self.interior_points() {
            let count = self.open_neighbors(&p);
            let open = match count.cmp(&NEIGHBOR_CRITERION) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => rng.gen_bool(0.5),
                std::cmp::Ordering::Less => false,
            };
            next.set(&p, open);
        }

        *self = next;
    }

    /// BFS from `start` to the closest open cell, moving horizontally or
    /// diagonally but never straight up or down.
    ///
    /// `start` may lie just outside the grid (markers sit on the faces);
    /// every other step stays inside. Returns the path from `start` to the
    /// open cell, or an empty path if the budget runs out.
    pub fn path_to_open(&self, start: Vector3i) -> Vec<Vector3i> {
        let mut queue = VecDeque::from([start]);
        let mut visited: HashSet<Vector3i> = HashSet::from([start]);
        let mut parents: HashMap<Vector3i, Vector3i> = HashMap::new();
        let mut iterations = 0;

        while let Some(current) = queue.pop_front() {
            iterations += 1;
            if iterations > MAX_PATH_ITERATIONS {
                break;
            }

            if self.get(&current) {
                let mut path = vec![current];
                let mut node = current;
                while let Some(&parent) = parents.get(&node) {
                    path.push(parent);
                    node = parent;
                }
                path.reverse();
                return path;
            }

            for offset in neighbors_no_vertical() {
                let next = current + offset;
                if self.is_inside(&next) && visited.insert(next) {
                    parents.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        Vec::new()
    }

    /// Open every in-grid cell of a sphere.
    pub fn stamp(&mut self, center: Vector3i, radius: i32, spheres: &SphereCache) {
        for p in spheres.sphere(center, radius) {
            self.set(&p, true);
        }
    }

    /// Open cells as local positions.
    pub fn open_cells(&self) -> impl Iterator<Item = Vector3i> + '_ {
        let size = self.size;
        (0..size.z)
            .flat_map(move |z| (0..size.y).flat_map(move |y| (0..size.x).map(move |x| Vector3i::new(x, y, z))))
            .filter(move |p| self.cells[self.index(p)])
    }
}

/// Procedural interior of one room prefab.
#[derive(Clone, Debug)]
pub struct CaveRoom {
    pub start: Vector3i,
    pub size: Vector3i,
    /// Marker centers relative to `start`
    pub markers: Vec<Vector3i>,
    pub seed: u64,
}

impl CaveRoom {
    pub fn new(start: Vector3i, size: Vector3i, seed: u64) -> Self {
        Self { start, size, markers: Vec::new(), seed }
    }

    pub fn from_prefab(prefab: &CavePrefab) -> Self {
        Self {
            start: prefab.position,
            size: prefab.size,
            markers: prefab.nodes.iter().map(|n| n.marker.center()).collect(),
            seed: prefab.seed,
        }
    }

    /// Run the automaton and return the open cells in world space.
    ///
    /// `noise` supplies the fill parameters; it is reseeded with the room
    /// seed so every room gets its own pattern.
    pub fn blocks(&self, noise: &NoiseField, spheres: &SphereCache) -> Vec<CaveBlock> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut grid = RoomGrid::new(self.size);

        grid.fill_from_noise(&noise.reseeded(CaveSeeds::noise_seed(self.seed)));
        for _ in 0..SMOOTHING_PASSES {
            grid.smooth(&mut rng);
        }

        for &marker in &self.markers {
            let path = grid.path_to_open(marker);
            if path.is_empty() {
                log::warn!("room at [{}]: no open cell reachable from marker [{}]", self.start, marker);
                continue;
            }
            for p in path {
                grid.stamp(p, MARKER_RADIUS, spheres);
            }
        }

        grid.open_cells()
            .map(|p| CaveBlock::with_flags(self.start + p, flags::ROOM))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::NoiseConfig;

    #[test]
    fn test_smoothing_keeps_solid_core_and_drops_specks() {
        let mut grid = RoomGrid::new(Vector3i::new(12, 12, 12));
        for x in 2..10 {
            for y in 2..10 {
                for z in 2..10 {
                    grid.set(&Vector3i::new(x, y, z), true);
                }
            }
        }
        let speck = Vector3i::new(1, 1, 10);
        grid.set(&speck, true);

        grid.smooth(&mut ChaCha8Rng::seed_from_u64(0));

        assert!(grid.get(&Vector3i::new(5, 5, 5)));
        assert!(!grid.get(&speck));
        assert!(!grid.get(&Vector3i::new(0, 5, 5)));
    }

    #[test]
    fn test_marker_path_reaches_open_cell() {
        let mut grid = RoomGrid::new(Vector3i::new(10, 10, 10));
        let target = Vector3i::new(5, 4, 5);
        grid.set(&target, true);

        let start = Vector3i::new(-1, 4, 2);
        let path = grid.path_to_open(start);

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&target));
        assert_eq!(path.len(), 7);
        assert!(path[1..].iter().all(|p| grid.is_inside(p)));
        for pair in path.windows(2) {
            assert_eq!(pair[0].chebyshev(&pair[1]), 1);
            assert!(pair[0].x != pair[1].x || pair[0].z != pair[1].z);
        }
    }

    #[test]
    fn test_closed_grid_has_no_path() {
        let grid = RoomGrid::new(Vector3i::new(6, 6, 6));
        assert!(grid.path_to_open(Vector3i::new(-1, 2, 2)).is_empty());
    }

    #[test]
    fn test_room_blocks_stay_in_box() {
        let noise = NoiseField::new(&NoiseConfig::default(), 1);
        let spheres = SphereCache::new(1, 6).unwrap();
        let start = Vector3i::new(100, 20, 200);
        let size = Vector3i::new(20, 15, 30);

        let mut room = CaveRoom::new(start, size, 42);
        room.markers.push(Vector3i::new(-1, 7, 15));

        let blocks = room.blocks(&noise, &spheres);
        let again = room.blocks(&noise, &spheres);

        assert_eq!(blocks.len(), again.len());
        for block in &blocks {
            let local = block.position() - start;
            assert!(local.x >= 0 && local.x < size.x);
            assert!(local.y >= 0 && local.y < size.y);
            assert!(local.z >= 0 && local.z < size.z);
            assert!(block.is_room());
        }
    }
}
