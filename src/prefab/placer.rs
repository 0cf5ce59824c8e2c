//! Placement of underground prefabs, cave rooms and surface obstacles.
//!
//! Every placed prefab ends up in the [`PrefabIndex`]. Underground prefabs
//! and rooms never overlap in 2D (with a margin) and always fit between
//! bedrock and the lowest terrain or surface foundation above them.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::catalog::{PrefabCatalog, PrefabData};
use super::cave_prefab::CavePrefab;
use super::cluster::clusterize_compact;
use super::index::PrefabIndex;
use super::layout::WorldLayout;
use crate::config::CaveConfig;
use crate::error::{CaveError, CaveResult};
use crate::geometry::{BoundingBox, Direction, Vector3i};
use crate::heightmap::HeightMap;

/// Clusters sparser than this are split into tighter boxes.
const CLUSTER_MIN_DENSITY: f32 = 0.5;
const CLUSTER_MAX_DEPTH: u32 = 3;

// =============================================================================
// ROOM PARAMETERS
// =============================================================================

/// Size ranges of procedurally carved rooms (upper bounds exclusive)
#[derive(Clone, Debug)]
pub struct RoomParams {
    pub width: (i32, i32),
    pub height: (i32, i32),
    pub depth: (i32, i32),
}

impl Default for RoomParams {
    fn default() -> Self {
        Self {
            width: (20, 50),
            height: (15, 30),
            depth: (30, 100),
        }
    }
}

impl RoomParams {
    fn random_size(&self, rng: &mut ChaCha8Rng) -> Vector3i {
        Vector3i::new(
            rng.gen_range(self.width.0..self.width.1),
            rng.gen_range(self.height.0..self.height.1),
            rng.gen_range(self.depth.0..self.depth.1),
        )
    }
}

// =============================================================================
// PLACER
// =============================================================================

/// Places prefabs into a [`PrefabIndex`] against a heightmap.
pub struct PrefabPlacer<'a> {
    config: &'a CaveConfig,
    heightmap: &'a HeightMap,
    rooms: RoomParams,
}

impl<'a> PrefabPlacer<'a> {
    pub fn new(config: &'a CaveConfig, heightmap: &'a HeightMap) -> Self {
        Self {
            config,
            heightmap,
            rooms: RoomParams::default(),
        }
    }

    /// Register the surface prefabs of a layout.
    ///
    /// Cave prefabs (entrances built by the host) join the network with
    /// their markers. Every other prefab only contributes the boxes of its
    /// obstacle clusters, which tunnels and placement keep clear of.
    pub fn add_surface_prefabs(&self, index: &mut PrefabIndex, catalog: &PrefabCatalog, layout: &WorldLayout) -> usize {
        let mut clusters_by_name: HashMap<&str, Vec<BoundingBox>> = HashMap::new();
        let before = index.len();

        for instance in &layout.surface_prefabs {
            let Some(data) = catalog.get(&instance.name) else {
                log::warn!("surface prefab '{}' is not in the catalog, ignored", instance.name);
                continue;
            };

            if data.is_cave() {
                let mut prefab = CavePrefab::from_data(
                    index.next_id(),
                    data,
                    instance.rotation,
                    instance.position,
                    self.config.min_same_prefab_distance,
                );
                prefab.is_surface = true;
                prefab.is_entrance = true;
                index.add(prefab);
                continue;
            }

            let clusters = clusters_by_name
                .entry(data.name.as_str())
                .or_insert_with(|| obstacle_clusters(data));

            for cluster in clusters.iter() {
                let bb = cluster.transform(instance.position, instance.rotation % 4, data.size);
                let mut prefab = CavePrefab::new(index.next_id(), format!("{}_cluster", data.name), bb.start, bb.size);
                prefab.is_cluster = true;
                log::debug!(
                    "cluster of '{}' at [{}], rotation {}, size [{}]",
                    data.name,
                    bb.start,
                    instance.rotation,
                    bb.size
                );
                index.add(prefab);
            }
        }

        index.len() - before
    }

    /// Place underground prefabs, cycling through the underground pool.
    ///
    /// Instances that find no free spot are skipped. Returns the number
    /// placed.
    pub fn place_underground(
        &self,
        index: &mut PrefabIndex,
        catalog: &PrefabCatalog,
        rng: &mut ChaCha8Rng,
    ) -> CaveResult<usize> {
        let target = self.config.underground_target();
        if target == 0 {
            return Ok(0);
        }

        let pool = catalog.underground();
        if pool.is_empty() {
            return Err(CaveError::EmptyPool { pool: "underground" });
        }

        let mut placed = 0;
        for i in 0..target {
            let data = pool[i % pool.len()];
            match self.try_place_prefab(index, data, rng) {
                Some(prefab) => {
                    log::debug!("cave prefab '{}' added at [{}]", prefab.name, prefab.position);
                    index.add(prefab);
                    placed += 1;
                }
                None => log::debug!("no room left for '{}'", data.name),
            }
        }

        log::info!("{} / {} underground prefabs placed", placed, target);
        Ok(placed)
    }

    fn try_place_prefab(&self, index: &PrefabIndex, data: &PrefabData, rng: &mut ChaCha8Rng) -> Option<CavePrefab> {
        for _ in 0..self.config.placement_attempts {
            let rotation = rng.gen_range(0..4u8);
            let mut prefab = CavePrefab::from_data(
                index.next_id(),
                data,
                rotation,
                Vector3i::ZERO,
                self.config.min_same_prefab_distance,
            );

            let Some(position) = self.random_position_for(prefab.size, rng) else {
                continue;
            };
            prefab.set_position(position);

            if index.overlaps_any_2d(&prefab, self.config.overlap_margin) || index.is_near_same_prefab(&prefab) {
                continue;
            }

            let Some(y) = self.random_depth(index, position, prefab.size, rng) else {
                continue;
            };
            prefab.set_position(Vector3i::new(position.x, y, position.z));

            return Some(prefab);
        }

        None
    }

    /// Place up to `count` procedural rooms with random markers on all four
    /// faces.
    pub fn place_rooms(&self, index: &mut PrefabIndex, count: usize, rng: &mut ChaCha8Rng) -> usize {
        let mut placed = 0;

        for _ in 0..count {
            for _ in 0..self.config.placement_attempts {
                let size = self.rooms.random_size(rng);
                let Some(position) = self.random_position_for(size, rng) else {
                    continue;
                };

                let mut room = CavePrefab::new(index.next_id(), format!("cave_room_{}", index.next_id()), position, size);
                room.is_room = true;

                if index.overlaps_any_2d(&room, self.config.room_overlap_margin) {
                    continue;
                }

                let Some(y) = self.random_depth(index, position, size, rng) else {
                    continue;
                };

                room.set_position(Vector3i::new(position.x, y, position.z));
                room.randomize_markers(rng);
                room.seed = rng.gen();

                log::debug!("room added at [{}], size [{}]", room.position, size);
                index.add(room);
                placed += 1;
                break;
            }
        }

        if count > 0 && placed == 0 {
            log::warn!("no cave room could be placed");
        }
        log::info!("{} / {} cave rooms placed", placed, count);
        placed
    }

    /// One room per street tile on the outer ring of the tile grid, with the
    /// markers facing out of the world removed.
    pub fn place_boundary_rooms(&self, index: &mut PrefabIndex, rng: &mut ChaCha8Rng) -> usize {
        let tile_size = self.config.street_tile_size;
        let world_size = self.config.world_size;

        if tile_size <= 30 {
            log::warn!("street tiles of {} blocks are too small for boundary rooms", tile_size);
            return 0;
        }

        let grid = world_size / tile_size;
        let last = grid - 1;
        let mut placed = 0;

        for tile_x in 1..grid {
            for tile_z in 1..grid {
                let on_ring = tile_x == 1 || tile_x == last || tile_z == 1 || tile_z == last;
                if !on_ring {
                    continue;
                }

                let size = Vector3i::new(
                    rng.gen_range(20..tile_size - 10),
                    rng.gen_range(20..30),
                    rng.gen_range(20..tile_size - 10),
                );
                let mut position = Vector3i::new(tile_x * tile_size, 0, tile_z * tile_size);

                if tile_x == last {
                    position.x = tile_size * grid - size.x;
                }
                if tile_z == last {
                    position.z = tile_size * grid - size.z;
                }

                let Some(y) = self.random_depth(index, position, size, rng) else {
                    log::debug!("boundary tile ({}, {}) too shallow for a room", tile_x, tile_z);
                    continue;
                };
                position.y = y;

                let mut room = CavePrefab::new(index.next_id(), format!("boundary_room_{}", index.next_id()), position, size);
                room.is_room = true;
                room.is_boundary = true;
                room.randomize_markers(rng);
                room.seed = rng.gen();

                if tile_x == 1 {
                    room.remove_markers(Direction::North);
                } else if tile_x == last {
                    room.remove_markers(Direction::South);
                }
                if tile_z == 1 {
                    room.remove_markers(Direction::West);
                } else if tile_z == last {
                    room.remove_markers(Direction::East);
                }

                index.add(room);
                placed += 1;
            }
        }

        log::info!("{} boundary rooms placed", placed);
        placed
    }

    /// Random footprint corner inside the placeable zone, `None` when the
    /// zone is too small for `size`.
    fn random_position_for(&self, size: Vector3i, rng: &mut ChaCha8Rng) -> Option<Vector3i> {
        let offset = self.config.edge_offset();
        let max_x = self.config.world_size - offset - size.x;
        let max_z = self.config.world_size - offset - size.z;

        if max_x <= offset || max_z <= offset {
            return None;
        }

        Some(Vector3i::new(rng.gen_range(offset..max_x), 0, rng.gen_range(offset..max_z)))
    }

    /// Random y keeping a prefab of `size` between bedrock and the terrain,
    /// `None` when the column is too shallow.
    fn random_depth(&self, index: &PrefabIndex, position: Vector3i, size: Vector3i, rng: &mut ChaCha8Rng) -> Option<i32> {
        let min_height = self.min_terrain_height(index, position, size);
        let bedrock = self.config.bedrock_margin;
        let top = min_height - size.y - self.config.terrain_margin;

        if top < bedrock {
            return None;
        }

        Some(rng.gen_range(bedrock..=top))
    }

    /// Lowest terrain height over a footprint, lowered by the base of any
    /// surface prefab or foundation above it.
    pub fn min_terrain_height(&self, index: &PrefabIndex, position: Vector3i, size: Vector3i) -> i32 {
        let terrain = self.heightmap.min_height_in(position.x, position.z, size.x, size.z) as i32;

        index
            .surface_prefabs_over(position, size)
            .map(|p| p.position.y)
            .fold(terrain, i32::min)
    }
}

/// Obstacle boxes of a prefab in its local, unrotated space.
pub fn obstacle_clusters(data: &PrefabData) -> Vec<BoundingBox> {
    let blocks: HashSet<Vector3i> = data.obstacles.iter().copied().collect();
    clusterize_compact(&blocks, CLUSTER_MIN_DENSITY, CLUSTER_MAX_DEPTH)
}
