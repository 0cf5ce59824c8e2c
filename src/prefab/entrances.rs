//! Cave entrances on wilderness street tiles.
//!
//! Two kinds share the tiles: entrance prefabs from the catalog's wilderness
//! pool, placed first, and natural entrances (a bare shaft down to a small
//! junction) on the tiles left free.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::catalog::{PrefabCatalog, PrefabData};
use super::cave_prefab::{CavePrefab, GraphNode, Marker};
use super::index::PrefabIndex;
use super::layout::StreetTile;
use crate::config::CaveConfig;
use crate::geometry::{Direction, Vector3i};
use crate::heightmap::HeightMap;

/// Radius of the four tunnels leaving a natural entrance.
pub const ENTRANCE_NODE_RADIUS: i32 = 3;

/// Maximum horizontal jitter of an entrance around its tile center.
const CENTER_JITTER: i32 = 20;

/// Positions tried per wilderness entrance prefab and tile.
const ENTRANCE_TRIES: usize = 6;

/// Gap kept between a wilderness entrance and its tile border.
const TILE_MARGIN: i32 = 10;

/// Picks wilderness entrance prefabs, preferring names not picked yet.
pub struct EntranceSelector<'a> {
    pool: Vec<&'a PrefabData>,
    used: HashSet<&'a str>,
}

impl<'a> EntranceSelector<'a> {
    pub fn new(catalog: &'a PrefabCatalog) -> Self {
        Self { pool: catalog.wilderness_entrances(), used: HashSet::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Random unused entrance, or any entrance once all were used.
    pub fn select(&mut self, rng: &mut ChaCha8Rng) -> Option<&'a PrefabData> {
        let unused: Vec<&'a PrefabData> =
            self.pool.iter().copied().filter(|p| !self.used.contains(p.name.as_str())).collect();
        let candidates = if unused.is_empty() { &self.pool } else { &unused };

        let data = *candidates.choose(rng)?;
        self.used.insert(data.name.as_str());
        Some(data)
    }
}

/// Place one wilderness entrance prefab per eligible tile, visited in
/// random order. Tiles that receive one are marked used. Returns the number
/// placed.
pub fn plan_wilderness_entrances(
    index: &mut PrefabIndex,
    catalog: &PrefabCatalog,
    tiles: &mut [StreetTile],
    heightmap: &HeightMap,
    config: &CaveConfig,
    rng: &mut ChaCha8Rng,
) -> usize {
    let mut selector = EntranceSelector::new(catalog);
    if selector.is_empty() {
        log::debug!("no wilderness entrance prefabs in the catalog");
        return 0;
    }

    let mut order: Vec<usize> = (0..tiles.len()).filter(|&i| tiles[i].accepts_entrance()).collect();
    if order.is_empty() {
        log::warn!("no wilderness street tile for cave entrances");
        return 0;
    }
    order.shuffle(rng);

    let mut placed = 0;
    for i in order {
        let Some(data) = selector.select(rng) else {
            break;
        };
        let tile = &mut tiles[i];

        match try_place_entrance(index, data, tile, heightmap, config, rng) {
            Some(prefab) => {
                log::debug!("entrance '{}' spawned on tile ({}, {})", prefab.name, tile.x, tile.z);
                index.add(prefab);
                tile.used = true;
                placed += 1;
            }
            None => log::debug!("fail to spawn '{}' on tile ({}, {})", data.name, tile.x, tile.z),
        }
    }

    log::info!("{} wilderness entrances added", placed);
    placed
}

/// Random rotation and spot inside `tile`, with the prefab top level with
/// the lowest terrain of its footprint.
fn try_place_entrance(
    index: &PrefabIndex,
    data: &PrefabData,
    tile: &StreetTile,
    heightmap: &HeightMap,
    config: &CaveConfig,
    rng: &mut ChaCha8Rng,
) -> Option<CavePrefab> {
    for _ in 0..ENTRANCE_TRIES {
        let rotation = rng.gen_range(0..4u8);
        let mut prefab = CavePrefab::from_data(
            index.next_id(),
            data,
            rotation,
            Vector3i::ZERO,
            config.min_same_prefab_distance,
        );
        let size = prefab.size;

        let (x, z) = if size.x + 2 * TILE_MARGIN >= tile.size || size.z + 2 * TILE_MARGIN >= tile.size {
            let (cx, cz) = tile.center();
            (cx - size.x / 2, cz - size.z / 2)
        } else {
            (
                rng.gen_range(tile.x + TILE_MARGIN..tile.x + tile.size - size.x - TILE_MARGIN),
                rng.gen_range(tile.z + TILE_MARGIN..tile.z + tile.size - size.z - TILE_MARGIN),
            )
        };

        let inside = |v: i32, extent: i32| v >= 0 && v + extent <= config.world_size;
        if !inside(x, size.x) || !inside(z, size.z) {
            continue;
        }

        let terrain = heightmap.min_height_in(x, z, size.x, size.z) as i32;
        let y = terrain - size.y;
        if y <= config.bedrock_margin {
            continue;
        }

        prefab.set_position(Vector3i::new(x, y, z));
        if index.overlaps_any_2d(&prefab, config.overlap_margin) || index.is_near_same_prefab(&prefab) {
            continue;
        }

        prefab.is_surface = true;
        prefab.is_entrance = true;
        return Some(prefab);
    }

    None
}

/// Thin vertical prefab around `position` with one outward node per side.
///
/// The prefab reaches from `position.y` to the top of the world so nothing
/// else is carved into the shaft column.
pub fn natural_entrance(id: usize, position: Vector3i) -> CavePrefab {
    let start = Vector3i::new(position.x - 1, position.y, position.z - 1);
    let mut prefab = CavePrefab::new(id, format!("natural_entrance_{}", id), start, Vector3i::new(3, 255, 3));
    prefab.is_natural_entrance = true;

    let sides = [Direction::South, Direction::North, Direction::West, Direction::East];
    prefab.nodes = sides
        .iter()
        .enumerate()
        .map(|(index, &direction)| {
            let node_position = position + direction.vector();
            GraphNode {
                prefab_id: id,
                index,
                position: node_position,
                marker: Marker::new(node_position - start, Vector3i::ONE),
                direction,
                radius: ENTRANCE_NODE_RADIUS,
            }
        })
        .collect();

    prefab
}

/// Add one natural entrance per eligible wilderness tile, visited in random
/// order. Returns the number of entrances added.
pub fn plan_natural_entrances(
    index: &mut PrefabIndex,
    tiles: &[StreetTile],
    heightmap: &HeightMap,
    config: &CaveConfig,
    rng: &mut ChaCha8Rng,
) -> usize {
    let mut candidates: Vec<&StreetTile> = tiles.iter().filter(|t| t.accepts_entrance()).collect();
    candidates.shuffle(rng);

    let min_depth = config.min_entrance_depth;
    let mut added = 0;

    for tile in candidates {
        let (cx, cz) = tile.center();
        let x = cx + rng.gen_range(-CENTER_JITTER..CENTER_JITTER);
        let z = cz + rng.gen_range(-CENTER_JITTER..CENTER_JITTER);

        let terrain = heightmap.get_height(x, z).ceil() as i32;
        if terrain < min_depth || terrain - min_depth <= config.bedrock_margin {
            continue;
        }

        let y = rng.gen_range(config.bedrock_margin..terrain - min_depth);
        let id = index.next_id();
        index.add_unbucketed(natural_entrance(id, Vector3i::new(x, y, z)));
        added += 1;
    }

    log::info!("{} natural entrances added", added);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefab::catalog::MarkerData;
    use rand::SeedableRng;

    fn wilderness_catalog() -> PrefabCatalog {
        let entrance = |name: &str| PrefabData {
            name: name.to_string(),
            size: Vector3i::new(12, 20, 12),
            tags: vec!["cave".to_string(), "entrance".to_string(), "wilderness".to_string()],
            markers: vec![MarkerData {
                start: Vector3i::new(-1, 2, 4),
                size: Vector3i::new(1, 4, 4),
                tags: vec!["cavenode".to_string()],
            }],
            duplicate_repeat_distance: Some(10),
            obstacles: Vec::new(),
        };
        PrefabCatalog::new(vec![entrance("sinkhole"), entrance("ravine")]).unwrap()
    }

    #[test]
    fn test_entrance_nodes_face_outward() {
        let center = Vector3i::new(100, 40, 200);
        let prefab = natural_entrance(7, center);

        assert_eq!(prefab.position, Vector3i::new(99, 40, 199));
        assert_eq!(prefab.nodes.len(), 4);
        for node in &prefab.nodes {
            assert_eq!(node.radius, ENTRANCE_NODE_RADIUS);
            assert_eq!(node.position.sqr_distance(&center), 1);
            assert!(node.normal(1).sqr_distance(&center) > node.position.sqr_distance(&center));
        }
    }

    #[test]
    fn test_entrances_only_on_free_deep_tiles() {
        let config = CaveConfig::for_world(512);
        let mut heightmap = HeightMap::flat(512, 80.0);
        // Tile starting at (256, 0) is too shallow.
        for x in 230..400 {
            for z in 0..160 {
                heightmap.set_height(x, z, 10.0);
            }
        }

        let mut used = StreetTile::new(0, 256, 128);
        used.used = true;
        let tiles = vec![StreetTile::new(0, 0, 128), StreetTile::new(256, 0, 128), used];

        let mut index = PrefabIndex::new(512);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert_eq!(plan_natural_entrances(&mut index, &tiles, &heightmap, &config, &mut rng), 1);

        let entrance = &index.prefabs()[0];
        assert!(entrance.is_natural_entrance);
        let center = entrance.position + Vector3i::ONE;
        assert!(center.y >= config.bedrock_margin && center.y < 80 - config.min_entrance_depth);

        // The column is invisible to spatial queries but its nodes are graphed.
        assert_eq!(index.nearest_prefabs(&center).count(), 0);
        assert!(!index.intersect_with_prefab(&center));
        assert_eq!(index.nodes().count(), 4);
    }

    #[test]
    fn test_selector_rotates_through_unused_names() {
        let catalog = wilderness_catalog();
        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut selector = EntranceSelector::new(&catalog);

            let first = selector.select(&mut rng).unwrap();
            let second = selector.select(&mut rng).unwrap();
            assert_ne!(first.name, second.name);
            assert!(selector.select(&mut rng).is_some());
        }
        assert!(EntranceSelector::new(&PrefabCatalog::default()).select(&mut ChaCha8Rng::seed_from_u64(0)).is_none());
    }

    #[test]
    fn test_wilderness_entrances_fill_free_tiles() {
        let config = CaveConfig::for_world(512);
        let heightmap = HeightMap::flat(512, 90.0);
        let catalog = wilderness_catalog();

        let mut water = StreetTile::new(256, 256, 128);
        water.water = true;
        let mut tiles = vec![StreetTile::new(0, 0, 128), StreetTile::new(256, 0, 128), StreetTile::new(0, 256, 128), water];

        let mut index = PrefabIndex::new(512);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let placed = plan_wilderness_entrances(&mut index, &catalog, &mut tiles, &heightmap, &config, &mut rng);
        assert_eq!(placed, 3);
        assert!(tiles[..3].iter().all(|t| t.used));
        assert!(!tiles[3].used);

        let names: HashSet<&str> = index.prefabs().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), 2);

        for prefab in index.prefabs() {
            assert!(prefab.is_surface && prefab.is_entrance);
            assert_eq!(prefab.end().y, 90);
            assert!(!prefab.nodes.is_empty());
            let tile = tiles.iter().find(|t| prefab.position.x >= t.x && prefab.position.z >= t.z
                && prefab.end().x <= t.x + t.size && prefab.end().z <= t.z + t.size);
            assert!(tile.is_some(), "{} leaves its tile", prefab.name);
        }

        // Natural entrances only go where no prefab was spawned.
        assert_eq!(plan_natural_entrances(&mut index, &tiles, &heightmap, &config, &mut rng), 0);
    }
}
