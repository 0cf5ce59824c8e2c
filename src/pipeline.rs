//! End-to-end cave generation.
//!
//! Stages run one after another on a single [`PrefabIndex`]; only tunnel
//! routing and room carving fan out over rayon. Progress is reported through
//! a plain callback receiving the current stage and its completion in
//! `[0, 1]`.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::block::{flags, CaveBlock};
use crate::cavemap::CaveMap;
use crate::config::CaveConfig;
use crate::error::{CaveError, CaveResult};
use crate::geometry::Vector3i;
use crate::graph::{Graph, GraphEdge};
use crate::heightmap::HeightMap;
use crate::noise_field::{NoiseField, WaterNoise};
use crate::prefab::entrances::ENTRANCE_NODE_RADIUS;
use crate::prefab::{
    plan_natural_entrances, plan_wilderness_entrances, PrefabCatalog, PrefabIndex, PrefabPlacer, WorldLayout,
};
use crate::region::{Manifest, RegionGrid, RegionWriter};
use crate::room::CaveRoom;
use crate::seeds::CaveSeeds;
use crate::sphere::SphereCache;
use crate::tunnel::{natural_entrance_shaft, CaveTunnel, TunnelContext};

/// Edges routed between two progress reports.
const TUNNEL_BATCH: usize = 64;

// =============================================================================
// STAGES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    SurfacePrefabs,
    UndergroundPrefabs,
    Rooms,
    NaturalEntrances,
    Graph,
    Tunnels,
    RoomInteriors,
    Water,
    EntranceShafts,
    Save,
}

impl Stage {
    pub fn all() -> [Stage; 10] {
        [
            Stage::SurfacePrefabs,
            Stage::UndergroundPrefabs,
            Stage::Rooms,
            Stage::NaturalEntrances,
            Stage::Graph,
            Stage::Tunnels,
            Stage::RoomInteriors,
            Stage::Water,
            Stage::EntranceShafts,
            Stage::Save,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::SurfacePrefabs => "Surface prefabs",
            Stage::UndergroundPrefabs => "Underground prefabs",
            Stage::Rooms => "Cave rooms",
            Stage::NaturalEntrances => "Natural entrances",
            Stage::Graph => "Connection graph",
            Stage::Tunnels => "Tunnels",
            Stage::RoomInteriors => "Room interiors",
            Stage::Water => "Water",
            Stage::EntranceShafts => "Entrance shafts",
            Stage::Save => "Saving",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Counts gathered during one generation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationStats {
    pub prefabs: usize,
    pub surface_prefabs: usize,
    pub underground_prefabs: usize,
    pub rooms: usize,
    pub boundary_rooms: usize,
    pub natural_entrances: usize,
    pub wilderness_entrances: usize,
    pub edges: usize,
    pub tunnels: usize,
    pub failed_tunnels: usize,
    pub blocks: usize,
    pub room_blocks: usize,
    pub water_blocks: usize,
    pub regions: usize,
    pub elapsed_ms: u64,
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prefabs:           {}", self.prefabs)?;
        writeln!(f, "  surface:         {}", self.surface_prefabs)?;
        writeln!(f, "  underground:     {}", self.underground_prefabs)?;
        writeln!(f, "  rooms:           {} ({} on the boundary)", self.rooms + self.boundary_rooms, self.boundary_rooms)?;
        writeln!(
            f,
            "  entrances:       {} natural, {} wilderness",
            self.natural_entrances, self.wilderness_entrances
        )?;
        writeln!(f, "Graph edges:       {}", self.edges)?;
        writeln!(f, "Tunnels:           {} ({} failed)", self.tunnels, self.failed_tunnels)?;
        writeln!(f, "Cave blocks:       {}", self.blocks)?;
        writeln!(f, "Room blocks:       {}", self.room_blocks)?;
        writeln!(f, "Water blocks:      {}", self.water_blocks)?;
        writeln!(f, "Region files:      {}", self.regions)?;
        write!(f, "Elapsed:           {:.2}s", self.elapsed_ms as f64 / 1000.0)
    }
}

// =============================================================================
// GENERATED WORLD
// =============================================================================

/// Result of a generation run, ready to be saved.
pub struct CaveWorld {
    pub config: CaveConfig,
    pub seeds: CaveSeeds,
    pub index: PrefabIndex,
    pub graph: Graph,
    pub cavemap: CaveMap,
    pub stats: GenerationStats,
}

impl CaveWorld {
    /// Write region files and the manifest into `dir`.
    pub fn save<P: AsRef<Path>>(&mut self, dir: P) -> CaveResult<Manifest> {
        let start = Instant::now();
        let grid = RegionGrid::new(self.config.world_size, self.config.region_size);

        self.stats.regions = self.cavemap.save(dir.as_ref(), grid)?;
        let manifest = Manifest::new(&self.config, self.seeds.master, self.stats.clone());
        RegionWriter::new(dir.as_ref(), grid).write_manifest(&manifest)?;

        log::info!(
            "{} region files written to {} ({:.1?})",
            self.stats.regions,
            dir.as_ref().display(),
            start.elapsed()
        );
        Ok(manifest)
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Everything a generation run reads.
pub struct CaveGenerator {
    config: CaveConfig,
    seeds: CaveSeeds,
    heightmap: HeightMap,
    catalog: PrefabCatalog,
    layout: WorldLayout,
}

impl CaveGenerator {
    pub fn new(config: CaveConfig, seeds: CaveSeeds, heightmap: HeightMap, catalog: PrefabCatalog) -> CaveResult<Self> {
        config.validate()?;
        if heightmap.size() < config.world_size {
            return Err(CaveError::Config(format!(
                "heightmap covers {} blocks but the world is {} wide",
                heightmap.size(),
                config.world_size
            )));
        }

        Ok(Self { config, seeds, heightmap, catalog, layout: WorldLayout::default() })
    }

    pub fn with_layout(mut self, layout: WorldLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn config(&self) -> &CaveConfig {
        &self.config
    }

    /// Run every stage except saving.
    pub fn generate<F>(&self, mut progress: F) -> CaveResult<CaveWorld>
    where
        F: FnMut(Stage, f32),
    {
        let start = Instant::now();
        let config = &self.config;
        let mut stats = GenerationStats::default();
        let mut index = PrefabIndex::new(config.world_size);
        let placer = PrefabPlacer::new(config, &self.heightmap);

        log::info!("generating caves for a {} world, seeds: {}", config.world_size, self.seeds);

        // Prefab placement
        progress(Stage::SurfacePrefabs, 0.0);
        stats.surface_prefabs = placer.add_surface_prefabs(&mut index, &self.catalog, &self.layout);
        progress(Stage::SurfacePrefabs, 1.0);

        progress(Stage::UndergroundPrefabs, 0.0);
        let mut rng = CaveSeeds::rng(self.seeds.placement);
        stats.underground_prefabs = placer.place_underground(&mut index, &self.catalog, &mut rng)?;
        progress(Stage::UndergroundPrefabs, 1.0);

        progress(Stage::Rooms, 0.0);
        let mut rng = CaveSeeds::rng(self.seeds.rooms);
        stats.rooms = placer.place_rooms(&mut index, config.cave_room_count, &mut rng);
        if config.boundary_rooms {
            stats.boundary_rooms = placer.place_boundary_rooms(&mut index, &mut rng);
        }
        progress(Stage::Rooms, 1.0);

        progress(Stage::NaturalEntrances, 0.0);
        let mut rng = CaveSeeds::rng(self.seeds.entrances);
        let mut tiles = if self.layout.has_street_tiles() {
            self.layout.street_tiles.clone()
        } else {
            WorldLayout::wilderness_grid(config.world_size, config.street_tile_size, config.edge_offset()).street_tiles
        };
        stats.wilderness_entrances =
            plan_wilderness_entrances(&mut index, &self.catalog, &mut tiles, &self.heightmap, config, &mut rng);
        if config.natural_entrances {
            stats.natural_entrances = plan_natural_entrances(&mut index, &tiles, &self.heightmap, config, &mut rng);
        }
        progress(Stage::NaturalEntrances, 1.0);
        stats.prefabs = index.len();

        // Graph
        progress(Stage::Graph, 0.0);
        let graph = Graph::build(&index, config.prune_graph)?;
        stats.edges = graph.len();
        progress(Stage::Graph, 1.0);

        let spheres = SphereCache::new(1, config.max_tunnel_radius.max(ENTRANCE_NODE_RADIUS))?;
        let ctx = TunnelContext { index: &index, heightmap: &self.heightmap, spheres: &spheres, config };

        // Tunnels
        progress(Stage::Tunnels, 0.0);
        let (mut cavemap, minima) = self.carve_tunnels(&graph, &ctx, &mut stats, &mut progress);

        // Rooms
        progress(Stage::RoomInteriors, 0.0);
        let room_seed = CaveSeeds::noise_seed(self.seeds.rooms);
        let rooms: Vec<CaveRoom> = index.prefabs().iter().filter(|p| p.is_room).map(CaveRoom::from_prefab).collect();
        // Cellular noise is not Sync, so every worker builds its own field.
        let interiors: Vec<Vec<CaveBlock>> = rooms
            .par_iter()
            .map_init(
                || NoiseField::new(&config.room_noise, room_seed),
                |noise, room| room.blocks(noise, &spheres),
            )
            .collect();
        for blocks in interiors {
            stats.room_blocks += blocks.len();
            cavemap.add_room(blocks);
        }
        log::info!("{} room interiors carved", rooms.len());
        progress(Stage::RoomInteriors, 1.0);

        // Water
        progress(Stage::Water, 0.0);
        if config.generate_water {
            let noise = WaterNoise::new(CaveSeeds::noise_seed(self.seeds.water), config.water_level);
            stats.water_blocks = cavemap.fill_water(minima, &noise, &index);
        }
        progress(Stage::Water, 1.0);

        // Shafts up from natural entrances
        progress(Stage::EntranceShafts, 0.0);
        for prefab in index.prefabs().iter().filter(|p| p.is_natural_entrance) {
            let shaft = natural_entrance_shaft(prefab.position + Vector3i::ONE, &self.heightmap, &spheres);
            cavemap.add_blocks(shaft, flags::SKIP_DECORATION);
        }
        progress(Stage::EntranceShafts, 1.0);

        let floors = cavemap.mark_surfaces();
        log::debug!("{} floor blocks marked", floors);

        stats.blocks = cavemap.blocks_count();
        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        log::info!("{} cave blocks generated ({:.1?})", stats.blocks, start.elapsed());

        Ok(CaveWorld { config: config.clone(), seeds: self.seeds.clone(), index, graph, cavemap, stats })
    }

    /// Run every stage and save the result into `dir`.
    pub fn generate_into<P, F>(&self, dir: P, mut progress: F) -> CaveResult<CaveWorld>
    where
        P: AsRef<Path>,
        F: FnMut(Stage, f32),
    {
        let mut world = self.generate(&mut progress)?;

        progress(Stage::Save, 0.0);
        world.save(dir)?;
        progress(Stage::Save, 1.0);

        Ok(world)
    }

    /// Route and carve one tunnel per edge, returning the map and the local
    /// minima of every tunnel in edge order.
    fn carve_tunnels<F>(
        &self,
        graph: &Graph,
        ctx: &TunnelContext<'_>,
        stats: &mut GenerationStats,
        progress: &mut F,
    ) -> (CaveMap, Vec<CaveBlock>)
    where
        F: FnMut(Stage, f32),
    {
        let start = Instant::now();
        let edges: Vec<&GraphEdge> = graph.edges().collect();
        let cavemap = Mutex::new(CaveMap::new());
        let mut minima = Vec::new();

        for (batch_index, batch) in edges.chunks(TUNNEL_BATCH).enumerate() {
            let offset = batch_index * TUNNEL_BATCH;

            let results: Vec<Option<Vec<CaveBlock>>> = batch
                .par_iter()
                .enumerate()
                .map(|(i, edge)| {
                    let mut rng = CaveSeeds::rng(self.seeds.tunnels.wrapping_add((offset + i) as u64));
                    let tunnel = CaveTunnel::build(edge, ctx, &mut rng)?;
                    let local: Vec<CaveBlock> = tunnel.local_minima().collect();

                    cavemap.lock().unwrap_or_else(PoisonError::into_inner).add_tunnel(&tunnel);
                    Some(local)
                })
                .collect();

            for result in results {
                match result {
                    Some(local) => {
                        stats.tunnels += 1;
                        minima.extend(local);
                    }
                    None => stats.failed_tunnels += 1,
                }
            }

            progress(Stage::Tunnels, (offset + batch.len()) as f32 / edges.len() as f32);
        }

        if stats.failed_tunnels > 0 {
            log::warn!("{} of {} tunnels could not be routed", stats.failed_tunnels, edges.len());
        }
        log::info!("{} tunnels carved ({:.1?})", stats.tunnels, start.elapsed());

        let cavemap = cavemap.into_inner().unwrap_or_else(PoisonError::into_inner);
        (cavemap, minima)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::WaterLevel;
    use crate::prefab::{MarkerData, PrefabData};
    use crate::region::CaveChunksProvider;
    use tempfile::tempdir;

    fn marker(start: Vector3i, size: Vector3i) -> MarkerData {
        MarkerData { start, size, tags: vec!["cavenode".to_string()] }
    }

    fn catalog() -> PrefabCatalog {
        PrefabCatalog::new(vec![PrefabData {
            name: "crypt".to_string(),
            size: Vector3i::new(16, 10, 12),
            tags: vec!["cave".to_string(), "underground".to_string()],
            markers: vec![
                marker(Vector3i::new(-1, 2, 4), Vector3i::new(1, 4, 4)),
                marker(Vector3i::new(16, 2, 4), Vector3i::new(1, 4, 4)),
                marker(Vector3i::new(6, 2, -1), Vector3i::new(4, 4, 1)),
            ],
            duplicate_repeat_distance: Some(20),
            obstacles: Vec::new(),
        }])
        .unwrap()
    }

    fn config() -> CaveConfig {
        CaveConfig {
            world_size: 256,
            region_size: 128,
            radiation_size: 10,
            radiation_zone_margin: 10,
            overlap_margin: 10,
            room_overlap_margin: 10,
            underground_prefab_count: Some(8),
            cave_room_count: 2,
            street_tile_size: 64,
            boundary_rooms: false,
            generate_water: true,
            water_level: WaterLevel::Full,
            ..CaveConfig::default()
        }
    }

    fn generator(master: u64) -> CaveGenerator {
        let config = config();
        let heightmap = HeightMap::flat(config.world_size, 100.0);
        CaveGenerator::new(config, CaveSeeds::from_master(master), heightmap, catalog()).unwrap()
    }

    #[test]
    fn test_generation_produces_caves() {
        let mut stages = Vec::new();
        let world = generator(3)
            .generate(|stage, done| {
                assert!((0.0..=1.0).contains(&done));
                if done == 0.0 {
                    stages.push(stage);
                }
            })
            .unwrap();

        assert!(world.stats.underground_prefabs > 0);
        assert!(world.stats.edges > 0);
        assert!(world.stats.tunnels > 0);
        assert_eq!(world.stats.blocks, world.cavemap.blocks_count());
        assert!(world.cavemap.blocks_count() > 0);
        assert_eq!(stages, Stage::all()[..9].to_vec());

        let bedrock = world.config.bedrock_margin;
        let shafts_only = |b: &CaveBlock| b.has(flags::SKIP_DECORATION);
        assert!(world.cavemap.iter().filter(|b| !shafts_only(b)).all(|b| b.y > bedrock || b.is_room()));
    }

    #[test]
    fn test_same_seed_same_caves() {
        let a = generator(9).generate(|_, _| {}).unwrap();
        let b = generator(9).generate(|_, _| {}).unwrap();

        assert_eq!(a.stats.blocks, b.stats.blocks);
        assert_eq!(a.stats.water_blocks, b.stats.water_blocks);
        assert!(a.cavemap.iter().all(|block| b.cavemap.is_cave(&block.position())));
    }

    #[test]
    fn test_generated_world_is_queryable() {
        let dir = tempdir().unwrap();
        let world = generator(5).generate_into(dir.path(), |_, _| {}).unwrap();
        assert!(world.stats.regions > 0);

        let provider = CaveChunksProvider::open(dir.path()).unwrap();
        let grid = provider.grid();
        for block in world.cavemap.iter().step_by(97).take(50) {
            assert!(provider.is_cave(grid.to_runtime(block.x), block.y, grid.to_runtime(block.z)));
        }

        let manifest = Manifest::load(dir.path()).unwrap();
        assert_eq!(manifest.stats, world.stats);
        assert_eq!(manifest.seed, 5);
    }

    #[test]
    fn test_rooms_are_carved() {
        let world = generator(11).generate(|_, _| {}).unwrap();

        assert!(world.stats.rooms > 0);
        assert!(world.stats.room_blocks > 0);
        assert!(world.cavemap.iter().any(|b| b.is_room()));
    }

    #[test]
    fn test_surfaces_flagged_after_generation() {
        let world = generator(4).generate(|_, _| {}).unwrap();

        assert!(world.cavemap.iter().any(|b| b.has(flags::FLOOR)));
        assert!(world.cavemap.iter().any(|b| b.has(flags::CEILING)));
        for block in world.cavemap.iter().filter(|b| b.has(flags::FLOOR)) {
            assert!(!world.cavemap.is_cave(&(block.position() - Vector3i::UP)));
        }
    }

    #[test]
    fn test_wilderness_entrances_placed_from_pool() {
        let mut prefabs: Vec<PrefabData> = catalog().iter().cloned().collect();
        prefabs.push(PrefabData {
            name: "sinkhole".to_string(),
            size: Vector3i::new(12, 20, 12),
            tags: vec!["cave".to_string(), "entrance".to_string(), "wilderness".to_string()],
            markers: vec![marker(Vector3i::new(-1, 2, 4), Vector3i::new(1, 4, 4))],
            duplicate_repeat_distance: Some(10),
            obstacles: Vec::new(),
        });
        let config = config();
        let heightmap = HeightMap::flat(config.world_size, 100.0);
        let generator = CaveGenerator::new(
            config,
            CaveSeeds::from_master(6),
            heightmap,
            PrefabCatalog::new(prefabs).unwrap(),
        )
        .unwrap();

        let world = generator.generate(|_, _| {}).unwrap();
        assert!(world.stats.wilderness_entrances > 0);

        let spawned: Vec<_> = world.index.prefabs().iter().filter(|p| p.name == "sinkhole").collect();
        assert_eq!(spawned.len(), world.stats.wilderness_entrances);
        assert!(spawned.iter().all(|p| p.is_surface && p.end().y == 100));
    }

    #[test]
    fn test_small_heightmap_rejected() {
        let result = CaveGenerator::new(
            config(),
            CaveSeeds::from_master(1),
            HeightMap::flat(128, 100.0),
            catalog(),
        );
        assert!(matches!(result, Err(CaveError::Config(_))));
    }
}
