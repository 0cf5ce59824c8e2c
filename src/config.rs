//! Generation parameters.
//!
//! Every field has a default so a configuration file only needs to list the
//! values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CaveError, CaveResult};
use crate::noise_field::{FractalKind, NoiseConfig, NoiseKind, WaterLevel};

// =============================================================================
// TAGS
// =============================================================================

/// Tag every cave-related catalog prefab must carry.
pub const TAG_CAVE: &str = "cave";
/// Prefabs fully buried underground.
pub const TAG_UNDERGROUND: &str = "underground";
/// Prefabs opening to the surface.
pub const TAG_ENTRANCE: &str = "entrance";
/// Entrances meant for wilderness tiles.
pub const TAG_WILDERNESS: &str = "wilderness";
/// Marker tag turning a prefab marker into a graph node.
pub const TAG_CAVE_MARKER: &str = "cavenode";

/// Parameters for cave generation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    /// Side length of the square world in blocks
    pub world_size: i32,
    /// Side length of a region file in blocks (multiple of 16)
    pub region_size: i32,
    /// Blocks at or below this height are never carved
    pub bedrock_margin: i32,
    /// Minimum solid thickness kept between caves and the terrain surface
    pub terrain_margin: i32,
    /// Horizontal clearance between placed prefabs
    pub overlap_margin: i32,
    /// Horizontal clearance between cave rooms and other prefabs
    pub room_overlap_margin: i32,
    /// Width of the radiation zone along world edges
    pub radiation_size: i32,
    /// Extra clearance beyond the radiation zone
    pub radiation_zone_margin: i32,
    /// Smallest sphere radius used to thicken tunnels
    pub min_tunnel_radius: i32,
    /// Largest sphere radius used to thicken tunnels
    pub max_tunnel_radius: i32,
    /// Highest y a tunnel waypoint may reach
    pub max_tunnel_height: i32,
    /// Placement tries per prefab before it is skipped
    pub placement_attempts: usize,
    /// Underground prefabs to place (defaults to world_size / 5)
    pub underground_prefab_count: Option<usize>,
    /// Cave rooms to place
    pub cave_room_count: usize,
    /// Default distance between two instances of the same prefab
    pub min_same_prefab_distance: i32,
    /// Street tile size used for boundary rooms and entrances
    pub street_tile_size: i32,
    /// Place rooms along the outer ring of street tiles
    pub boundary_rooms: bool,
    /// Place natural entrances on wilderness tiles
    pub natural_entrances: bool,
    /// Minimum terrain height above a natural entrance
    pub min_entrance_depth: i32,
    /// Prune redundant graph edges before tunneling
    pub prune_graph: bool,
    /// Fill local minima of tunnels with water
    pub generate_water: bool,
    /// Amount of water when `generate_water` is set
    pub water_level: WaterLevel,
    /// Noise used to carve room interiors
    pub room_noise: NoiseConfig,
    /// Region files kept in memory by the runtime provider
    pub max_cached_regions: usize,
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            world_size: 2048,
            region_size: 512,
            bedrock_margin: 4,
            terrain_margin: 2,
            overlap_margin: 50,
            room_overlap_margin: 30,
            radiation_size: 150,
            radiation_zone_margin: 20,
            min_tunnel_radius: 2,
            max_tunnel_radius: 6,
            max_tunnel_height: 200,
            placement_attempts: 20,
            underground_prefab_count: None,
            cave_room_count: 1000,
            min_same_prefab_distance: 300,
            street_tile_size: 150,
            boundary_rooms: true,
            natural_entrances: true,
            min_entrance_depth: 20,
            prune_graph: true,
            generate_water: false,
            water_level: WaterLevel::Medium,
            room_noise: NoiseConfig {
                noise: NoiseKind::Perlin,
                fractal: FractalKind::Fbm,
                octaves: 2,
                frequency: 0.08,
                lacunarity: 2.0,
                gain: 0.5,
                threshold: 0.0,
                invert: false,
            },
            max_cached_regions: 4,
        }
    }
}

impl CaveConfig {
    /// Config for a world of the given size with every other value default.
    pub fn for_world(world_size: i32) -> Self {
        Self { world_size, ..Self::default() }
    }

    /// Load a config from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CaveResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: CaveConfig = serde_json::from_str(&text)
            .map_err(|e| CaveError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of underground prefabs to place.
    pub fn underground_target(&self) -> usize {
        self.underground_prefab_count
            .unwrap_or((self.world_size / 5).max(0) as usize)
    }

    /// Distance from the world edge inside which nothing is placed.
    pub fn edge_offset(&self) -> i32 {
        self.radiation_size + self.radiation_zone_margin
    }

    /// Reject parameter combinations the pipeline cannot work with.
    pub fn validate(&self) -> CaveResult<()> {
        if self.world_size <= 0 || self.world_size % 32 != 0 {
            return Err(CaveError::Config(format!(
                "world_size must be a positive multiple of 32, got {}",
                self.world_size
            )));
        }
        if self.region_size < 16 || self.region_size % 16 != 0 {
            return Err(CaveError::Config(format!(
                "region_size must be a positive multiple of 16, got {}",
                self.region_size
            )));
        }
        if self.min_tunnel_radius < 1 || self.min_tunnel_radius > self.max_tunnel_radius {
            return Err(CaveError::Config(format!(
                "invalid tunnel radius range {}..={}",
                self.min_tunnel_radius, self.max_tunnel_radius
            )));
        }
        if self.bedrock_margin < 0 || self.max_tunnel_height > 255 {
            return Err(CaveError::Config(
                "tunnels must stay within the 0..=255 block column".to_string(),
            ));
        }
        if self.placement_attempts == 0 {
            return Err(CaveError::Config("placement_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CaveConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CaveConfig =
            serde_json::from_str(r#"{ "world_size": 1024, "generate_water": true }"#).unwrap();

        assert_eq!(config.world_size, 1024);
        assert!(config.generate_water);
        assert_eq!(config.bedrock_margin, 4);
        assert_eq!(config.underground_target(), 204);
    }

    #[test]
    fn test_unknown_noise_kind_rejected() {
        let result: Result<CaveConfig, _> =
            serde_json::from_str(r#"{ "room_noise": { "noise": "Simplex4D" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_world_size() {
        let config = CaveConfig::for_world(100);
        assert!(matches!(config.validate(), Err(CaveError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caves.json");
        fs::write(&path, r#"{ "world_size": 512, "cave_room_count": 3 }"#).unwrap();

        let config = CaveConfig::from_file(&path).unwrap();
        assert_eq!(config.cave_room_count, 3);
    }
}
