//! Surface information produced by the host world generator.
//!
//! A layout lists the surface prefabs already placed on the terrain and the
//! street tile grid. Both are optional: without a layout the cave network is
//! built under bare terrain and every tile counts as wilderness.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CaveError, CaveResult};
use crate::geometry::Vector3i;

/// Surface prefab instance, in generation coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfacePrefab {
    /// Catalog name of the prefab
    pub name: String,
    /// Lowest corner of the rotated footprint
    pub position: Vector3i,
    #[serde(default)]
    pub rotation: u8,
}

/// One square tile of the street grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreetTile {
    /// Lowest corner of the tile in generation coordinates
    pub x: i32,
    pub z: i32,
    pub size: i32,
    /// Tile already holds a prefab
    #[serde(default)]
    pub used: bool,
    /// Tile is entirely covered by water
    #[serde(default)]
    pub water: bool,
    #[serde(default = "default_wilderness")]
    pub wilderness: bool,
}

fn default_wilderness() -> bool {
    true
}

impl StreetTile {
    pub fn new(x: i32, z: i32, size: i32) -> Self {
        Self { x, z, size, used: false, water: false, wilderness: true }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.size / 2, self.z + self.size / 2)
    }

    /// Tile may host a natural entrance.
    pub fn accepts_entrance(&self) -> bool {
        self.wilderness && !self.used && !self.water
    }
}

/// Surface prefabs and street tiles of one world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldLayout {
    pub surface_prefabs: Vec<SurfacePrefab>,
    pub street_tiles: Vec<StreetTile>,
}

impl WorldLayout {
    pub fn load<P: AsRef<Path>>(path: P) -> CaveResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&text)
            .map_err(|e| CaveError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// Wilderness grid covering the world, leaving out tiles within
    /// `edge_offset` of the border.
    pub fn wilderness_grid(world_size: i32, tile_size: i32, edge_offset: i32) -> Self {
        let mut street_tiles = Vec::new();
        if tile_size > 0 {
            let grid = world_size / tile_size;
            for tz in 0..grid {
                for tx in 0..grid {
                    let tile = StreetTile::new(tx * tile_size, tz * tile_size, tile_size);
                    let (cx, cz) = tile.center();
                    let inside = |c: i32| c >= edge_offset && c < world_size - edge_offset;
                    if inside(cx) && inside(cz) {
                        street_tiles.push(tile);
                    }
                }
            }
        }

        Self { surface_prefabs: Vec::new(), street_tiles }
    }

    /// Whether the layout carries a street grid.
    pub fn has_street_tiles(&self) -> bool {
        !self.street_tiles.is_empty()
    }
}
