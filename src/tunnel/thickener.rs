//! Turns a one-voxel path into a tunnel volume.

use std::collections::HashSet;

use rand_chacha::ChaCha8Rng;

use super::radius::RadiusProfile;
use super::TunnelContext;
use crate::block::{flags, CaveBlock, MAX_Y};
use crate::geometry::Vector3i;
use crate::heightmap::HeightMap;
use crate::prefab::GraphNode;
use crate::sphere::SphereCache;

/// Radius of the shaft carved above a natural entrance.
const SHAFT_RADIUS: i32 = 2;

/// Carve spheres along `path` and at both node ends.
///
/// Blocks at or below bedrock, too close to the surface, above the storable
/// column or inside a prefab are dropped.
pub fn thicken(
    path: &[Vector3i],
    start: &GraphNode,
    target: &GraphNode,
    ctx: &TunnelContext<'_>,
    rng: &mut ChaCha8Rng,
) -> HashSet<CaveBlock> {
    let config = ctx.config;
    let mut carved: HashSet<Vector3i> = HashSet::with_capacity(path.len() * 64);

    carved.extend(ctx.spheres.sphere(start.position, start.radius));
    carved.extend(ctx.spheres.sphere(target.position, target.radius));

    let profile = RadiusProfile::new(rng, start.radius, target.radius, path.len());
    for (i, &point) in path.iter().enumerate() {
        let radius = profile.interpolate_clamped(i, config.min_tunnel_radius + 1, config.max_tunnel_radius);
        carved.extend(ctx.spheres.sphere(point, radius));
    }

    carved
        .into_iter()
        .filter(|p| {
            p.y > config.bedrock_margin
                && p.y <= MAX_Y
                && p.y + config.terrain_margin < ctx.heightmap.get_height_i(p.x, p.z)
                && !ctx.index.intersect_with_prefab(p)
        })
        .map(CaveBlock::at)
        .collect()
}

/// Vertical shaft from an entrance center up to the surface.
///
/// Blocks above the terrain or above [`MAX_Y`] are dropped; the rest skip
/// decoration so the shaft stays passable.
pub fn natural_entrance_shaft(center: Vector3i, heightmap: &HeightMap, spheres: &SphereCache) -> Vec<CaveBlock> {
    let mut carved: HashSet<Vector3i> = HashSet::new();
    let mut position = center;

    while position.y < MAX_Y && (position.y as f32) < heightmap.get_height(position.x, position.z) {
        position.y += 1;
        carved.extend(spheres.sphere(position, SHAFT_RADIUS));
    }

    carved
        .into_iter()
        .filter(|p| p.y <= MAX_Y && p.y as f32 <= heightmap.get_height(p.x, p.z))
        .map(|p| CaveBlock::with_flags(p, flags::SKIP_DECORATION))
        .collect()
}

/// Low points of a path where water may pool.
///
/// A point is a minimum when both neighbors are higher. A flat run counts
/// once, at its first point, when the path climbs again after it.
pub struct LocalMinima<'a> {
    path: &'a [CaveBlock],
    index: usize,
}

impl<'a> LocalMinima<'a> {
    pub fn new(path: &'a [CaveBlock]) -> Self {
        Self { path, index: 1 }
    }
}

impl<'a> Iterator for LocalMinima<'a> {
    type Item = CaveBlock;

    fn next(&mut self) -> Option<CaveBlock> {
        while self.index + 1 < self.path.len() {
            let i = self.index;
            self.index += 1;

            let prev = self.path[i - 1].y;
            let current = self.path[i];
            let next = self.path[i + 1].y;

            if prev <= current.y {
                continue;
            }
            if next > current.y {
                return Some(current);
            }
            if next == current.y {
                let mut j = i + 1;
                while j + 1 < self.path.len() && self.path[j + 1].y == current.y {
                    j += 1;
                }
                self.index = j + 1;
                if j + 1 < self.path.len() && self.path[j + 1].y > current.y {
                    return Some(current);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cavemap::CaveMap;
    use crate::config::CaveConfig;
    use crate::geometry::Direction;
    use crate::prefab::{CavePrefab, Marker, PrefabIndex};
    use crate::region::RegionGrid;
    use rand::SeedableRng;

    fn path(heights: &[i32]) -> Vec<CaveBlock> {
        heights.iter().enumerate().map(|(x, &y)| CaveBlock::new(x as i32, y, 0)).collect()
    }

    #[test]
    fn test_strict_minimum() {
        let p = path(&[10, 8, 6, 9, 12]);
        let minima: Vec<_> = LocalMinima::new(&p).collect();
        assert_eq!(minima.len(), 1);
        assert_eq!(minima[0].x, 2);
    }

    #[test]
    fn test_flat_minimum_reported_once() {
        let p = path(&[10, 6, 6, 6, 9, 5, 5, 4]);
        let minima: Vec<_> = LocalMinima::new(&p).collect();

        // The second basin never climbs back up.
        assert_eq!(minima.len(), 1);
        assert_eq!(minima[0].x, 1);
    }

    #[test]
    fn test_short_paths_have_no_minima() {
        assert_eq!(LocalMinima::new(&path(&[3, 1])).count(), 0);
        assert_eq!(LocalMinima::new(&[]).count(), 0);
    }

    #[test]
    fn test_shaft_reaches_surface() {
        let heightmap = HeightMap::flat(64, 40.0);
        let spheres = SphereCache::new(1, 4).unwrap();
        let center = Vector3i::new(30, 20, 30);

        let shaft = natural_entrance_shaft(center, &heightmap, &spheres);

        assert!(shaft.iter().any(|b| b.x == 30 && b.z == 30 && b.y == 40));
        assert!(shaft.iter().all(|b| b.y <= 40 && b.y >= 19));
        assert!(shaft.iter().all(|b| b.has(flags::SKIP_DECORATION)));
    }

    #[test]
    fn test_shaft_under_high_terrain_is_saveable() {
        let heightmap = HeightMap::flat(64, 300.0);
        let spheres = SphereCache::new(1, 4).unwrap();

        let shaft = natural_entrance_shaft(Vector3i::new(32, 100, 32), &heightmap, &spheres);
        assert!(shaft.iter().any(|b| b.y == MAX_Y));
        assert!(shaft.iter().all(|b| b.y <= MAX_Y));

        let mut map = CaveMap::new();
        map.add_blocks(shaft, 0);
        let dir = tempfile::tempdir().unwrap();
        assert!(map.save(dir.path(), RegionGrid::new(64, 32)).is_ok());
    }

    #[test]
    fn test_thicken_carves_profile_sphere_at_every_waypoint() {
        let mut index = PrefabIndex::new(64);
        let mut prefab = CavePrefab::new(0, "hall", Vector3i::new(10, 30, 10), Vector3i::new(8, 8, 8));
        prefab.randomize_markers(&mut ChaCha8Rng::seed_from_u64(4));
        index.add(prefab);

        let heightmap = HeightMap::flat(64, 60.0);
        let spheres = SphereCache::new(1, 6).unwrap();
        let config = CaveConfig::for_world(64);
        let ctx = TunnelContext { index: &index, heightmap: &heightmap, spheres: &spheres, config: &config };

        let node = |index, position, direction, radius| GraphNode {
            prefab_id: 0,
            index,
            position,
            marker: Marker::new(Vector3i::ZERO, Vector3i::new(3, 6, 3)),
            direction,
            radius,
        };
        let start = node(0, Vector3i::new(30, 25, 30), Direction::East, 3);
        let target = node(1, Vector3i::new(50, 35, 40), Direction::West, 4);
        let path: Vec<Vector3i> = (0..=20).map(|i| Vector3i::new(30 + i, 25 + i / 2, 30 + i / 2)).collect();

        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut profile_rng = rng.clone();
        let carved = thicken(&path, &start, &target, &ctx, &mut rng);
        let profile = RadiusProfile::new(&mut profile_rng, start.radius, target.radius, path.len());

        let kept = |p: &Vector3i| {
            p.y > config.bedrock_margin
                && p.y <= MAX_Y
                && p.y + config.terrain_margin < heightmap.get_height_i(p.x, p.z)
                && !index.intersect_with_prefab(p)
        };
        for (i, &point) in path.iter().enumerate() {
            let radius = profile.interpolate_clamped(i, config.min_tunnel_radius + 1, config.max_tunnel_radius);
            for p in spheres.sphere(point, radius).filter(kept) {
                assert!(carved.contains(&CaveBlock::at(p)), "waypoint {} misses {}", i, p);
            }
        }
    }
}
