//! Chunk-bucketed index of placed prefabs.
//!
//! Each prefab is registered in every chunk cell its footprint covers plus a
//! one-cell halo around them. Queries only look at the bucket of the query
//! point, so a very large prefab may be missed from points more than one cell
//! away from any cell it covers. Pathfinding relies on this exact rule.

use std::collections::HashMap;

use super::cave_prefab::{CavePrefab, GraphNode, NodeRef};
use crate::geometry::{chunk_coord, sqr_distance_to_box, Vector3i};

/// Spatial index owning all prefabs placed during one generation run.
#[derive(Default)]
pub struct PrefabIndex {
    world_size: i32,
    prefabs: Vec<CavePrefab>,
    buckets: HashMap<(i32, i32), Vec<usize>>,
    placements: HashMap<String, Vec<Vector3i>>,
}

impl PrefabIndex {
    pub fn new(world_size: i32) -> Self {
        Self { world_size, ..Self::default() }
    }

    pub fn world_size(&self) -> i32 {
        self.world_size
    }

    /// Id the next added prefab will receive.
    pub fn next_id(&self) -> usize {
        self.prefabs.len()
    }

    /// Register a prefab; its id is overwritten with its index.
    pub fn add(&mut self, prefab: CavePrefab) -> usize {
        let start = prefab.position;
        let end = prefab.position + prefab.size - Vector3i::ONE;
        let id = self.add_unbucketed(prefab);

        for cx in chunk_coord(start.x) - 1..=chunk_coord(end.x) + 1 {
            for cz in chunk_coord(start.z) - 1..=chunk_coord(end.z) + 1 {
                self.buckets.entry((cx, cz)).or_default().push(id);
            }
        }

        id
    }

    /// Register a prefab that spatial queries never see.
    ///
    /// Natural entrance columns go here: their nodes join the graph and
    /// placement still avoids them, but tunnels may carve into the shaft.
    pub fn add_unbucketed(&mut self, mut prefab: CavePrefab) -> usize {
        let id = self.prefabs.len();
        prefab.id = id;
        for node in &mut prefab.nodes {
            node.prefab_id = id;
        }

        if !prefab.is_cluster && !prefab.is_room {
            self.placements
                .entry(prefab.name.clone())
                .or_default()
                .push(prefab.center());
        }

        self.prefabs.push(prefab);
        id
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&CavePrefab> {
        self.prefabs.get(id)
    }

    pub fn prefabs(&self) -> &[CavePrefab] {
        &self.prefabs
    }

    pub fn node(&self, node: NodeRef) -> Option<&GraphNode> {
        self.prefabs.get(node.prefab)?.nodes.get(node.node)
    }

    /// Prefabs bucketed in the chunk containing `pos`.
    pub fn nearest_prefabs(&self, pos: &Vector3i) -> impl Iterator<Item = &CavePrefab> + '_ {
        self.buckets
            .get(&(chunk_coord(pos.x), chunk_coord(pos.z)))
            .into_iter()
            .flatten()
            .map(move |&id| &self.prefabs[id])
    }

    /// Squared distance from `pos` to the closest bucketed prefab,
    /// `i32::MAX` when the bucket is empty.
    pub fn min_sqr_distance_to_prefab(&self, pos: &Vector3i) -> i32 {
        self.nearest_prefabs(pos)
            .map(|p| sqr_distance_to_box(pos, &p.position, &p.end()))
            .min()
            .unwrap_or(i32::MAX)
    }

    pub fn intersect_with_prefab(&self, pos: &Vector3i) -> bool {
        self.nearest_prefabs(pos).any(|p| p.intersect_3d(pos))
    }

    pub fn intersect_marker(&self, pos: &Vector3i) -> bool {
        self.nearest_prefabs(pos).any(|p| p.intersect_marker(pos))
    }

    /// Whether any placed non-cluster prefab overlaps `candidate` in 2D.
    pub fn overlaps_any_2d(&self, candidate: &CavePrefab, margin: i32) -> bool {
        self.prefabs
            .iter()
            .filter(|p| !p.is_cluster)
            .any(|p| candidate.overlaps_2d(p, margin))
    }

    /// Whether an instance with the same name is closer than its
    /// duplicate distance.
    pub fn is_near_same_prefab(&self, candidate: &CavePrefab) -> bool {
        let Some(positions) = self.placements.get(&candidate.name) else {
            return false;
        };

        let center = candidate.center();
        let min_dist = candidate.duplicate_distance;
        let sqr_min_dist = (min_dist as i64) * (min_dist as i64);

        positions
            .iter()
            .any(|p| (center.sqr_distance(p) as i64) < sqr_min_dist)
    }

    /// Surface prefabs whose footprint overlaps the given one.
    pub fn surface_prefabs_over(&self, position: Vector3i, size: Vector3i) -> impl Iterator<Item = &CavePrefab> + '_ {
        self.prefabs
            .iter()
            .filter(move |p| (p.is_surface || p.is_cluster) && crate::geometry::overlaps_2d(p.position, p.size, position, size, 0))
    }

    /// All connection nodes of all prefabs.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.prefabs.iter().flat_map(|p| p.nodes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefab(position: Vector3i, size: Vector3i) -> CavePrefab {
        CavePrefab::new(0, "box", position, size)
    }

    #[test]
    fn test_bucket_includes_one_cell_halo() {
        let mut index = PrefabIndex::new(256);
        index.add(prefab(Vector3i::new(32, 10, 32), Vector3i::new(16, 5, 16)));

        // Covered chunk is (2, 2); halo spans 1..=3.
        assert_eq!(index.nearest_prefabs(&Vector3i::new(16, 0, 16)).count(), 1);
        assert_eq!(index.nearest_prefabs(&Vector3i::new(63, 0, 63)).count(), 1);
        assert_eq!(index.nearest_prefabs(&Vector3i::new(64, 0, 40)).count(), 0);
        assert_eq!(index.nearest_prefabs(&Vector3i::new(15, 0, 40)).count(), 0);
    }

    #[test]
    fn test_min_distance_and_intersection() {
        let mut index = PrefabIndex::new(256);
        index.add(prefab(Vector3i::new(20, 5, 20), Vector3i::new(10, 10, 10)));

        assert_eq!(index.min_sqr_distance_to_prefab(&Vector3i::new(25, 10, 25)), 0);
        assert_eq!(index.min_sqr_distance_to_prefab(&Vector3i::new(25, 10, 36)), 36);
        assert!(index.intersect_with_prefab(&Vector3i::new(20, 5, 20)));
        assert!(!index.intersect_with_prefab(&Vector3i::new(30, 5, 20)));
        assert_eq!(index.min_sqr_distance_to_prefab(&Vector3i::new(200, 10, 200)), i32::MAX);
    }

    #[test]
    fn test_add_assigns_ids() {
        let mut index = PrefabIndex::new(256);
        let a = index.add(prefab(Vector3i::new(0, 0, 0), Vector3i::ONE));
        let b = index.add(prefab(Vector3i::new(100, 0, 100), Vector3i::ONE));

        assert_eq!((a, b), (0, 1));
        assert_eq!(index.get(b).map(|p| p.id), Some(1));
    }

    #[test]
    fn test_near_same_prefab() {
        let mut index = PrefabIndex::new(1024);
        let mut first = prefab(Vector3i::new(100, 10, 100), Vector3i::new(10, 10, 10));
        first.duplicate_distance = 100;
        index.add(first.clone());

        let mut close = first.clone();
        close.set_position(Vector3i::new(150, 10, 100));
        assert!(index.is_near_same_prefab(&close));

        let mut far = first.clone();
        far.set_position(Vector3i::new(400, 10, 100));
        assert!(!index.is_near_same_prefab(&far));

        let mut other = close.clone();
        other.name = "other".to_string();
        assert!(!index.is_near_same_prefab(&other));
    }
}
