//! Placed prefabs and their connection nodes.

use std::collections::HashSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::catalog::PrefabData;
use crate::config::{TAG_ENTRANCE, TAG_WILDERNESS};
use crate::geometry::{overlaps_2d, BoundingBox, Direction, Vector3i};

// =============================================================================
// MARKERS AND NODES
// =============================================================================

/// Connection marker box in prefab-local (already rotated) space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Marker {
    pub start: Vector3i,
    pub size: Vector3i,
}

impl Marker {
    pub fn new(start: Vector3i, size: Vector3i) -> Self {
        Self { start, size }
    }

    /// Integer center of the marker box.
    pub fn center(&self) -> Vector3i {
        self.start + self.size.shr(1)
    }

    /// Face of a prefab of `prefab_size` the marker sits on.
    pub fn direction(&self, prefab_size: Vector3i) -> Option<Direction> {
        if self.start.x == -1 {
            Some(Direction::North)
        } else if self.start.x == prefab_size.x {
            Some(Direction::South)
        } else if self.start.z == -1 {
            Some(Direction::West)
        } else if self.start.z == prefab_size.z {
            Some(Direction::East)
        } else {
            None
        }
    }
}

/// Reference to a node: owning prefab id and index within its node list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub prefab: usize,
    pub node: usize,
}

impl NodeRef {
    pub fn new(prefab: usize, node: usize) -> Self {
        Self { prefab, node }
    }
}

/// Directional connection point of a prefab.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub prefab_id: usize,
    pub index: usize,
    pub position: Vector3i,
    pub marker: Marker,
    pub direction: Direction,
    /// Tunnel radius at this end
    pub radius: i32,
}

impl GraphNode {
    /// Node derived from a marker of `prefab`; `None` if the marker is on
    /// no face.
    pub fn from_marker(prefab: &CavePrefab, index: usize, marker: Marker) -> Option<Self> {
        let direction = marker.direction(prefab.size)?;
        let size = marker.size;
        let radius = 1.max(size.x.max(size.z).min(size.y) / 2);

        Some(Self {
            prefab_id: prefab.id,
            index,
            position: prefab.position + marker.center(),
            marker,
            direction,
            radius,
        })
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.prefab_id, self.index)
    }

    /// Point `distance` blocks out of the prefab along the node's facing.
    pub fn normal(&self, distance: i32) -> Vector3i {
        self.position + self.direction.vector() * distance
    }

    /// Marker box in world space.
    pub fn marker_bounds(&self, prefab_position: Vector3i) -> BoundingBox {
        BoundingBox::new(prefab_position + self.marker.start, self.marker.size)
    }
}

// =============================================================================
// CAVE PREFAB
// =============================================================================

/// A placed structure taking part in the cave network.
#[derive(Clone, Debug)]
pub struct CavePrefab {
    pub id: usize,
    pub name: String,
    pub position: Vector3i,
    /// Size after rotation
    pub size: Vector3i,
    pub rotation: u8,
    pub tags: Vec<String>,
    pub markers: Vec<Marker>,
    pub nodes: Vec<GraphNode>,
    pub is_room: bool,
    pub is_entrance: bool,
    pub is_natural_entrance: bool,
    pub is_boundary: bool,
    pub is_cluster: bool,
    pub is_surface: bool,
    /// Minimum distance to another instance with the same name
    pub duplicate_distance: i32,
    /// Seed for procedural interiors
    pub seed: u64,
}

impl CavePrefab {
    pub fn new(id: usize, name: impl Into<String>, position: Vector3i, size: Vector3i) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            size,
            rotation: 0,
            tags: Vec::new(),
            markers: Vec::new(),
            nodes: Vec::new(),
            is_room: false,
            is_entrance: false,
            is_natural_entrance: false,
            is_boundary: false,
            is_cluster: false,
            is_surface: false,
            duplicate_distance: 0,
            seed: 0,
        }
    }

    /// Instance of a catalog prefab with its cave markers rotated into place.
    pub fn from_data(id: usize, data: &PrefabData, rotation: u8, position: Vector3i, default_distance: i32) -> Self {
        let rotation = rotation % 4;
        let size = rotated_size(data.size, rotation);
        let mut prefab = Self::new(id, data.name.clone(), position, size);

        prefab.rotation = rotation;
        prefab.tags = data.tags.clone();
        prefab.is_entrance = data.has_tag(TAG_ENTRANCE) || data.has_tag(TAG_WILDERNESS);
        prefab.duplicate_distance = data.duplicate_repeat_distance.unwrap_or(default_distance);
        prefab.markers = data
            .cave_markers()
            .map(|m| {
                let rotated = BoundingBox::new(m.start, m.size).transform(Vector3i::ZERO, rotation, data.size);
                Marker::new(rotated.start, rotated.size)
            })
            .collect();
        prefab.update_nodes();
        prefab
    }

    /// Rebuild nodes from the current markers and position.
    pub fn update_nodes(&mut self) {
        let markers = std::mem::take(&mut self.markers);
        let mut nodes = Vec::with_capacity(markers.len());
        let mut kept = Vec::with_capacity(markers.len());

        for marker in markers {
            if let Some(node) = GraphNode::from_marker(self, nodes.len(), marker) {
                nodes.push(node);
                kept.push(marker);
            } else {
                log::warn!("marker [{}] of '{}' is on no face, ignored", marker.start, self.name);
            }
        }

        self.markers = kept;
        self.nodes = nodes;
    }

    /// Move the prefab, dragging its nodes along.
    pub fn set_position(&mut self, position: Vector3i) {
        let delta = position - self.position;
        self.position = position;
        for node in &mut self.nodes {
            node.position += delta;
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.position, self.size)
    }

    pub fn end(&self) -> Vector3i {
        self.position + self.size
    }

    pub fn center(&self) -> Vector3i {
        self.position + self.size.shr(1)
    }

    pub fn intersect_2d(&self, p: &Vector3i) -> bool {
        self.bounds().contains_2d(p)
    }

    pub fn intersect_3d(&self, p: &Vector3i) -> bool {
        self.bounds().contains(p)
    }

    /// Whether `p` lies inside one of the marker boxes.
    pub fn intersect_marker(&self, p: &Vector3i) -> bool {
        self.markers
            .iter()
            .any(|m| BoundingBox::new(self.position + m.start, m.size).contains(p))
    }

    pub fn overlaps_2d(&self, other: &CavePrefab, margin: i32) -> bool {
        overlaps_2d(self.position, self.size, other.position, other.size, margin)
    }

    /// Drop nodes (and their markers) facing `direction`.
    pub fn remove_markers(&mut self, direction: Direction) {
        let size = self.size;
        self.markers.retain(|m| m.direction(size) != Some(direction));
        self.update_nodes();
    }

    /// Points of every marker box in world space.
    pub fn marker_points(&self) -> HashSet<Vector3i> {
        self.markers
            .iter()
            .flat_map(|m| {
                BoundingBox::new(self.position + m.start, m.size)
                    .points()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Replace markers by one random marker per face.
    pub fn randomize_markers(&mut self, rng: &mut ChaCha8Rng) {
        self.markers = (0..4).map(|side| random_marker(rng, side, self.size)).collect();
        self.update_nodes();
    }
}

/// Random marker on one face of a prefab of `size`.
///
/// Sides: 0 = west (z = -1), 1 = east (z = size.z), 2 = north (x = -1),
/// 3 = south (x = size.x).
pub fn random_marker(rng: &mut ChaCha8Rng, side: u8, size: Vector3i) -> Marker {
    let sy = size.y.clamp(1, 5);
    let py = (size.y - sy) / 2;

    match side % 4 {
        0 | 1 => {
            let sx = (size.x - 2).clamp(1, 5);
            let px = rng.gen_range(1..=(size.x - sx - 1).max(1));
            let pz = if side == 0 { -1 } else { size.z };
            Marker::new(Vector3i::new(px, py, pz), Vector3i::new(sx, sy, 1))
        }
        _ => {
            let sz = (size.z - 2).clamp(1, 5);
            let pz = rng.gen_range(1..=(size.z - sz - 1).max(1));
            let px = if side == 2 { -1 } else { size.x };
            Marker::new(Vector3i::new(px, py, pz), Vector3i::new(1, sy, sz))
        }
    }
}

/// Footprint size after `rotation` quarter turns.
pub fn rotated_size(size: Vector3i, rotation: u8) -> Vector3i {
    if rotation % 2 == 1 {
        Vector3i::new(size.z, size.y, size.x)
    } else {
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefab::catalog::MarkerData;
    use rand::SeedableRng;

    fn hall() -> PrefabData {
        PrefabData {
            name: "hall".to_string(),
            size: Vector3i::new(20, 12, 10),
            tags: vec!["cave".to_string(), "underground".to_string()],
            markers: vec![
                MarkerData {
                    start: Vector3i::new(-1, 2, 3),
                    size: Vector3i::new(1, 5, 4),
                    tags: vec!["cavenode".to_string()],
                },
                MarkerData {
                    start: Vector3i::new(6, 2, 10),
                    size: Vector3i::new(4, 5, 1),
                    tags: vec!["cavenode".to_string()],
                },
            ],
            duplicate_repeat_distance: None,
            obstacles: Vec::new(),
        }
    }

    #[test]
    fn test_nodes_survive_every_rotation() {
        let data = hall();
        for rotation in 0..4 {
            let prefab = CavePrefab::from_data(0, &data, rotation, Vector3i::new(100, 20, 100), 50);
            assert_eq!(prefab.nodes.len(), 2, "rotation {}", rotation);

            for node in &prefab.nodes {
                // The node sits just outside the footprint, facing away from it.
                assert!(!prefab.intersect_2d(&node.normal(1)));
                assert!(prefab.intersect_2d(&node.normal(-1)));
            }
        }
    }

    #[test]
    fn test_node_radius() {
        let prefab = CavePrefab::from_data(0, &hall(), 0, Vector3i::ZERO, 50);
        // max(1, 4) = 4, min(4, 5) = 4, / 2 = 2
        assert_eq!(prefab.nodes[0].radius, 2);
        assert_eq!(prefab.nodes[0].direction, Direction::North);
        assert_eq!(prefab.nodes[1].direction, Direction::East);
    }

    #[test]
    fn test_set_position_moves_nodes() {
        let mut prefab = CavePrefab::from_data(0, &hall(), 1, Vector3i::ZERO, 50);
        let before = prefab.nodes[0].position;
        prefab.set_position(Vector3i::new(10, 5, -3));
        assert_eq!(prefab.nodes[0].position, before + Vector3i::new(10, 5, -3));
    }

    #[test]
    fn test_random_markers_one_per_face() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut prefab = CavePrefab::new(0, "room", Vector3i::new(50, 10, 50), Vector3i::new(30, 20, 40));
        prefab.randomize_markers(&mut rng);

        let directions: HashSet<Direction> = prefab.nodes.iter().map(|n| n.direction).collect();
        assert_eq!(directions.len(), 4);

        prefab.remove_markers(Direction::North);
        assert_eq!(prefab.nodes.len(), 3);
        assert!(prefab.nodes.iter().all(|n| n.direction != Direction::North));
        assert!(prefab.nodes.iter().enumerate().all(|(i, n)| n.index == i));
    }
}
