//! Axis-aligned boxes used for prefab collision and obstacle clusters.

use serde::{Deserialize, Serialize};

use super::Vector3i;

/// Axis-aligned box defined by its minimum corner and size.
///
/// `blocks_count` is only meaningful for boxes produced by clustering, where
/// it records how many obstacle voxels the box actually contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub start: Vector3i,
    pub size: Vector3i,
    #[serde(default)]
    pub blocks_count: usize,
}

impl BoundingBox {
    pub fn new(start: Vector3i, size: Vector3i) -> Self {
        Self { start, size, blocks_count: 0 }
    }

    pub fn with_count(start: Vector3i, size: Vector3i, blocks_count: usize) -> Self {
        Self { start, size, blocks_count }
    }

    /// Exclusive upper corner.
    pub fn end(&self) -> Vector3i {
        self.start + self.size
    }

    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        let no_x = self.start.x + self.size.x <= other.start.x || other.start.x + other.size.x <= self.start.x;
        let no_y = self.start.y + self.size.y <= other.start.y || other.start.y + other.size.y <= self.start.y;
        let no_z = self.start.z + self.size.z <= other.start.z || other.start.z + other.size.z <= self.start.z;

        !(no_x || no_y || no_z)
    }

    pub fn contains(&self, p: &Vector3i) -> bool {
        p.x >= self.start.x
            && p.x < self.start.x + self.size.x
            && p.y >= self.start.y
            && p.y < self.start.y + self.size.y
            && p.z >= self.start.z
            && p.z < self.start.z + self.size.z
    }

    pub fn contains_2d(&self, p: &Vector3i) -> bool {
        p.x >= self.start.x
            && p.x < self.start.x + self.size.x
            && p.z >= self.start.z
            && p.z < self.start.z + self.size.z
    }

    pub fn volume(&self) -> i64 {
        self.size.volume()
    }

    pub fn density(&self) -> f32 {
        let volume = self.volume();
        if volume == 0 {
            return 0.0;
        }
        self.blocks_count as f32 / volume as f32
    }

    pub fn max_size(&self) -> i32 {
        self.size.max_component()
    }

    pub fn min_size(&self) -> i32 {
        self.size.min_component()
    }

    /// Split into up to eight octants, dropping empty ones.
    ///
    /// Axes of length one are not split.
    pub fn octree(&self) -> Vec<BoundingBox> {
        let half = Vector3i::new(
            if self.size.x > 1 { self.size.x / 2 } else { 1 },
            if self.size.y > 1 { self.size.y / 2 } else { 1 },
            if self.size.z > 1 { self.size.z / 2 } else { 1 },
        );
        let rest = Vector3i::new(
            if self.size.x > 1 { self.size.x - half.x } else { 0 },
            if self.size.y > 1 { self.size.y - half.y } else { 0 },
            if self.size.z > 1 { self.size.z - half.z } else { 0 },
        );

        let mut octants = Vec::with_capacity(8);
        for (ox, sx) in [(0, half.x), (half.x, rest.x)] {
            for (oy, sy) in [(0, half.y), (half.y, rest.y)] {
                for (oz, sz) in [(0, half.z), (half.z, rest.z)] {
                    if sx > 0 && sy > 0 && sz > 0 {
                        octants.push(BoundingBox::new(
                            self.start + Vector3i::new(ox, oy, oz),
                            Vector3i::new(sx, sy, sz),
                        ));
                    }
                }
            }
        }

        octants
    }

    /// Iterate every integer point inside the box.
    pub fn points(&self) -> impl Iterator<Item = Vector3i> + '_ {
        let start = self.start;
        let end = self.end();
        (start.x..end.x).flat_map(move |x| {
            (start.y..end.y).flat_map(move |y| (start.z..end.z).map(move |z| Vector3i::new(x, y, z)))
        })
    }

    /// Rotate a box expressed in a parent's local space by `rotation`
    /// quarter turns and move it to `position`.
    ///
    /// `parent_size` is the unrotated parent size; the returned box is
    /// normalized so its size is always positive.
    pub fn transform(&self, position: Vector3i, rotation: u8, parent_size: Vector3i) -> BoundingBox {
        let (x, z) = (self.start.x, self.start.z);
        let (sx, sz) = (self.size.x, self.size.z);
        let (px, pz) = (parent_size.x, parent_size.z);

        // Corners as (start, signed size) before normalization.
        let (start_x, start_z, size_x, size_z) = match rotation % 4 {
            0 => (x, z, sx, sz),
            1 => (pz - z, x, -sz, sx),
            2 => (px - x, pz - z, -sx, -sz),
            _ => (z, px - x, sz, -sx),
        };

        let (start_x, size_x) = if size_x < 0 { (start_x + size_x, -size_x) } else { (start_x, size_x) };
        let (start_z, size_z) = if size_z < 0 { (start_z + size_z, -size_z) } else { (start_z, size_z) };

        BoundingBox {
            start: Vector3i::new(start_x, self.start.y, start_z) + position,
            size: Vector3i::new(size_x, self.size.y, size_z),
            blocks_count: self.blocks_count,
        }
    }

    /// Merge with a box adjacent along exactly one axis and sharing the same
    /// cross-section on the other two.
    pub fn try_merge(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let same_yz = self.start.y == other.start.y
            && self.size.y == other.size.y
            && self.start.z == other.start.z
            && self.size.z == other.size.z;
        let same_xz = self.start.x == other.start.x
            && self.size.x == other.size.x
            && self.start.z == other.start.z
            && self.size.z == other.size.z;
        let same_xy = self.start.x == other.start.x
            && self.size.x == other.size.x
            && self.start.y == other.start.y
            && self.size.y == other.size.y;

        let (first, second) = if self.start <= other.start { (self, other) } else { (other, self) };
        let count = self.blocks_count + other.blocks_count;

        if same_yz && first.start.x + first.size.x == second.start.x {
            let size = Vector3i::new(first.size.x + second.size.x, first.size.y, first.size.z);
            return Some(BoundingBox::with_count(first.start, size, count));
        }
        if same_xz && first.start.y + first.size.y == second.start.y {
            let size = Vector3i::new(first.size.x, first.size.y + second.size.y, first.size.z);
            return Some(BoundingBox::with_count(first.start, size, count));
        }
        if same_xy && first.start.z + first.size.z == second.start.z {
            let size = Vector3i::new(first.size.x, first.size.y, first.size.z + second.size.z);
            return Some(BoundingBox::with_count(first.start, size, count));
        }

        None
    }
}

/// 2D footprint overlap between two boxes, each expanded by `margin`.
pub fn overlaps_2d(pos1: Vector3i, size1: Vector3i, pos2: Vector3i, size2: Vector3i, margin: i32) -> bool {
    let no_x = pos1.x + size1.x + margin <= pos2.x || pos2.x + size2.x + margin <= pos1.x;
    let no_z = pos1.z + size1.z + margin <= pos2.z || pos2.z + size2.z + margin <= pos1.z;

    !(no_x || no_z)
}

/// Squared distance from a point to the closed box `[start, end]`; zero on
/// or inside the box.
pub fn sqr_distance_to_box(p: &Vector3i, start: &Vector3i, end: &Vector3i) -> i32 {
    let dx = (start.x - p.x).max(0).max(p.x - end.x);
    let dy = (start.y - p.y).max(0).max(p.y - end.y);
    let dz = (start.z - p.z).max(0).max(p.z - end.z);

    dx * dx + dy * dy + dz * dz
}
