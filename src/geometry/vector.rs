//! Integer 3D coordinates.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Integer 3D coordinate used as both position and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vector3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

// Bit budget of the packed hash: 24 bits x, 16 bits y, 24 bits z.
const PACK_XZ_BITS: u32 = 24;
const PACK_Y_BITS: u32 = 16;
const PACK_XZ_OFFSET: i64 = 1 << (PACK_XZ_BITS - 1);
const PACK_Y_OFFSET: i64 = 1 << (PACK_Y_BITS - 1);

impl Vector3i {
    pub const ZERO: Vector3i = Vector3i { x: 0, y: 0, z: 0 };
    pub const ONE: Vector3i = Vector3i { x: 1, y: 1, z: 1 };
    pub const UP: Vector3i = Vector3i { x: 0, y: 1, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Deterministic bit-packed key.
    ///
    /// Coordinates are offset into unsigned ranges so that any x/z within
    /// ±8 388 608 and y within ±32 768 map to distinct keys.
    #[inline]
    pub fn packed(&self) -> u64 {
        let x = (self.x as i64 + PACK_XZ_OFFSET) as u64 & ((1 << PACK_XZ_BITS) - 1);
        let y = (self.y as i64 + PACK_Y_OFFSET) as u64 & ((1 << PACK_Y_BITS) - 1);
        let z = (self.z as i64 + PACK_XZ_OFFSET) as u64 & ((1 << PACK_XZ_BITS) - 1);

        (x << (PACK_Y_BITS + PACK_XZ_BITS)) | (y << PACK_XZ_BITS) | z
    }

    /// Inverse of [`Vector3i::packed`].
    pub fn from_packed(key: u64) -> Self {
        let z = (key & ((1 << PACK_XZ_BITS) - 1)) as i64 - PACK_XZ_OFFSET;
        let y = ((key >> PACK_XZ_BITS) & ((1 << PACK_Y_BITS) - 1)) as i64 - PACK_Y_OFFSET;
        let x = ((key >> (PACK_XZ_BITS + PACK_Y_BITS)) & ((1 << PACK_XZ_BITS) - 1)) as i64 - PACK_XZ_OFFSET;

        Self::new(x as i32, y as i32, z as i32)
    }

    #[inline]
    pub fn sqr_distance(&self, other: &Vector3i) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    #[inline]
    pub fn sqr_distance_2d(&self, other: &Vector3i) -> i32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Largest per-axis difference.
    pub fn chebyshev(&self, other: &Vector3i) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    pub fn sqr_magnitude(&self) -> i32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Component-wise arithmetic shift, used for halving vectors.
    pub fn shr(&self, bits: u32) -> Vector3i {
        Vector3i::new(self.x >> bits, self.y >> bits, self.z >> bits)
    }

    pub fn max_component(&self) -> i32 {
        self.x.max(self.y).max(self.z)
    }

    pub fn min_component(&self) -> i32 {
        self.x.min(self.y).min(self.z)
    }

    /// Volume of a box with this size.
    pub fn volume(&self) -> i64 {
        self.x as i64 * self.y as i64 * self.z as i64
    }
}

impl Add for Vector3i {
    type Output = Vector3i;

    fn add(self, rhs: Vector3i) -> Vector3i {
        Vector3i::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3i {
    fn add_assign(&mut self, rhs: Vector3i) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vector3i {
    type Output = Vector3i;

    fn sub(self, rhs: Vector3i) -> Vector3i {
        Vector3i::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<i32> for Vector3i {
    type Output = Vector3i;

    fn mul(self, rhs: i32) -> Vector3i {
        Vector3i::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vector3i {
    type Output = Vector3i;

    fn neg(self) -> Vector3i {
        Vector3i::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// The 26 neighbours of a voxel.
pub const NEIGHBORS_26: [Vector3i; 26] = {
    let mut out = [Vector3i::ZERO; 26];
    let mut i = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[i] = Vector3i::new(dx, dy, dz);
                    i += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
};

/// The eight neighbours in the same horizontal plane.
pub fn neighbors_horizontal() -> impl Iterator<Item = Vector3i> {
    NEIGHBORS_26.iter().copied().filter(|o| o.y == 0)
}

/// Neighbours excluding the two purely vertical moves.
pub fn neighbors_no_vertical() -> impl Iterator<Item = Vector3i> {
    NEIGHBORS_26
        .iter()
        .copied()
        .filter(|o| !(o.x == 0 && o.z == 0))
}
