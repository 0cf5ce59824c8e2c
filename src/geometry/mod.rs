//! Integer spatial math shared by every stage of cave generation.

mod bounds;
mod direction;
mod line;
mod vector;

pub use bounds::{overlaps_2d, sqr_distance_to_box, BoundingBox};
pub use direction::Direction;
pub use line::bresenham;
pub use vector::{neighbors_horizontal, neighbors_no_vertical, Vector3i, NEIGHBORS_26};

/// Side length of a chunk in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Chunk coordinate containing a block coordinate.
#[inline]
pub fn chunk_coord(block: i32) -> i32 {
    block >> 4
}
