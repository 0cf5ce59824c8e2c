//! Precomputed voxel spheres used to stamp tunnel thickness.
//!
//! Each radius is flood-filled once from the origin and stored as one
//! vertical run per (x, z) column, so stamping a sphere only walks runs
//! instead of re-testing every point of the cube.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{CaveError, CaveResult};
use crate::geometry::{Vector3i, NEIGHBORS_26};

/// Vertical run of a sphere column, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ColumnRun {
    y_min: i32,
    y_max: i32,
}

/// Column runs of a single radius, indexed by `(x + r) + (z + r) * (2r + 1)`.
struct SphereRuns {
    radius: i32,
    columns: Vec<Option<ColumnRun>>,
    len: usize,
}

impl SphereRuns {
    fn build(radius: i32) -> Self {
        let points = flood_fill(radius);
        let side = (2 * radius + 1) as usize;
        let mut grouped: HashMap<(i32, i32), ColumnRun> = HashMap::new();

        for p in &points {
            grouped
                .entry((p.x, p.z))
                .and_modify(|run| {
                    run.y_min = run.y_min.min(p.y);
                    run.y_max = run.y_max.max(p.y);
                })
                .or_insert(ColumnRun { y_min: p.y, y_max: p.y });
        }

        let mut columns = vec![None; side * side];
        for ((x, z), run) in grouped {
            columns[((x + radius) + (z + radius) * (2 * radius + 1)) as usize] = Some(run);
        }

        Self { radius, columns, len: points.len() }
    }

    fn offsets(&self) -> impl Iterator<Item = Vector3i> + '_ {
        let r = self.radius;
        let side = 2 * r + 1;
        self.columns.iter().enumerate().flat_map(move |(i, run)| {
            let x = (i as i32 % side) - r;
            let z = (i as i32 / side) - r;
            run.into_iter()
                .flat_map(move |run| (run.y_min..=run.y_max).map(move |y| Vector3i::new(x, y, z)))
        })
    }
}

/// BFS over the 26-neighbourhood keeping points strictly inside `radius`.
fn flood_fill(radius: i32) -> HashSet<Vector3i> {
    let sqr_radius = radius * radius;
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    if sqr_radius > 0 {
        visited.insert(Vector3i::ZERO);
        queue.push_back(Vector3i::ZERO);
    }

    while let Some(current) = queue.pop_front() {
        for offset in NEIGHBORS_26.iter() {
            let next = current + *offset;
            if next.sqr_magnitude() < sqr_radius && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

/// Sphere offsets for every radius in `[min_radius, max_radius]`.
///
/// Built once per generation session and shared by reference.
pub struct SphereCache {
    min_radius: i32,
    max_radius: i32,
    spheres: Vec<SphereRuns>,
}

impl SphereCache {
    pub fn new(min_radius: i32, max_radius: i32) -> CaveResult<Self> {
        if min_radius < 1 || min_radius > max_radius {
            return Err(CaveError::Config(format!(
                "invalid sphere radius range {}..={}",
                min_radius, max_radius
            )));
        }

        let spheres = (min_radius..=max_radius).map(SphereRuns::build).collect();

        Ok(Self { min_radius, max_radius, spheres })
    }

    pub fn min_radius(&self) -> i32 {
        self.min_radius
    }

    pub fn max_radius(&self) -> i32 {
        self.max_radius
    }

    fn runs(&self, radius: i32) -> &SphereRuns {
        let radius = radius.clamp(self.min_radius, self.max_radius);
        &self.spheres[(radius - self.min_radius) as usize]
    }

    /// Offsets from the sphere center, radius clamped to the cached range.
    pub fn offsets(&self, radius: i32) -> impl Iterator<Item = Vector3i> + '_ {
        self.runs(radius).offsets()
    }

    /// World positions of the sphere around `center`.
    pub fn sphere(&self, center: Vector3i, radius: i32) -> impl Iterator<Item = Vector3i> + '_ {
        self.offsets(radius).map(move |offset| center + offset)
    }

    /// Number of points in the sphere of `radius` (after clamping).
    pub fn sphere_len(&self, radius: i32) -> usize {
        self.runs(radius).len
    }
}
