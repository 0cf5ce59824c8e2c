//! Incremental Bowyer-Watson triangulation in the x/z plane.

use std::collections::{HashMap, HashSet};

use crate::error::{CaveError, CaveResult};

#[derive(Clone, Copy, Debug)]
struct Point {
    x: f64,
    z: f64,
}

#[derive(Clone, Debug)]
struct Triangle {
    vertices: [usize; 3],
    center_x: f64,
    center_z: f64,
    radius_sq: f64,
}

impl Triangle {
    fn new(points: &[Point], a: usize, b: usize, c: usize) -> CaveResult<Self> {
        let vertices = if is_counter_clockwise(points[a], points[b], points[c]) {
            [a, b, c]
        } else {
            [a, c, b]
        };

        let [p0, p1, p2] = vertices.map(|i| points[i]);
        let d_a = p0.x * p0.x + p0.z * p0.z;
        let d_b = p1.x * p1.x + p1.z * p1.z;
        let d_c = p2.x * p2.x + p2.z * p2.z;

        let aux1 = d_a * (p2.z - p1.z) + d_b * (p0.z - p2.z) + d_c * (p1.z - p0.z);
        let aux2 = -(d_a * (p2.x - p1.x) + d_b * (p0.x - p2.x) + d_c * (p1.x - p0.x));
        let div = 2.0 * (p0.x * (p2.z - p1.z) + p1.x * (p0.z - p2.z) + p2.x * (p1.z - p0.z));

        if div == 0.0 {
            return Err(CaveError::DegenerateTriangulation { x: p0.x, z: p0.z });
        }

        let center_x = aux1 / div;
        let center_z = aux2 / div;
        let radius_sq = (center_x - p0.x).powi(2) + (center_z - p0.z).powi(2);

        Ok(Self { vertices, center_x, center_z, radius_sq })
    }

    fn contains_in_circumcircle(&self, p: Point) -> bool {
        let dx = p.x - self.center_x;
        let dz = p.z - self.center_z;
        dx * dx + dz * dz < self.radius_sq
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [ordered(a, b), ordered(a, c), ordered(b, c)]
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn is_counter_clockwise(a: Point, b: Point, c: Point) -> bool {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z) > 0.0
}

/// Triangulate `points` inside the square `[0, size]²`.
///
/// The square is split into two super triangles; triangles touching their
/// corners are dropped from the result, so points on the square border must
/// not be collinear with a corner edge. Returned triangles index into
/// `points`. Duplicate points are skipped.
pub fn triangulate(points: &[(f64, f64)], size: f64) -> CaveResult<Vec<[usize; 3]>> {
    // Super quad corners take the first four slots.
    let mut all: Vec<Point> = vec![
        Point { x: 0.0, z: 0.0 },
        Point { x: 0.0, z: size },
        Point { x: size, z: size },
        Point { x: size, z: 0.0 },
    ];
    all.extend(points.iter().map(|&(x, z)| Point { x, z }));

    let mut triangles = vec![Triangle::new(&all, 0, 1, 2)?, Triangle::new(&all, 0, 2, 3)?];
    let mut seen: HashSet<(u64, u64)> = HashSet::with_capacity(points.len());

    for index in 4..all.len() {
        let point = all[index];
        if !seen.insert((point.x.to_bits(), point.z.to_bits())) {
            log::warn!("duplicate triangulation point ({}, {}) skipped", point.x, point.z);
            continue;
        }

        let (bad, good): (Vec<Triangle>, Vec<Triangle>) =
            triangles.into_iter().partition(|t| t.contains_in_circumcircle(point));
        triangles = good;

        // Hole boundary: edges owned by exactly one bad triangle, in order of
        // first appearance.
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        let mut order = Vec::new();
        for edge in bad.iter().flat_map(|t| t.edges()) {
            let count = counts.entry(edge).or_insert(0);
            if *count == 0 {
                order.push(edge);
            }
            *count += 1;
        }

        for (a, b) in order.into_iter().filter(|e| counts[e] == 1) {
            triangles.push(Triangle::new(&all, index, a, b)?);
        }
    }

    Ok(triangles
        .into_iter()
        .filter(|t| t.vertices.iter().all(|&v| v >= 4))
        .map(|t| t.vertices.map(|v| v - 4))
        .collect())
}
