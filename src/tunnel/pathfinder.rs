//! Randomized greedy routing between two prefab nodes.
//!
//! A tunnel is routed as two independent walks, one from each node, toward a
//! jittered midpoint. Each walk repeatedly samples a few points ahead in the
//! direction of its goal and moves to the first one that keeps clear of
//! prefabs, bedrock and the terrain surface.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::TunnelContext;
use crate::geometry::{bresenham, Direction, Vector3i};
use crate::prefab::GraphNode;

/// Walks stop after this many steps.
const MAX_ITERATIONS: usize = 10_000;
/// Candidates sampled per step.
const STEP_CANDIDATES: usize = 100;
/// Tries to find a midpoint clear of prefabs.
const MIDPOINT_TRIES: usize = 100;
const MIDPOINT_JITTER: i32 = 10;
/// Squared distance from prefabs a midpoint must exceed.
const MIDPOINT_CLEARANCE: i32 = 100;
/// Squared distance from prefabs every waypoint must keep.
const WAYPOINT_CLEARANCE: i32 = 36;
/// Within this squared distance the walk jumps straight to its goal.
const GOAL_SNAP: i32 = 100;
const HORIZONTAL_JITTER: i32 = 10;
const VERTICAL_JITTER: i32 = 2;

pub struct TunnelPathfinder<'a> {
    ctx: &'a TunnelContext<'a>,
}

impl<'a> TunnelPathfinder<'a> {
    pub fn new(ctx: &'a TunnelContext<'a>) -> Self {
        Self { ctx }
    }

    /// Waypoints from just outside `start` to just outside `target`.
    ///
    /// `None` when no midpoint clear of prefabs exists. A walk that runs out
    /// of steps leaves its half of the path empty.
    pub fn find_path(&self, start: &GraphNode, target: &GraphNode, rng: &mut ChaCha8Rng) -> Option<Vec<Vector3i>> {
        let from = start.normal(start.radius);
        let to = target.normal(target.radius);

        let Some(mid) = self.find_midpoint(from, to, rng) else {
            log::warn!("no midpoint found between [{}] and [{}]", from, to);
            return None;
        };

        let first = self.walk(from, start.direction, mid, rng);
        let second = self.walk(to, target.direction, mid, rng);

        let mut path = first;
        let skip = usize::from(!path.is_empty());
        path.extend(second.into_iter().rev().skip(skip));

        Some(remove_loops(path))
    }

    /// Jittered midpoint between `p1` and `p2` that a waypoint could occupy
    /// and that stays far enough from every prefab.
    pub fn find_midpoint(&self, p1: Vector3i, p2: Vector3i, rng: &mut ChaCha8Rng) -> Option<Vector3i> {
        let half = (p2 - p1).shr(1);

        (0..MIDPOINT_TRIES).find_map(|_| {
            let mid = p1
                + half
                + Vector3i::new(
                    rng.gen_range(-MIDPOINT_JITTER..=MIDPOINT_JITTER),
                    rng.gen_range(-MIDPOINT_JITTER..=MIDPOINT_JITTER),
                    rng.gen_range(-MIDPOINT_JITTER..=MIDPOINT_JITTER),
                );

            (self.is_clear(&mid) && self.ctx.index.min_sqr_distance_to_prefab(&mid) > MIDPOINT_CLEARANCE)
                .then_some(mid)
        })
    }

    /// Greedy walk from `start` to `goal`; empty when the goal is not reached.
    fn walk(&self, start: Vector3i, facing: Direction, goal: Vector3i, rng: &mut ChaCha8Rng) -> Vec<Vector3i> {
        let mut parents: HashMap<Vector3i, Vector3i> = HashMap::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut current = Some(start);
        let mut iterations = 0;

        while let Some(position) = current {
            if iterations >= MAX_ITERATIONS {
                break;
            }
            iterations += 1;

            if position == goal {
                return reconstruct(&parents, start, goal);
            }
            visited.insert(position.packed());

            let direction = if position == start {
                let v = facing.vector();
                (v.x as f64, 0.0, v.z as f64)
            } else {
                normalized(goal - position)
            };

            current = self.next_step(position, direction, goal, &visited, rng);
            if let Some(next) = current {
                parents.entry(next).or_insert(position);
            }
        }

        log::warn!("no path found from [{}] to [{}] after {} steps", start, goal, iterations);
        Vec::new()
    }

    fn next_step(
        &self,
        position: Vector3i,
        direction: (f64, f64, f64),
        goal: Vector3i,
        visited: &HashSet<u64>,
        rng: &mut ChaCha8Rng,
    ) -> Option<Vector3i> {
        if position.sqr_distance(&goal) < GOAL_SNAP {
            return self.is_open(&goal, visited).then_some(goal);
        }

        (0..STEP_CANDIDATES).find_map(|_| {
            let length = rng.gen_range(2..10) as f64;
            let candidate = Vector3i::new(
                (position.x as f64 + length * direction.0).floor() as i32 + rng.gen_range(-HORIZONTAL_JITTER..=HORIZONTAL_JITTER),
                (position.y as f64 + length * direction.1).floor() as i32 + rng.gen_range(-VERTICAL_JITTER..=VERTICAL_JITTER),
                (position.z as f64 + length * direction.2).floor() as i32 + rng.gen_range(-HORIZONTAL_JITTER..=HORIZONTAL_JITTER),
            );

            self.is_open(&candidate, visited).then_some(candidate)
        })
    }

    /// Whether a waypoint may be placed at `p` during a walk.
    fn is_open(&self, p: &Vector3i, visited: &HashSet<u64>) -> bool {
        !visited.contains(&p.packed()) && self.is_clear(p)
    }

    /// Bedrock, height, terrain and prefab bounds of a waypoint.
    fn is_clear(&self, p: &Vector3i) -> bool {
        let config = self.ctx.config;

        p.y > config.bedrock_margin
            && p.y <= config.max_tunnel_height
            && p.y + config.terrain_margin <= self.ctx.heightmap.get_height_i(p.x, p.z)
            && self.ctx.index.min_sqr_distance_to_prefab(p) >= WAYPOINT_CLEARANCE
    }
}

fn normalized(v: Vector3i) -> (f64, f64, f64) {
    let length = (v.sqr_magnitude() as f64).sqrt();
    if length == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    (v.x as f64 / length, v.y as f64 / length, v.z as f64 / length)
}

/// Walk the parent chain back from `goal`, filling gaps between waypoints.
fn reconstruct(parents: &HashMap<Vector3i, Vector3i>, start: Vector3i, goal: Vector3i) -> Vec<Vector3i> {
    let mut waypoints = vec![goal];
    let mut current = goal;
    while current != start {
        match parents.get(&current) {
            Some(&parent) => {
                waypoints.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    waypoints.reverse();

    let mut path = Vec::new();
    for pair in waypoints.windows(2) {
        let segment = bresenham(pair[0], pair[1]);
        // Each segment starts where the previous one ended.
        let skip = usize::from(!path.is_empty());
        path.extend(segment.into_iter().skip(skip));
    }
    if path.is_empty() {
        path.push(goal);
    }

    path
}

/// Cut out every loop so each position appears once, keeping consecutive
/// points adjacent.
fn remove_loops(path: Vec<Vector3i>) -> Vec<Vector3i> {
    let mut result: Vec<Vector3i> = Vec::with_capacity(path.len());
    let mut positions: HashMap<Vector3i, usize> = HashMap::with_capacity(path.len());

    for point in path {
        if let Some(&i) = positions.get(&point) {
            for removed in result.drain(i + 1..) {
                positions.remove(&removed);
            }
            continue;
        }
        positions.insert(point, result.len());
        result.push(point);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaveConfig;
    use crate::heightmap::HeightMap;
    use crate::prefab::PrefabIndex;
    use crate::sphere::SphereCache;
    use rand::SeedableRng;

    /// Terrain at 100 with a valley floor at 40 between x/z 30 and 70.
    fn valley() -> HeightMap {
        let mut heightmap = HeightMap::flat(128, 100.0);
        for x in 30..=70 {
            for z in 30..=70 {
                heightmap.set_height(x, z, 40.0);
            }
        }
        heightmap
    }

    #[test]
    fn test_midpoint_stays_under_valley_floor() {
        let index = PrefabIndex::new(64);
        let heightmap = valley();
        let spheres = SphereCache::new(1, 6).unwrap();
        let config = CaveConfig::for_world(128);
        let ctx = TunnelContext { index: &index, heightmap: &heightmap, spheres: &spheres, config: &config };
        let pathfinder = TunnelPathfinder::new(&ctx);

        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mid = pathfinder
                .find_midpoint(Vector3i::new(20, 30, 50), Vector3i::new(80, 30, 50), &mut rng)
                .unwrap();
            assert!(mid.y + config.terrain_margin <= heightmap.get_height_i(mid.x, mid.z), "{} above ground", mid);
            assert!(mid.y > config.bedrock_margin);
        }
    }

    #[test]
    fn test_midpoint_rejected_when_every_jitter_breaks_ground() {
        let index = PrefabIndex::new(64);
        let heightmap = valley();
        let spheres = SphereCache::new(1, 6).unwrap();
        let config = CaveConfig::for_world(128);
        let ctx = TunnelContext { index: &index, heightmap: &heightmap, spheres: &spheres, config: &config };

        // The straight-line midpoint sits 10 blocks above the valley floor.
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mid = TunnelPathfinder::new(&ctx).find_midpoint(Vector3i::new(20, 50, 50), Vector3i::new(80, 50, 50), &mut rng);
        assert!(mid.is_none());
    }

    #[test]
    fn test_remove_loops_keeps_adjacency() {
        let path = vec![
            Vector3i::new(0, 0, 0),
            Vector3i::new(1, 0, 0),
            Vector3i::new(2, 0, 0),
            Vector3i::new(2, 0, 1),
            Vector3i::new(1, 0, 0),
            Vector3i::new(1, 0, 1),
        ];

        let cleaned = remove_loops(path);
        assert_eq!(
            cleaned,
            vec![Vector3i::new(0, 0, 0), Vector3i::new(1, 0, 0), Vector3i::new(1, 0, 1)]
        );
    }

    #[test]
    fn test_reconstruct_fills_gaps() {
        let start = Vector3i::new(0, 10, 0);
        let middle = Vector3i::new(5, 12, 3);
        let goal = Vector3i::new(9, 12, 9);
        let parents = HashMap::from([(middle, start), (goal, middle)]);

        let path = reconstruct(&parents, start, goal);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        for pair in path.windows(2) {
            assert_eq!(pair[0].chebyshev(&pair[1]), 1);
        }
    }
}
