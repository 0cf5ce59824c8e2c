//! Tunnels carved along graph edges.
//!
//! Building a tunnel is two steps: [`pathfinder`] routes a thin path between
//! the two nodes of an edge, then [`thickener`] carves spheres of varying
//! radius along it.

pub mod pathfinder;
pub mod radius;
pub mod thickener;

use std::collections::HashSet;

use rand_chacha::ChaCha8Rng;

use crate::block::CaveBlock;
use crate::config::CaveConfig;
use crate::graph::GraphEdge;
use crate::heightmap::HeightMap;
use crate::prefab::{NodeRef, PrefabIndex};
use crate::sphere::SphereCache;

pub use pathfinder::TunnelPathfinder;
pub use radius::RadiusProfile;
pub use thickener::{natural_entrance_shaft, thicken, LocalMinima};

/// Read-only services shared by every tunnel of a generation run.
#[derive(Clone, Copy)]
pub struct TunnelContext<'a> {
    pub index: &'a PrefabIndex,
    pub heightmap: &'a HeightMap,
    pub spheres: &'a SphereCache,
    pub config: &'a CaveConfig,
}

/// One carved tunnel.
#[derive(Clone, Debug)]
pub struct CaveTunnel {
    pub start: NodeRef,
    pub end: NodeRef,
    /// Center line, ordered from `start` to `end`
    pub path: Vec<CaveBlock>,
    pub blocks: HashSet<CaveBlock>,
}

impl CaveTunnel {
    /// Route and carve the tunnel for `edge`.
    ///
    /// `None` when either node is unknown or no route could be started.
    pub fn build(edge: &GraphEdge, ctx: &TunnelContext<'_>, rng: &mut ChaCha8Rng) -> Option<CaveTunnel> {
        let Some(start) = ctx.index.node(edge.node1) else {
            log::warn!("edge references unknown node {:?}", edge.node1);
            return None;
        };
        let Some(end) = ctx.index.node(edge.node2) else {
            log::warn!("edge references unknown node {:?}", edge.node2);
            return None;
        };

        let path = TunnelPathfinder::new(ctx).find_path(start, end, rng)?;
        let blocks = thicken(&path, start, end, ctx, rng);

        Some(CaveTunnel {
            start: edge.node1,
            end: edge.node2,
            path: path.into_iter().map(CaveBlock::at).collect(),
            blocks,
        })
    }

    pub fn local_minima(&self) -> LocalMinima<'_> {
        LocalMinima::new(&self.path)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Direction, Vector3i};
    use crate::prefab::CavePrefab;
    use rand::SeedableRng;

    struct Scenario {
        index: PrefabIndex,
        heightmap: HeightMap,
        spheres: SphereCache,
        config: CaveConfig,
    }

    fn scenario() -> Scenario {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let mut index = PrefabIndex::new(100);

        let mut a = CavePrefab::new(0, "a", Vector3i::new(20, 5, 20), Vector3i::new(10, 10, 10));
        a.randomize_markers(&mut rng);
        index.add(a);

        let mut b = CavePrefab::new(0, "b", Vector3i::new(20, 50, 80), Vector3i::new(20, 10, 20));
        b.randomize_markers(&mut rng);
        index.add(b);

        Scenario {
            index,
            heightmap: HeightMap::flat(100, 128.0),
            spheres: SphereCache::new(1, 6).unwrap(),
            config: CaveConfig::for_world(100),
        }
    }

    fn edge(index: &PrefabIndex) -> GraphEdge {
        let a = &index.prefabs()[0].nodes[1];
        let b = &index.prefabs()[1].nodes[0];
        assert_eq!(a.direction, Direction::East);
        assert_eq!(b.direction, Direction::West);
        GraphEdge::between(a, b)
    }

    #[test]
    fn test_tunnel_path_is_connected() {
        let s = scenario();
        let ctx = TunnelContext { index: &s.index, heightmap: &s.heightmap, spheres: &s.spheres, config: &s.config };
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let tunnel = CaveTunnel::build(&edge(&s.index), &ctx, &mut rng).unwrap();
        let start = s.index.node(tunnel.start).unwrap();
        let end = s.index.node(tunnel.end).unwrap();

        assert_eq!(tunnel.path.first().map(|b| b.position()), Some(start.normal(start.radius)));
        assert_eq!(tunnel.path.last().map(|b| b.position()), Some(end.normal(end.radius)));
        for pair in tunnel.path.windows(2) {
            assert!(pair[0].position().chebyshev(&pair[1].position()) <= 1);
        }

        let unique: HashSet<_> = tunnel.path.iter().collect();
        assert_eq!(unique.len(), tunnel.path.len());
    }

    #[test]
    fn test_tunnel_blocks_stay_in_bounds() {
        let s = scenario();
        let ctx = TunnelContext { index: &s.index, heightmap: &s.heightmap, spheres: &s.spheres, config: &s.config };
        let mut rng = ChaCha8Rng::seed_from_u64(99);

        let tunnel = CaveTunnel::build(&edge(&s.index), &ctx, &mut rng).unwrap();
        assert!(!tunnel.is_empty());

        let start = s.index.node(tunnel.start).unwrap();
        let end = s.index.node(tunnel.end).unwrap();
        let max_radius = s.config.max_tunnel_radius;

        for block in &tunnel.blocks {
            let p = block.position();
            assert!(p.y > s.config.bedrock_margin);
            assert!(!s.index.intersect_with_prefab(&p));

            let near_path = tunnel.path.iter().any(|w| w.position().chebyshev(&p) <= max_radius);
            let near_node = start.position.chebyshev(&p) <= start.radius || end.position.chebyshev(&p) <= end.radius;
            assert!(near_path || near_node, "stray block at {}", p);
        }
    }

    #[test]
    fn test_tunnel_is_deterministic() {
        let s = scenario();
        let ctx = TunnelContext { index: &s.index, heightmap: &s.heightmap, spheres: &s.spheres, config: &s.config };

        let first = CaveTunnel::build(&edge(&s.index), &ctx, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let second = CaveTunnel::build(&edge(&s.index), &ctx, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();

        let a: Vec<_> = first.path.iter().map(|b| b.position()).collect();
        let b: Vec<_> = second.path.iter().map(|b| b.position()).collect();
        assert_eq!(a, b);
        assert_eq!(first.blocks.len(), second.blocks.len());
    }

    #[test]
    fn test_minima_come_from_path() {
        let s = scenario();
        let ctx = TunnelContext { index: &s.index, heightmap: &s.heightmap, spheres: &s.spheres, config: &s.config };
        let tunnel = CaveTunnel::build(&edge(&s.index), &ctx, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();

        for minimum in tunnel.local_minima() {
            assert!(tunnel.path.contains(&minimum));
        }
    }
}
