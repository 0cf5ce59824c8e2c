//! Connection graph between prefab nodes.
//!
//! Nodes of all prefabs are triangulated in the x/z plane; every triangle
//! side joining two different prefabs becomes a candidate tunnel. Pruning
//! then keeps a sparse subset in which every node still has a tunnel.

mod delaunay;
mod edge;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

pub use delaunay::triangulate;
pub use edge::GraphEdge;

use crate::error::CaveResult;
use crate::geometry::Vector3i;
use crate::prefab::{NodeRef, PrefabIndex};

type EdgeKey = (NodeRef, NodeRef);

/// Above this many candidate combinations, local graphs are chosen greedily.
const MAX_LOCAL_COMBINATIONS: usize = 10_000;

/// Tunnel candidates between prefab nodes.
#[derive(Default)]
pub struct Graph {
    edges: BTreeMap<EdgeKey, GraphEdge>,
    related: BTreeMap<NodeRef, BTreeSet<EdgeKey>>,
    by_prefabs: BTreeMap<(usize, usize), BTreeSet<EdgeKey>>,
    positions: BTreeMap<NodeRef, Vector3i>,
    node_counts: BTreeMap<usize, usize>,
    boundary: HashSet<usize>,
}

impl Graph {
    /// Triangulate every node of the index and optionally prune the result.
    pub fn build(index: &PrefabIndex, prune: bool) -> CaveResult<Self> {
        let start = Instant::now();
        let mut graph = Graph::default();

        let nodes: Vec<_> = index.nodes().collect();
        for prefab in index.prefabs() {
            graph.node_counts.insert(prefab.id, prefab.nodes.len());
            if prefab.is_boundary {
                graph.boundary.insert(prefab.id);
            }
        }

        let points: Vec<(f64, f64)> = nodes
            .iter()
            .map(|n| (n.position.x as f64, n.position.z as f64))
            .collect();

        for triangle in triangulate(&points, index.world_size() as f64)? {
            let [a, b, c] = triangle.map(|i| nodes[i]);
            for (n1, n2) in [(a, b), (a, c), (b, c)] {
                if n1.prefab_id != n2.prefab_id {
                    graph.positions.insert(n1.node_ref(), n1.position);
                    graph.positions.insert(n2.node_ref(), n2.position);
                    graph.add_edge(GraphEdge::between(n1, n2));
                }
            }
        }

        log::info!(
            "primary graph: {} edges, {} nodes ({:.1?})",
            graph.len(),
            graph.positions.len(),
            start.elapsed()
        );

        if prune {
            graph.prune();
            log::info!(
                "pruned graph: {} edges, {} nodes ({:.1?})",
                graph.len(),
                graph.positions.len(),
                start.elapsed()
            );
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.values()
    }

    /// Nodes touched by at least one edge.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.positions.keys().copied()
    }

    pub fn degree(&self, node: NodeRef) -> usize {
        self.related.get(&node).map_or(0, |edges| edges.len())
    }

    /// Insert an edge, returning its key. An existing edge is left intact.
    fn add_edge(&mut self, edge: GraphEdge) -> EdgeKey {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return key;
        }

        self.related.entry(edge.node1).or_default().insert(key);
        self.related.entry(edge.node2).or_default().insert(key);
        self.by_prefabs.entry(edge.prefab_pair()).or_default().insert(key);
        self.edges.insert(key, edge);
        key
    }

    fn remove_edge(&mut self, key: EdgeKey) {
        let Some(edge) = self.edges.remove(&key) else {
            return;
        };

        for node in [edge.node1, edge.node2] {
            if let Some(set) = self.related.get_mut(&node) {
                set.remove(&key);
                if set.is_empty() {
                    self.related.remove(&node);
                    self.positions.remove(&node);
                }
            }
        }

        let pair = edge.prefab_pair();
        if let Some(set) = self.by_prefabs.get_mut(&pair) {
            set.remove(&key);
            if set.is_empty() {
                self.by_prefabs.remove(&pair);
            }
        }
    }

    fn set_pruned(&mut self, key: EdgeKey, pruned: bool) {
        if let Some(edge) = self.edges.get_mut(&key) {
            edge.pruned = pruned;
        }
    }

    fn is_pruned(&self, key: &EdgeKey) -> bool {
        self.edges.get(key).map_or(true, |e| e.pruned)
    }

    fn weight(&self, key: &EdgeKey) -> i32 {
        self.edges.get(key).map_or(i32::MAX, |e| e.weight)
    }

    fn live_degree(&self, node: NodeRef) -> usize {
        self.related
            .get(&node)
            .map_or(0, |edges| edges.iter().filter(|k| !self.is_pruned(k)).count())
    }

    fn is_alone(&self, node: NodeRef) -> bool {
        self.live_degree(node) == 0
    }

    fn connect(&mut self, a: NodeRef, b: NodeRef) -> Option<EdgeKey> {
        let pa = *self.positions.get(&a)?;
        let pb = *self.positions.get(&b)?;
        Some(self.add_edge(GraphEdge::from_parts(a, pa, b, pb)))
    }

    // =========================================================================
    // PRUNING
    // =========================================================================

    /// Keep a sparse subset of edges in which no node is left alone.
    pub fn prune(&mut self) {
        for edge in self.edges.values_mut() {
            edge.pruned = true;
        }

        let prefabs: BTreeSet<usize> = self.positions.keys().map(|n| n.prefab).collect();
        let not_found = prefabs
            .into_iter()
            .filter(|&prefab| !self.keep_local_graph(prefab))
            .count();

        self.prune_boundary_links();
        self.prune_duplicate_links();

        let nodes: Vec<NodeRef> = self.positions.keys().copied().collect();
        for &node in &nodes {
            if self.is_alone(node) {
                self.steal_edge(node);
            }
        }

        for &node in &nodes {
            if !self.is_alone(node) {
                continue;
            }
            let lightest = self
                .related
                .get(&node)
                .and_then(|edges| edges.iter().min_by_key(|k| self.weight(k)).copied());
            match lightest {
                Some(key) => self.set_pruned(key, false),
                None => log::error!("node without related edge at [{}]", self.positions[&node]),
            }
        }

        let alone = nodes.iter().filter(|&&n| self.is_alone(n)).count();
        log::debug!("{} nodes alone after pruning, {} local graphs not found", alone, not_found);

        let pruned: Vec<EdgeKey> = self
            .edges
            .iter()
            .filter(|(_, e)| e.pruned)
            .map(|(k, _)| *k)
            .collect();
        for key in pruned {
            self.remove_edge(key);
        }
    }

    /// Unprune the cheapest choice of one edge per neighbouring prefab.
    ///
    /// The cost of a choice is its total weight, multiplied by one plus the
    /// number of nodes of `prefab` it leaves unused.
    fn keep_local_graph(&mut self, prefab: usize) -> bool {
        let mut groups: BTreeMap<(usize, usize), Vec<EdgeKey>> = BTreeMap::new();
        for (key, edge) in &self.edges {
            if edge.is_related_to_prefab(prefab) {
                groups.entry(edge.prefab_pair()).or_default().push(*key);
            }
        }

        if groups.is_empty() {
            return false;
        }

        let groups: Vec<Vec<EdgeKey>> = groups.into_values().collect();
        let node_count = self.node_counts.get(&prefab).copied().unwrap_or(0);

        let combinations = groups
            .iter()
            .try_fold(1usize, |acc, g| acc.checked_mul(g.len()).filter(|&n| n <= MAX_LOCAL_COMBINATIONS));

        let best: Vec<EdgeKey> = match combinations {
            Some(_) => {
                let mut best = Vec::new();
                let mut min_cost = i64::MAX;
                let mut choice = vec![0usize; groups.len()];

                loop {
                    let combination: Vec<EdgeKey> = choice.iter().zip(&groups).map(|(&i, g)| g[i]).collect();
                    let cost = self.local_cost(prefab, node_count, &combination);
                    if cost < min_cost {
                        min_cost = cost;
                        best = combination;
                    }

                    // Odometer increment over the group choices.
                    let mut digit = 0;
                    loop {
                        if digit == groups.len() {
                            break;
                        }
                        choice[digit] += 1;
                        if choice[digit] < groups[digit].len() {
                            break;
                        }
                        choice[digit] = 0;
                        digit += 1;
                    }
                    if digit == groups.len() {
                        break;
                    }
                }

                best
            }
            None => groups
                .iter()
                .filter_map(|g| g.iter().min_by_key(|k| self.weight(k)).copied())
                .collect(),
        };

        for key in best {
            self.set_pruned(key, false);
        }
        true
    }

    fn local_cost(&self, prefab: usize, node_count: usize, combination: &[EdgeKey]) -> i64 {
        let used: HashSet<NodeRef> = combination
            .iter()
            .filter_map(|k| self.edges.get(k).and_then(|e| e.node_on(prefab)))
            .collect();
        let weight: i64 = combination.iter().map(|k| self.weight(k) as i64).sum();
        let unused = node_count.saturating_sub(used.len()) as i64;

        weight * (1 + unused)
    }

    /// Between two boundary rooms, keep only the lightest link per node.
    fn prune_boundary_links(&mut self) {
        let nodes: Vec<NodeRef> = self
            .positions
            .keys()
            .filter(|n| self.boundary.contains(&n.prefab))
            .copied()
            .collect();

        for node in nodes {
            let mut links: Vec<EdgeKey> = self.related[&node]
                .iter()
                .filter(|k| {
                    let edge = &self.edges[k];
                    !edge.pruned
                        && self.boundary.contains(&edge.node1.prefab)
                        && self.boundary.contains(&edge.node2.prefab)
                })
                .copied()
                .collect();

            if links.len() < 2 {
                continue;
            }

            links.sort_by_key(|k| self.weight(k));
            for key in &links[1..] {
                self.set_pruned(*key, true);
            }
        }
    }

    /// Drop redundant links between the same two prefabs while both ends keep
    /// another tunnel; a surviving pair may collapse into one edge.
    fn prune_duplicate_links(&mut self) {
        let groups: Vec<Vec<EdgeKey>> = self
            .by_prefabs
            .values()
            .map(|set| set.iter().filter(|k| !self.is_pruned(k)).copied().collect())
            .collect();

        for links in groups {
            let mut count = links.len();

            for key in &links {
                if count == 1 {
                    break;
                }
                let (a, b) = *key;
                if self.live_degree(a) > 1 && self.live_degree(b) > 1 {
                    self.set_pruned(*key, true);
                    count -= 1;
                }
            }

            if count == 2 && links.len() >= 2 {
                self.try_merge_edges(links[0], links[1]);
            }
        }
    }

    /// Replace two edges by a single one between their lonely endpoints.
    fn try_merge_edges(&mut self, key1: EdgeKey, key2: EdgeKey) -> bool {
        let (Some(e1), Some(e2)) = (self.edges.get(&key1), self.edges.get(&key2)) else {
            return false;
        };
        if e1.shares_node_with(e2) {
            return false;
        }

        let lonely = |edge: &GraphEdge| {
            [edge.node1, edge.node2]
                .into_iter()
                .find(|&n| self.live_degree(n) == 1)
        };

        let (Some(node1), Some(node2)) = (lonely(e1), lonely(e2)) else {
            return false;
        };
        if node1.prefab == node2.prefab {
            return false;
        }

        let Some(merged) = self.connect(node1, node2) else {
            return false;
        };
        self.set_pruned(merged, false);
        self.set_pruned(key1, true);
        self.set_pruned(key2, true);
        true
    }

    /// Give a lonely node the link of a sibling node that has others.
    fn steal_edge(&mut self, node: NodeRef) -> bool {
        let Some(&position) = self.positions.get(&node) else {
            return false;
        };

        let best = self
            .edges
            .iter()
            .filter(|(_, e)| {
                !e.pruned
                    && e.node_on(node.prefab)
                        .map_or(false, |sibling| self.live_degree(sibling) > 1)
            })
            .min_by_key(|(_, e)| {
                let other = self.positions[&e.node_off(node.prefab)];
                position.sqr_distance(&other) as i64 - e.weight as i64
            })
            .map(|(k, e)| (*k, e.node_off(node.prefab)));

        let Some((key, other)) = best else {
            return false;
        };

        self.set_pruned(key, true);
        match self.connect(node, other) {
            Some(new_key) => {
                self.set_pruned(new_key, false);
                true
            }
            None => false,
        }
    }
}
