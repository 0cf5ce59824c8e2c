//! Weighted connection between two prefab nodes.

use crate::geometry::Vector3i;
use crate::prefab::{GraphNode, NodeRef};

/// Unordered edge between two nodes of different prefabs.
///
/// Endpoints are stored in ascending [`NodeRef`] order so an edge has a
/// single canonical key.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
    pub node1: NodeRef,
    pub node2: NodeRef,
    /// Squared distance between the endpoints
    pub weight: i32,
    pub center: Vector3i,
    pub(crate) pruned: bool,
}

impl GraphEdge {
    pub fn between(a: &GraphNode, b: &GraphNode) -> Self {
        Self::from_parts(a.node_ref(), a.position, b.node_ref(), b.position)
    }

    pub fn from_parts(ref1: NodeRef, pos1: Vector3i, ref2: NodeRef, pos2: Vector3i) -> Self {
        let ((node1, p1), (node2, p2)) = if ref1 <= ref2 {
            ((ref1, pos1), (ref2, pos2))
        } else {
            ((ref2, pos2), (ref1, pos1))
        };

        Self {
            node1,
            node2,
            weight: p1.sqr_distance(&p2),
            center: (p1 + p2).shr(1),
            pruned: true,
        }
    }

    pub fn key(&self) -> (NodeRef, NodeRef) {
        (self.node1, self.node2)
    }

    /// Prefab ids of both ends, smallest first.
    pub fn prefab_pair(&self) -> (usize, usize) {
        let (a, b) = (self.node1.prefab, self.node2.prefab);
        (a.min(b), a.max(b))
    }

    pub fn is_related_to_prefab(&self, prefab: usize) -> bool {
        self.node1.prefab == prefab || self.node2.prefab == prefab
    }

    /// End of the edge lying on `prefab`.
    pub fn node_on(&self, prefab: usize) -> Option<NodeRef> {
        if self.node1.prefab == prefab {
            Some(self.node1)
        } else if self.node2.prefab == prefab {
            Some(self.node2)
        } else {
            None
        }
    }

    /// End of the edge not lying on `prefab`.
    pub fn node_off(&self, prefab: usize) -> NodeRef {
        if self.node1.prefab != prefab {
            self.node1
        } else {
            self.node2
        }
    }

    pub fn has_node(&self, node: NodeRef) -> bool {
        self.node1 == node || self.node2 == node
    }

    pub fn shares_node_with(&self, other: &GraphEdge) -> bool {
        self.has_node(other.node1) || self.has_node(other.node2)
    }
}
