//! Grouping of obstacle voxels into bounding boxes.
//!
//! Surface prefabs reach below ground with foundations and basements. Their
//! solid voxels are grouped into connected clusters so the spatial index can
//! treat each one as a box tunnels must avoid.

use std::collections::{HashSet, VecDeque};

use crate::geometry::{BoundingBox, Vector3i, NEIGHBORS_26};

/// Connected components (26-neighbourhood) of `blocks`, as boxes carrying
/// their voxel count.
pub fn clusterize(blocks: &HashSet<Vector3i>) -> Vec<BoundingBox> {
    let mut starts: Vec<Vector3i> = blocks.iter().copied().collect();
    starts.sort_unstable();

    let mut visited: HashSet<Vector3i> = HashSet::with_capacity(blocks.len());
    let mut clusters = Vec::new();

    for start in starts {
        if !visited.insert(start) {
            continue;
        }

        let mut min = start;
        let mut max = start;
        let mut count = 0;
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            count += 1;
            min = Vector3i::new(min.x.min(current.x), min.y.min(current.y), min.z.min(current.z));
            max = Vector3i::new(max.x.max(current.x), max.y.max(current.y), max.z.max(current.z));

            for offset in NEIGHBORS_26.iter() {
                let next = current + *offset;
                if blocks.contains(&next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        clusters.push(BoundingBox::with_count(min, max - min + Vector3i::ONE, count));
    }

    clusters
}

/// Split a cluster into octants holding at least one block, recursing up to
/// `max_depth` levels.
pub fn divide_cluster(cluster: &BoundingBox, blocks: &HashSet<Vector3i>, max_depth: u32) -> Vec<BoundingBox> {
    let mut result = Vec::new();

    for mut octant in cluster.octree() {
        octant.blocks_count = octant.points().filter(|p| blocks.contains(p)).count();

        if octant.blocks_count == 0 {
            continue;
        }

        if max_depth > 0 && octant.volume() > 1 {
            result.extend(divide_cluster(&octant, blocks, max_depth - 1));
        } else {
            result.push(octant);
        }
    }

    result
}

/// Repeatedly merge adjacent boxes with matching cross-sections.
pub fn merge_boxes(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    loop {
        let mut merged = None;

        'search: for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if let Some(bb) = boxes[i].try_merge(&boxes[j]) {
                    merged = Some((i, j, bb));
                    break 'search;
                }
            }
        }

        match merged {
            Some((i, j, bb)) => {
                boxes[i] = bb;
                boxes.remove(j);
            }
            None => return boxes,
        }
    }
}

/// Clusters with sparse ones replaced by tighter merged sub-boxes.
pub fn clusterize_compact(blocks: &HashSet<Vector3i>, min_density: f32, max_depth: u32) -> Vec<BoundingBox> {
    let mut result = Vec::new();

    for cluster in clusterize(blocks) {
        if cluster.density() >= min_density {
            result.push(cluster);
            continue;
        }

        let parts = divide_cluster(&cluster, blocks, max_depth);
        if parts.is_empty() {
            result.push(cluster);
        } else {
            result.extend(merge_boxes(parts));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(start: Vector3i, side: i32) -> Vec<Vector3i> {
        BoundingBox::new(start, Vector3i::new(side, side, side)).points().collect()
    }

    #[test]
    fn test_two_separate_clusters() {
        let mut blocks: HashSet<Vector3i> = cube(Vector3i::ZERO, 3).into_iter().collect();
        blocks.extend(cube(Vector3i::new(10, 0, 10), 2));

        let clusters = clusterize(&blocks);
        assert_eq!(clusters.len(), 2);

        let total: usize = clusters.iter().map(|c| c.blocks_count).sum();
        assert_eq!(total, blocks.len());

        assert!(clusters.iter().any(|c| c.start == Vector3i::ZERO && c.size == Vector3i::new(3, 3, 3)));
    }

    #[test]
    fn test_diagonal_blocks_join() {
        let blocks: HashSet<Vector3i> = [Vector3i::new(0, 0, 0), Vector3i::new(1, 1, 1), Vector3i::new(2, 2, 2)]
            .into_iter()
            .collect();

        let clusters = clusterize(&blocks);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, Vector3i::new(3, 3, 3));
        assert_eq!(clusters[0].blocks_count, 3);
    }

    #[test]
    fn test_divided_boxes_cover_every_block() {
        let blocks: HashSet<Vector3i> = (0..12).map(|i| Vector3i::new(i, i / 2, 0)).collect();
        let cluster = clusterize(&blocks)[0];

        let parts = divide_cluster(&cluster, &blocks, 3);
        for block in &blocks {
            assert!(parts.iter().any(|bb| bb.contains(block)));
        }
        let total: usize = parts.iter().map(|bb| bb.blocks_count).sum();
        assert_eq!(total, blocks.len());
    }

    #[test]
    fn test_merge_boxes_collapses_row() {
        let row: Vec<BoundingBox> = (0..4)
            .map(|i| BoundingBox::with_count(Vector3i::new(i * 2, 0, 0), Vector3i::new(2, 1, 1), 2))
            .collect();

        let merged = merge_boxes(row);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].size, Vector3i::new(8, 1, 1));
        assert_eq!(merged[0].blocks_count, 8);
    }

    #[test]
    fn test_compact_keeps_dense_clusters() {
        let blocks: HashSet<Vector3i> = cube(Vector3i::ZERO, 4).into_iter().collect();
        let boxes = clusterize_compact(&blocks, 0.5, 2);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].blocks_count, 64);
    }
}
