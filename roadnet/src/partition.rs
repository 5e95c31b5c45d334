// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Splitting a network into bounded blocks for parallel verification.
//!
//! A block is verified against an independently built mapping, so references
//! crossing a block boundary are truncated. That is a documented accuracy
//! trade-off; the lanelet strategy weights lateral adjacency heavily so that
//! the formulas comparing lateral neighbors keep their operands co-located,
//! and the optional footprint buffering pulls geometric neighbors back in.

use crate::geometry::BoundingBox;
use crate::model::RoadNetwork;
use rol::semantics::ElementId;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A bounded grouping of entities verified as one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Lanelet members
    pub lanelets: BTreeSet<ElementId>,
    /// Traffic-sign members
    pub traffic_signs: BTreeSet<ElementId>,
    /// Traffic-light members
    pub traffic_lights: BTreeSet<ElementId>,
    /// Intersection members
    pub intersections: BTreeSet<ElementId>,
}

impl Block {
    /// The sub-network containing exactly this block's entities. References
    /// leaving the block are kept as-is and point at nothing in the copy;
    /// the mapping tolerates them, and the footprint buffering exists to
    /// keep such truncation away from the relations formulas inspect.
    pub fn restrict(&self, net: &RoadNetwork) -> RoadNetwork {
        let mut sub = RoadNetwork::new(&net.benchmark_id);
        sub.lanelets = net
            .lanelets
            .iter()
            .filter(|(id, _)| self.lanelets.contains(id))
            .map(|(id, l)| (*id, l.clone()))
            .collect();
        sub.traffic_signs = net
            .traffic_signs
            .iter()
            .filter(|(id, _)| self.traffic_signs.contains(id))
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        sub.traffic_lights = net
            .traffic_lights
            .iter()
            .filter(|(id, _)| self.traffic_lights.contains(id))
            .map(|(id, l)| (*id, l.clone()))
            .collect();
        sub.intersections = net
            .intersections
            .iter()
            .filter(|(id, _)| self.intersections.contains(id))
            .map(|(id, i)| (*id, i.clone()))
            .collect();
        sub
    }
}

/// An ordered list of blocks covering the entities of one element type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// The blocks, in construction order
    pub blocks: Vec<Block>,
}

/// Partitioning failures.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// The graph-cut backend was not compiled in; callers degrade to
    /// unpartitioned verification.
    #[error("the graph-cut partitioning backend is not available")]
    BackendUnavailable,
}

/// Edge weighting for the lanelet relation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneletStrategy {
    /// All relations weigh the same
    Normal,
    /// Lateral adjacency weighs ~100x more than successor/predecessor, so
    /// laterally adjacent lanelets stay in one block
    Strips,
}

/// The trivial partition: one block holding the whole network.
pub fn one_block(net: &RoadNetwork) -> Partition {
    let block = Block {
        lanelets: net.lanelets.keys().copied().collect(),
        traffic_signs: net.traffic_signs.keys().copied().collect(),
        traffic_lights: net.traffic_lights.keys().copied().collect(),
        intersections: net.intersections.keys().copied().collect(),
    };
    Partition {
        blocks: vec![block],
    }
}

/// Cut the lanelet relation graph into `ceil(n / chunk_size)` blocks by
/// heaviest-edge-first region growing. Deterministic for a given graph and
/// chunk size. With `buffered`, every lanelet whose inflated footprint
/// touches a block member's inflated footprint is appended to that block.
pub fn lanelet_blocks(
    net: &RoadNetwork,
    chunk_size: usize,
    strategy: LaneletStrategy,
    buffered: Option<f64>,
) -> Result<Partition, PartitionError> {
    let chunk_size = chunk_size.max(1);
    if net.lanelets.len() <= chunk_size {
        return Ok(one_block(net));
    }
    let mut partition = cut_lanelet_graph(net, chunk_size, strategy)?;
    if let Some(buffer) = buffered {
        append_footprint_neighbors(net, &mut partition, buffer);
    }
    for block in &mut partition.blocks {
        attach_referenced(net, block);
    }
    log::info!(
        "lanelet partition: {} blocks of sizes {:?}",
        partition.blocks.len(),
        partition.blocks.iter().map(|b| b.lanelets.len()).collect::<Vec<_>>()
    );
    Ok(partition)
}

#[cfg(feature = "graph-partition")]
fn cut_lanelet_graph(
    net: &RoadNetwork,
    chunk_size: usize,
    strategy: LaneletStrategy,
) -> Result<Partition, PartitionError> {
    use petgraph::graph::{NodeIndex, UnGraph};

    let adjacency_weight: u64 = match strategy {
        LaneletStrategy::Normal => 1,
        LaneletStrategy::Strips => 100,
    };

    // accumulate the heaviest relation between each lanelet pair
    let mut weights: BTreeMap<(ElementId, ElementId), u64> = BTreeMap::new();
    let mut relate = |a: ElementId, b: ElementId, w: u64| {
        if a != b && net.lanelets.contains_key(&a) && net.lanelets.contains_key(&b) {
            let key = (a.min(b), a.max(b));
            let entry = weights.entry(key).or_insert(0);
            *entry = (*entry).max(w);
        }
    };
    for l in net.lanelets.values() {
        for &other in l.successors.iter().chain(&l.predecessors) {
            relate(l.id, other, 1);
        }
        for adj in [l.adj_left, l.adj_right].into_iter().flatten() {
            relate(l.id, adj.lanelet, adjacency_weight);
        }
    }

    let mut graph: UnGraph<ElementId, u64> = UnGraph::default();
    let node_of: BTreeMap<ElementId, NodeIndex> = net
        .lanelets
        .keys()
        .map(|&id| (id, graph.add_node(id)))
        .collect();
    for (&(a, b), &w) in &weights {
        graph.add_edge(node_of[&a], node_of[&b], w);
    }

    let mut unassigned: BTreeSet<ElementId> = net.lanelets.keys().copied().collect();
    let mut blocks = vec![];
    while !unassigned.is_empty() {
        let mut members = BTreeSet::new();
        // pop = heaviest connecting edge, smallest id on ties
        let mut frontier: std::collections::BinaryHeap<(u64, std::cmp::Reverse<ElementId>)> =
            std::collections::BinaryHeap::new();
        while members.len() < chunk_size && !unassigned.is_empty() {
            let next = loop {
                match frontier.pop() {
                    Some((_, std::cmp::Reverse(id))) if unassigned.contains(&id) => break Some(id),
                    Some(_) => continue,
                    // frontier exhausted: seed from the smallest unassigned
                    // id, packing disconnected components into the same
                    // block so the block count stays ceil(n / chunk_size)
                    None => break unassigned.iter().next().copied(),
                }
            };
            let Some(id) = next else { break };
            unassigned.remove(&id);
            members.insert(id);
            for edge in graph.edges(node_of[&id]) {
                use petgraph::visit::EdgeRef;
                let neighbor = graph[edge.target()];
                if unassigned.contains(&neighbor) {
                    frontier.push((*edge.weight(), std::cmp::Reverse(neighbor)));
                }
            }
        }
        blocks.push(Block {
            lanelets: members,
            ..Block::default()
        });
    }
    Ok(Partition { blocks })
}

#[cfg(not(feature = "graph-partition"))]
fn cut_lanelet_graph(
    _net: &RoadNetwork,
    _chunk_size: usize,
    _strategy: LaneletStrategy,
) -> Result<Partition, PartitionError> {
    Err(PartitionError::BackendUnavailable)
}

fn append_footprint_neighbors(net: &RoadNetwork, partition: &mut Partition, buffer: f64) {
    let footprints: BTreeMap<ElementId, BoundingBox> = net
        .lanelets
        .iter()
        .map(|(&id, l)| {
            let bb = BoundingBox::around(l.left_vertices.iter().chain(&l.right_vertices))
                .inflate(buffer);
            (id, bb)
        })
        .collect();
    for block in &mut partition.blocks {
        let member_boxes: Vec<&BoundingBox> =
            block.lanelets.iter().map(|id| &footprints[id]).collect();
        let extra: Vec<ElementId> = footprints
            .iter()
            .filter(|(id, bb)| {
                !block.lanelets.contains(id) && member_boxes.iter().any(|m| m.intersects(bb))
            })
            .map(|(&id, _)| id)
            .collect();
        block.lanelets.extend(extra);
    }
}

/// Pull into the block every sign, light and intersection its lanelets
/// reference, so the block's sub-network keeps those references resolvable.
fn attach_referenced(net: &RoadNetwork, block: &mut Block) {
    let lanelet_ids: Vec<ElementId> = block.lanelets.iter().copied().collect();
    for id in lanelet_ids {
        let Some(l) = net.lanelets.get(&id) else { continue };
        block
            .traffic_signs
            .extend(l.traffic_signs.iter().filter(|s| net.traffic_signs.contains_key(s)));
        block
            .traffic_lights
            .extend(l.traffic_lights.iter().filter(|t| net.traffic_lights.contains_key(t)));
    }
    block.intersections.extend(
        net.intersections
            .iter()
            .filter(|(_, i)| {
                i.incomings
                    .iter()
                    .any(|g| g.incoming_lanelets.iter().any(|l| block.lanelets.contains(l)))
            })
            .map(|(&id, _)| id),
    );
}

/// Fixed-size id chunks of traffic signs; each chunk pulls in the lanelets
/// that reference its signs.
pub fn sign_blocks(net: &RoadNetwork, chunk_size: usize) -> Partition {
    let chunk_size = chunk_size.max(1);
    let ids: Vec<ElementId> = net.traffic_signs.keys().copied().collect();
    let blocks = ids
        .chunks(chunk_size)
        .map(|chunk| {
            let mut block = Block {
                traffic_signs: chunk.iter().copied().collect(),
                ..Block::default()
            };
            block.lanelets = chunk
                .iter()
                .flat_map(|&s| net.lanelets_with_sign(s))
                .collect();
            block
        })
        .collect();
    Partition { blocks }
}

/// Fixed-size id chunks of traffic lights; each chunk pulls in the lanelets
/// that reference its lights.
pub fn light_blocks(net: &RoadNetwork, chunk_size: usize) -> Partition {
    let chunk_size = chunk_size.max(1);
    let ids: Vec<ElementId> = net.traffic_lights.keys().copied().collect();
    let blocks = ids
        .chunks(chunk_size)
        .map(|chunk| {
            let mut block = Block {
                traffic_lights: chunk.iter().copied().collect(),
                ..Block::default()
            };
            block.lanelets = chunk
                .iter()
                .flat_map(|&l| net.lanelets_with_light(l))
                .collect();
            block
        })
        .collect();
    Partition { blocks }
}

/// Fixed-size id chunks of intersections; each chunk pulls in its incoming
/// lanelets plus every lanelet within `radius` of their centroid.
pub fn intersection_blocks(net: &RoadNetwork, chunk_size: usize, radius: f64) -> Partition {
    let chunk_size = chunk_size.max(1);
    let ids: Vec<ElementId> = net.intersections.keys().copied().collect();
    let blocks = ids
        .chunks(chunk_size)
        .map(|chunk| {
            let mut block = Block {
                intersections: chunk.iter().copied().collect(),
                ..Block::default()
            };
            let incoming: BTreeSet<ElementId> = chunk
                .iter()
                .filter_map(|id| net.intersections.get(id))
                .flat_map(|i| {
                    i.incomings
                        .iter()
                        .flat_map(|g| g.incoming_lanelets.iter().copied())
                })
                .collect();
            let vertices: Vec<_> = incoming
                .iter()
                .filter_map(|id| net.lanelets.get(id))
                .flat_map(|l| l.left_vertices.iter().chain(&l.right_vertices))
                .copied()
                .collect();
            let center = crate::geometry::centroid(&vertices);
            block.lanelets = net
                .lanelets
                .iter()
                .filter(|(id, l)| {
                    incoming.contains(id)
                        || (!vertices.is_empty()
                            && BoundingBox::around(
                                l.left_vertices.iter().chain(&l.right_vertices),
                            )
                            .inflate(radius)
                            .contains(&center))
                })
                .map(|(&id, _)| id)
                .collect();
            block
        })
        .collect();
    Partition { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Adjacency, Lanelet};
    use rol::semantics::Vertex;

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    /// A two-strip corridor: lanelets 1..=4 form the right lane, 11..=14 the
    /// left lane, each left lanelet adjacent to its right counterpart.
    fn corridor() -> RoadNetwork {
        let mut net = RoadNetwork::new("corridor");
        for i in 0..4u64 {
            let x = i as f64 * 10.0;
            let mut right = Lanelet::new(
                1 + i,
                vec![v(x, 1.0), v(x + 10.0, 1.0)],
                vec![v(x, 0.0), v(x + 10.0, 0.0)],
            );
            let mut left = Lanelet::new(
                11 + i,
                vec![v(x, 2.0), v(x + 10.0, 2.0)],
                vec![v(x, 1.0), v(x + 10.0, 1.0)],
            );
            right.adj_left = Some(Adjacency {
                lanelet: left.id,
                same_direction: true,
            });
            left.adj_right = Some(Adjacency {
                lanelet: right.id,
                same_direction: true,
            });
            if i > 0 {
                right.predecessors = vec![i];
                left.predecessors = vec![10 + i];
            }
            if i < 3 {
                right.successors = vec![2 + i];
                left.successors = vec![12 + i];
            }
            net.add_lanelet(right);
            net.add_lanelet(left);
        }
        net
    }

    #[test]
    fn test_one_block() {
        let net = corridor();
        let p = one_block(&net);
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].lanelets.len(), 8);
    }

    #[test]
    fn test_strips_keeps_adjacent_lanelets_together() {
        let net = corridor();
        let p = lanelet_blocks(&net, 4, LaneletStrategy::Strips, None).unwrap();
        assert_eq!(p.blocks.len(), 2);
        for block in &p.blocks {
            for &id in &block.lanelets {
                if let Some(adj) = net.lanelets[&id].adj_left {
                    assert!(
                        block.lanelets.contains(&adj.lanelet),
                        "lanelet {id} split from its left neighbor {}",
                        adj.lanelet
                    );
                }
            }
        }
    }

    #[test]
    fn test_partition_is_deterministic() {
        let net = corridor();
        let p1 = lanelet_blocks(&net, 3, LaneletStrategy::Strips, Some(0.5)).unwrap();
        let p2 = lanelet_blocks(&net, 3, LaneletStrategy::Strips, Some(0.5)).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_block_count_matches_chunks() {
        let net = corridor();
        let p = lanelet_blocks(&net, 3, LaneletStrategy::Normal, None).unwrap();
        // ceil(8 / 3)
        assert_eq!(p.blocks.len(), 3);
        let total: usize = p.blocks.iter().map(|b| b.lanelets.len()).sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn test_sign_chunks_pull_referencing_lanelets() {
        let mut net = corridor();
        net.add_traffic_sign(crate::model::TrafficSign {
            id: 100,
            position: Some(v(5.0, 0.0)),
            elements: vec!["274".to_string()],
        });
        net.lanelets.get_mut(&1).unwrap().traffic_signs.insert(100);

        let p = sign_blocks(&net, 10);
        assert_eq!(p.blocks.len(), 1);
        assert!(p.blocks[0].traffic_signs.contains(&100));
        assert!(p.blocks[0].lanelets.contains(&1));
    }

    #[test]
    fn test_restrict_truncates_cross_block_references() {
        let net = corridor();
        let block = Block {
            lanelets: [1, 11].into_iter().collect(),
            ..Block::default()
        };
        let sub = block.restrict(&net);
        assert_eq!(sub.lanelets.len(), 2);
        // lanelet 1's successor 2 is outside the block: the reference is
        // kept but its target is not copied
        assert_eq!(sub.lanelets[&1].successors, vec![2]);
        assert!(!sub.lanelets.contains_key(&2));
        // the intra-block adjacency survives intact
        assert_eq!(sub.lanelets[&1].adj_left.unwrap().lanelet, 11);
    }
}
