// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Corrective mutations for invalid states.
//!
//! Every formula id maps through a static, exhaustive match to a routine of
//! one of the per-element-type repairers. Routines are idempotent:
//! re-applying one to an already-fixed location leaves the network
//! unchanged. Repair always runs sequentially in the orchestrating thread,
//! since it mutates the one shared network.

use crate::catalogue::{ElementType, FormulaId};
use crate::config::VerificationConfig;
use crate::verifier::InvalidStates;
use roadnet::geometry;
use roadnet::mapping::correct_boundary_assignment;
use roadnet::model::{Adjacency, RoadNetwork};
use rol::semantics::{ElementId, Vertex};

/// Applies per-formula repairs to a network.
pub struct Repairer<'a> {
    config: &'a VerificationConfig,
}

impl<'a> Repairer<'a> {
    /// A repairer using the run's configuration (for geometric tolerances).
    pub fn new(config: &'a VerificationConfig) -> Self {
        Self { config }
    }

    /// Repair every location in the given invalid states, in deterministic
    /// order.
    pub fn repair_map(&self, net: &mut RoadNetwork, invalid: &InvalidStates) {
        for (formula, location) in invalid.flatten() {
            self.repair_one(net, formula, &location);
        }
    }

    /// Dispatch one `(formula, location)` pair to its repair routine.
    pub fn repair_one(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        log::debug!("repairing {formula} at {location:?}");
        match formula.element_type() {
            ElementType::General => self.repair_general(net, formula, location),
            ElementType::Lanelet => self.repair_lanelet(net, formula, location),
            ElementType::TrafficSign => self.repair_sign(net, formula, location),
            ElementType::TrafficLight => self.repair_light(net, formula, location),
            ElementType::Intersection => self.repair_intersection(net, formula, location),
            ElementType::Area => self.repair_area(net, formula, location),
        }
    }

    fn repair_general(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        match formula {
            // keep the first entity carrying the id (in collection order)
            // and move the others to fresh ids; references keep pointing at
            // the retained entity
            FormulaId::UniqueId => {
                let id = location[0];
                let mut seen = net.lanelets.contains_key(&id);
                if net.traffic_signs.contains_key(&id) {
                    if seen {
                        let mut s = net.traffic_signs.remove(&id).unwrap();
                        s.id = net.next_free_id();
                        net.traffic_signs.insert(s.id, s);
                    }
                    seen = true;
                }
                if net.traffic_lights.contains_key(&id) {
                    if seen {
                        let mut l = net.traffic_lights.remove(&id).unwrap();
                        l.id = net.next_free_id();
                        net.traffic_lights.insert(l.id, l);
                    }
                    seen = true;
                }
                if net.intersections.contains_key(&id) {
                    if seen {
                        let mut i = net.intersections.remove(&id).unwrap();
                        i.id = net.next_free_id();
                        net.intersections.insert(i.id, i);
                    }
                    seen = true;
                }
                if net.areas.contains_key(&id) && seen {
                    let mut a = net.areas.remove(&id).unwrap();
                    a.id = net.next_free_id();
                    net.areas.insert(a.id, a);
                }
            }
            _ => unreachable!("{formula} is not a general formula"),
        }
    }

    fn repair_lanelet(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        use FormulaId::*;
        let id = location[0];
        let eps = self.config.tolerances.intersection;
        match formula {
            LeftRightBoundaryAssignment => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if !correct_boundary_assignment(l) {
                        std::mem::swap(&mut l.left_vertices, &mut l.right_vertices);
                        l.center_vertices.clear();
                    }
                }
            }
            PolylineSelfIntersection => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    let mut changed = false;
                    for boundary in [&mut l.left_vertices, &mut l.right_vertices] {
                        if geometry::polyline_self_intersects(boundary, eps) {
                            *boundary = straighten(boundary);
                            changed = true;
                        }
                    }
                    if changed {
                        l.center_vertices.clear();
                    }
                }
            }
            BoundariesIntersection => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if geometry::polylines_intersect(&l.left_vertices, &l.right_vertices, eps) {
                        l.right_vertices = straighten(&l.right_vertices);
                        if geometry::polylines_intersect(&l.left_vertices, &l.right_vertices, eps)
                        {
                            // straight boundaries that still cross are
                            // almost always stored back to front
                            l.right_vertices.reverse();
                        }
                        l.center_vertices.clear();
                    }
                }
            }
            VerticesMoreThanOne => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if l.left_vertices.len() < 2 {
                        l.left_vertices = rebuild_boundary(&l.left_vertices, &l.right_vertices);
                        l.center_vertices.clear();
                    }
                    if l.right_vertices.len() < 2 {
                        l.right_vertices = rebuild_boundary(&l.right_vertices, &l.left_vertices);
                        l.center_vertices.clear();
                    }
                }
            }
            NoSelfPredecessor => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.predecessors.retain(|&p| p != id);
                }
            }
            NoSelfSuccessor => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.successors.retain(|&s| s != id);
                }
            }
            NoSelfLeftAdj => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if l.adj_left.is_some_and(|a| a.lanelet == id) {
                        l.adj_left = None;
                    }
                }
            }
            NoSelfRightAdj => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if l.adj_right.is_some_and(|a| a.lanelet == id) {
                        l.adj_right = None;
                    }
                }
            }
            ExistenceLeftAdj => {
                let known: Vec<ElementId> = net.lanelets.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if l.adj_left.is_some_and(|a| !known.contains(&a.lanelet)) {
                        l.adj_left = None;
                    }
                }
            }
            ExistenceRightAdj => {
                let known: Vec<ElementId> = net.lanelets.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if l.adj_right.is_some_and(|a| !known.contains(&a.lanelet)) {
                        l.adj_right = None;
                    }
                }
            }
            ExistencePredecessor => {
                let known: Vec<ElementId> = net.lanelets.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.predecessors.retain(|p| known.contains(p));
                }
            }
            ExistenceSuccessor => {
                let known: Vec<ElementId> = net.lanelets.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.successors.retain(|s| known.contains(s));
                }
            }
            ExistenceTrafficSign => {
                let known: Vec<ElementId> = net.traffic_signs.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.traffic_signs.retain(|s| known.contains(s));
                }
            }
            ExistenceTrafficLight => {
                let known: Vec<ElementId> = net.traffic_lights.keys().copied().collect();
                if let Some(l) = net.lanelets.get_mut(&id) {
                    l.traffic_lights.retain(|t| known.contains(t));
                }
            }
            ExistenceStopLineTrafficSign => {
                let known: Vec<ElementId> = net.traffic_signs.keys().copied().collect();
                if let Some(sl) = net.lanelets.get_mut(&id).and_then(|l| l.stop_line.as_mut()) {
                    sl.traffic_sign_refs.retain(|s| known.contains(s));
                }
            }
            ExistenceStopLineTrafficLight => {
                let known: Vec<ElementId> = net.traffic_lights.keys().copied().collect();
                if let Some(sl) = net.lanelets.get_mut(&id).and_then(|l| l.stop_line.as_mut()) {
                    sl.traffic_light_refs.retain(|t| known.contains(t));
                }
            }
            StopLineReferencesTrafficSign => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if let Some(sl) = &l.stop_line {
                        let refs: Vec<ElementId> = sl.traffic_sign_refs.iter().copied().collect();
                        l.traffic_signs.extend(refs);
                    }
                }
            }
            StopLineReferencesTrafficLight => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    if let Some(sl) = &l.stop_line {
                        let refs: Vec<ElementId> = sl.traffic_light_refs.iter().copied().collect();
                        l.traffic_lights.extend(refs);
                    }
                }
            }
            PotentialLeftSameDirParallelAdj => {
                self.set_missing_adjacency(net, location, AdjacencySide::Left, true)
            }
            PotentialLeftOppositeDirParallelAdj => {
                self.set_missing_adjacency(net, location, AdjacencySide::Left, false)
            }
            PotentialRightSameDirParallelAdj => {
                self.set_missing_adjacency(net, location, AdjacencySide::Right, true)
            }
            PotentialRightOppositeDirParallelAdj => {
                self.set_missing_adjacency(net, location, AdjacencySide::Right, false)
            }
            PotentialPredecessor => {
                let other = location[1];
                if net.lanelets.contains_key(&other) {
                    if let Some(l) = net.lanelets.get_mut(&id) {
                        if !l.predecessors.contains(&other) {
                            l.predecessors.push(other);
                        }
                    }
                }
            }
            PotentialSuccessor => {
                let other = location[1];
                if net.lanelets.contains_key(&other) {
                    if let Some(l) = net.lanelets.get_mut(&id) {
                        if !l.successors.contains(&other) {
                            l.successors.push(other);
                        }
                    }
                }
            }
            ConnectionsPredecessor => {
                // snap the predecessor's end vertices onto this lanelet's
                // start vertices
                let targets = net.lanelets.get(&id).map(|l| {
                    (
                        l.left_vertices.first().copied(),
                        l.right_vertices.first().copied(),
                    )
                });
                if let (Some((left, right)), Some(other)) =
                    (targets, net.lanelets.get_mut(&location[1]))
                {
                    set_last(&mut other.left_vertices, left);
                    set_last(&mut other.right_vertices, right);
                    other.center_vertices.clear();
                }
            }
            ConnectionsSuccessor => {
                // snap the successor's start vertices onto this lanelet's
                // end vertices
                let targets = net.lanelets.get(&id).map(|l| {
                    (
                        l.left_vertices.last().copied(),
                        l.right_vertices.last().copied(),
                    )
                });
                if let (Some((left, right)), Some(other)) =
                    (targets, net.lanelets.get_mut(&location[1]))
                {
                    set_first(&mut other.left_vertices, left);
                    set_first(&mut other.right_vertices, right);
                    other.center_vertices.clear();
                }
            }
            PolylinesLeftSameDirParallelAdj => {
                self.align_shared_boundary(net, location, AdjacencySide::Left, true)
            }
            PolylinesLeftOppositeDirParallelAdj => {
                self.align_shared_boundary(net, location, AdjacencySide::Left, false)
            }
            PolylinesRightSameDirParallelAdj => {
                self.align_shared_boundary(net, location, AdjacencySide::Right, true)
            }
            PolylinesRightOppositeDirParallelAdj => {
                self.align_shared_boundary(net, location, AdjacencySide::Right, false)
            }
            LeftMergingAdj => {
                let target = net
                    .lanelets
                    .get(&id)
                    .and_then(|l| l.left_vertices.last().copied());
                if let (Some(target), Some(other)) = (target, net.lanelets.get_mut(&location[1])) {
                    set_last(&mut other.right_vertices, Some(target));
                    other.center_vertices.clear();
                }
            }
            LeftForkingAdj => {
                let target = net
                    .lanelets
                    .get(&id)
                    .and_then(|l| l.left_vertices.first().copied());
                if let (Some(target), Some(other)) = (target, net.lanelets.get_mut(&location[1])) {
                    set_first(&mut other.right_vertices, Some(target));
                    other.center_vertices.clear();
                }
            }
            RightMergingAdj => {
                let target = net
                    .lanelets
                    .get(&id)
                    .and_then(|l| l.right_vertices.last().copied());
                if let (Some(target), Some(other)) = (target, net.lanelets.get_mut(&location[1])) {
                    set_last(&mut other.left_vertices, Some(target));
                    other.center_vertices.clear();
                }
            }
            RightForkingAdj => {
                let target = net
                    .lanelets
                    .get(&id)
                    .and_then(|l| l.right_vertices.first().copied());
                if let (Some(target), Some(other)) = (target, net.lanelets.get_mut(&location[1])) {
                    set_first(&mut other.left_vertices, Some(target));
                    other.center_vertices.clear();
                }
            }
            StopLineBetweenBoundaries => {
                if let Some(l) = net.lanelets.get_mut(&id) {
                    let left = l.left_vertices.clone();
                    let right = l.right_vertices.clone();
                    if let Some(sl) = &mut l.stop_line {
                        sl.start = geometry::nearest_point_on_polyline(&sl.start, &left);
                        sl.end = geometry::nearest_point_on_polyline(&sl.end, &right);
                    }
                }
            }
            _ => unreachable!("{formula} is not a lanelet formula"),
        }
    }

    fn set_missing_adjacency(
        &self,
        net: &mut RoadNetwork,
        location: &[ElementId],
        side: AdjacencySide,
        same_direction: bool,
    ) {
        let (id, other) = (location[0], location[1]);
        if !net.lanelets.contains_key(&other) {
            return;
        }
        let Some(l) = net.lanelets.get_mut(&id) else { return };
        let adjacency = Adjacency {
            lanelet: other,
            same_direction,
        };
        match side {
            AdjacencySide::Left if l.adj_left.is_none() => l.adj_left = Some(adjacency),
            AdjacencySide::Right if l.adj_right.is_none() => l.adj_right = Some(adjacency),
            _ => (),
        }
    }

    /// Make the declared neighbor's counterpart boundary coincide with this
    /// lanelet's boundary.
    fn align_shared_boundary(
        &self,
        net: &mut RoadNetwork,
        location: &[ElementId],
        side: AdjacencySide,
        same_direction: bool,
    ) {
        let (id, other_id) = (location[0], location[1]);
        let boundary = match (net.lanelets.get(&id), side) {
            (Some(l), AdjacencySide::Left) => l.left_vertices.clone(),
            (Some(l), AdjacencySide::Right) => l.right_vertices.clone(),
            (None, _) => return,
        };
        let Some(other) = net.lanelets.get_mut(&other_id) else { return };
        match (side, same_direction) {
            (AdjacencySide::Left, true) => other.right_vertices = boundary,
            (AdjacencySide::Left, false) => {
                other.left_vertices = boundary.into_iter().rev().collect()
            }
            (AdjacencySide::Right, true) => other.left_vertices = boundary,
            (AdjacencySide::Right, false) => {
                other.right_vertices = boundary.into_iter().rev().collect()
            }
        }
        other.center_vertices.clear();
    }

    fn repair_sign(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        let id = location[0];
        match formula {
            FormulaId::AtLeastOneSignElement => {
                if net.traffic_signs.get(&id).is_some_and(|s| s.elements.is_empty()) {
                    remove_sign(net, id);
                }
            }
            FormulaId::SignPositionExists => {
                let fallback = referencing_lanelet_position(net, net.lanelets_with_sign(id));
                if let Some(s) = net.traffic_signs.get_mut(&id) {
                    if s.position.is_none() {
                        s.position = Some(fallback);
                    }
                }
            }
            FormulaId::ReferencedTrafficSign => {
                if net.lanelets_with_sign(id).is_empty() {
                    remove_sign(net, id);
                }
            }
            _ => unreachable!("{formula} is not a traffic-sign formula"),
        }
    }

    fn repair_light(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        let id = location[0];
        match formula {
            FormulaId::LightPositionExists => {
                let fallback = referencing_lanelet_position(net, net.lanelets_with_light(id));
                if let Some(l) = net.traffic_lights.get_mut(&id) {
                    if l.position.is_none() {
                        l.position = Some(fallback);
                    }
                }
            }
            FormulaId::ReferencedTrafficLight => {
                if net.lanelets_with_light(id).is_empty() {
                    remove_light(net, id);
                }
            }
            _ => unreachable!("{formula} is not a traffic-light formula"),
        }
    }

    fn repair_intersection(
        &self,
        net: &mut RoadNetwork,
        formula: FormulaId,
        location: &[ElementId],
    ) {
        let id = location[0];
        match formula {
            FormulaId::AtLeastOneIncoming => {
                if net.intersections.get(&id).is_some_and(|i| i.incomings.is_empty()) {
                    net.intersections.remove(&id);
                }
            }
            FormulaId::ExistenceIncomingLanelets => {
                let known: Vec<ElementId> = net.lanelets.keys().copied().collect();
                if let Some(i) = net.intersections.get_mut(&id) {
                    for g in &mut i.incomings {
                        g.incoming_lanelets.retain(|l| known.contains(l));
                    }
                }
            }
            _ => unreachable!("{formula} is not an intersection formula"),
        }
    }

    fn repair_area(&self, net: &mut RoadNetwork, formula: FormulaId, location: &[ElementId]) {
        match formula {
            FormulaId::AreaMinVertices => {
                if net
                    .areas
                    .get(&location[0])
                    .is_some_and(|a| a.boundary.len() < 3)
                {
                    net.areas.remove(&location[0]);
                }
            }
            _ => unreachable!("{formula} is not an area formula"),
        }
    }
}

#[derive(Clone, Copy)]
enum AdjacencySide {
    Left,
    Right,
}

/// Keep only the endpoints of a polyline.
fn straighten(p: &[Vertex]) -> Vec<Vertex> {
    match (p.first(), p.last()) {
        (Some(&a), Some(&b)) if p.len() >= 2 => vec![a, b],
        _ => p.to_vec(),
    }
}

/// Rebuild a degenerate boundary from its sibling, so the lanelet regains a
/// drawable shape.
fn rebuild_boundary(broken: &[Vertex], sibling: &[Vertex]) -> Vec<Vertex> {
    match broken.len() {
        0 if sibling.len() >= 2 => sibling.to_vec(),
        1 if sibling.len() >= 2 => vec![broken[0], sibling[sibling.len() - 1]],
        1 => vec![broken[0], Vertex::new(broken[0].x + 1.0, broken[0].y)],
        _ => vec![Vertex::new(0.0, 0.0), Vertex::new(1.0, 0.0)],
    }
}

fn set_first(p: &mut Vec<Vertex>, v: Option<Vertex>) {
    if let (Some(first), Some(v)) = (p.first_mut(), v) {
        *first = v;
    }
}

fn set_last(p: &mut Vec<Vertex>, v: Option<Vertex>) {
    if let (Some(last), Some(v)) = (p.last_mut(), v) {
        *last = v;
    }
}

/// A deterministic position for a repositioned sign or light: the end of
/// the right boundary of the first referencing lanelet, or the origin.
fn referencing_lanelet_position(net: &RoadNetwork, referencing: Vec<ElementId>) -> Vertex {
    referencing
        .first()
        .and_then(|id| net.lanelets.get(id))
        .and_then(|l| l.right_vertices.last().copied())
        .unwrap_or(Vertex::new(0.0, 0.0))
}

fn remove_sign(net: &mut RoadNetwork, id: ElementId) {
    net.traffic_signs.remove(&id);
    for l in net.lanelets.values_mut() {
        l.traffic_signs.remove(&id);
        if let Some(sl) = &mut l.stop_line {
            sl.traffic_sign_refs.remove(&id);
        }
    }
}

fn remove_light(net: &mut RoadNetwork, id: ElementId) {
    net.traffic_lights.remove(&id);
    for l in net.lanelets.values_mut() {
        l.traffic_lights.remove(&id);
        if let Some(sl) = &mut l.stop_line {
            sl.traffic_light_refs.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::FormulaId::*;
    use roadnet::model::{Lanelet, TrafficSign};

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    fn lanelet(id: ElementId) -> Lanelet {
        Lanelet::new(
            id,
            vec![v(0.0, 1.0), v(10.0, 1.0)],
            vec![v(0.0, 0.0), v(10.0, 0.0)],
        )
    }

    /// Apply the routine twice; the second application must be a no-op.
    fn assert_idempotent(
        mut net: RoadNetwork,
        formula: FormulaId,
        location: &[ElementId],
    ) -> RoadNetwork {
        let config = VerificationConfig::default();
        let repairer = Repairer::new(&config);
        repairer.repair_one(&mut net, formula, location);
        let after_first = net.clone();
        repairer.repair_one(&mut net, formula, location);
        assert_eq!(net, after_first, "{formula} is not idempotent");
        net
    }

    #[test]
    fn test_existence_left_adj_clears_dangling_reference() {
        let mut net = RoadNetwork::new("t");
        let mut l = lanelet(1);
        l.adj_left = Some(Adjacency {
            lanelet: 42,
            same_direction: true,
        });
        net.add_lanelet(l);
        let net = assert_idempotent(net, ExistenceLeftAdj, &[1]);
        assert_eq!(net.lanelets[&1].adj_left, None);
    }

    #[test]
    fn test_existence_predecessor_keeps_valid_references() {
        let mut net = RoadNetwork::new("t");
        let mut l = lanelet(1);
        l.predecessors = vec![2, 42];
        net.add_lanelet(l);
        net.add_lanelet(lanelet(2));
        let net = assert_idempotent(net, ExistencePredecessor, &[1]);
        assert_eq!(net.lanelets[&1].predecessors, vec![2]);
    }

    #[test]
    fn test_potential_left_adj_sets_reference() {
        let mut net = RoadNetwork::new("t");
        net.add_lanelet(lanelet(1));
        net.add_lanelet(lanelet(2));
        let net = assert_idempotent(net, PotentialLeftSameDirParallelAdj, &[1, 2]);
        assert_eq!(
            net.lanelets[&1].adj_left,
            Some(Adjacency {
                lanelet: 2,
                same_direction: true
            })
        );
    }

    #[test]
    fn test_align_shared_boundary() {
        let mut net = RoadNetwork::new("t");
        let mut l1 = lanelet(1);
        l1.adj_left = Some(Adjacency {
            lanelet: 2,
            same_direction: true,
        });
        net.add_lanelet(l1);
        let mut l2 = Lanelet::new(
            2,
            vec![v(0.0, 2.0), v(10.0, 2.0)],
            // off by a meter from lanelet 1's left boundary
            vec![v(0.0, 2.0), v(10.0, 2.0)],
        );
        l2.adj_right = Some(Adjacency {
            lanelet: 1,
            same_direction: true,
        });
        net.add_lanelet(l2);

        let net = assert_idempotent(net, PolylinesLeftSameDirParallelAdj, &[1, 2]);
        assert_eq!(
            net.lanelets[&2].right_vertices,
            net.lanelets[&1].left_vertices
        );
    }

    #[test]
    fn test_unique_id_reassigns_duplicates() {
        let mut net = RoadNetwork::new("t");
        net.add_lanelet(lanelet(7));
        net.add_traffic_sign(TrafficSign {
            id: 7,
            position: Some(v(0.0, 0.0)),
            elements: vec!["274".to_string()],
        });
        let net = assert_idempotent(net, UniqueId, &[7]);
        assert_eq!(net.id_multiplicity(7), 1);
        assert!(net.lanelets.contains_key(&7));
        assert_eq!(net.traffic_signs.len(), 1);
        assert!(!net.traffic_signs.contains_key(&7));
    }

    #[test]
    fn test_unreferenced_sign_is_removed() {
        let mut net = RoadNetwork::new("t");
        net.add_lanelet(lanelet(1));
        net.add_traffic_sign(TrafficSign {
            id: 10,
            position: Some(v(0.0, 0.0)),
            elements: vec!["206".to_string()],
        });
        let net = assert_idempotent(net, ReferencedTrafficSign, &[10]);
        assert!(net.traffic_signs.is_empty());
    }

    #[test]
    fn test_boundary_swap_is_guarded() {
        let mut net = RoadNetwork::new("t");
        // boundaries deliberately swapped: "left" lies to the right
        let l = Lanelet::new(
            1,
            vec![v(0.0, 0.0), v(10.0, 0.0)],
            vec![v(0.0, 1.0), v(10.0, 1.0)],
        );
        net.add_lanelet(l);
        let net = assert_idempotent(net, LeftRightBoundaryAssignment, &[1]);
        assert!(correct_boundary_assignment(&net.lanelets[&1]));
    }

    #[test]
    fn test_self_intersection_straightens() {
        let mut net = RoadNetwork::new("t");
        let mut l = lanelet(1);
        l.left_vertices = vec![v(0.0, 1.0), v(10.0, 2.0), v(10.0, 0.5), v(0.0, 2.0)];
        net.add_lanelet(l);
        let net = assert_idempotent(net, PolylineSelfIntersection, &[1]);
        assert_eq!(
            net.lanelets[&1].left_vertices,
            vec![v(0.0, 1.0), v(0.0, 2.0)]
        );
    }
}
