// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The road-network entity arena.
//!
//! All cross-entity references are plain element ids resolved through the
//! per-collection maps, so reference cycles (predecessor/successor loops,
//! mutual adjacency) need no special handling. Maps are keyed by id and
//! ordered, which gives every consumer sorted, deterministic iteration.

use rol::semantics::{ElementId, Vertex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A lateral neighbor reference, tagged with whether the neighbor runs in the
/// same driving direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    /// The neighboring lanelet's id
    pub lanelet: ElementId,
    /// Whether the neighbor runs in the same direction
    pub same_direction: bool,
}

/// A stop line spanning a lanelet, optionally tied to signs and lights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopLine {
    /// One endpoint of the line
    pub start: Vertex,
    /// The other endpoint
    pub end: Vertex,
    /// Traffic signs giving this stop line meaning
    #[serde(default)]
    pub traffic_sign_refs: BTreeSet<ElementId>,
    /// Traffic lights giving this stop line meaning
    #[serde(default)]
    pub traffic_light_refs: BTreeSet<ElementId>,
}

/// An atomic directed lane segment bounded by a left and a right polyline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lanelet {
    /// This lanelet's id
    pub id: ElementId,
    /// The left boundary, in driving direction
    pub left_vertices: Vec<Vertex>,
    /// The right boundary, in driving direction
    pub right_vertices: Vec<Vertex>,
    /// The center line; may be empty, in which case it is derived from the
    /// boundaries where needed
    #[serde(default)]
    pub center_vertices: Vec<Vertex>,
    /// Lanelets this one continues from
    #[serde(default)]
    pub predecessors: Vec<ElementId>,
    /// Lanelets this one continues into
    #[serde(default)]
    pub successors: Vec<ElementId>,
    /// The left lateral neighbor, if any
    #[serde(default)]
    pub adj_left: Option<Adjacency>,
    /// The right lateral neighbor, if any
    #[serde(default)]
    pub adj_right: Option<Adjacency>,
    /// An optional stop line
    #[serde(default)]
    pub stop_line: Option<StopLine>,
    /// Traffic signs that apply to this lanelet
    #[serde(default)]
    pub traffic_signs: BTreeSet<ElementId>,
    /// Traffic lights that apply to this lanelet
    #[serde(default)]
    pub traffic_lights: BTreeSet<ElementId>,
}

impl Lanelet {
    /// A minimal lanelet with the given boundaries and no references.
    pub fn new(id: ElementId, left: Vec<Vertex>, right: Vec<Vertex>) -> Self {
        Self {
            id,
            left_vertices: left,
            right_vertices: right,
            center_vertices: vec![],
            predecessors: vec![],
            successors: vec![],
            adj_left: None,
            adj_right: None,
            stop_line: None,
            traffic_signs: BTreeSet::new(),
            traffic_lights: BTreeSet::new(),
        }
    }

    /// Every id this lanelet references, in deterministic order.
    pub fn referenced_ids(&self) -> Vec<ElementId> {
        let mut ids = vec![];
        ids.extend(self.adj_left.map(|a| a.lanelet));
        ids.extend(self.adj_right.map(|a| a.lanelet));
        ids.extend(self.predecessors.iter().copied());
        ids.extend(self.successors.iter().copied());
        ids.extend(self.traffic_signs.iter().copied());
        ids.extend(self.traffic_lights.iter().copied());
        if let Some(sl) = &self.stop_line {
            ids.extend(sl.traffic_sign_refs.iter().copied());
            ids.extend(sl.traffic_light_refs.iter().copied());
        }
        ids
    }
}

/// A traffic sign: a post carrying one or more sign elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficSign {
    /// This sign's id
    pub id: ElementId,
    /// Where the sign stands
    #[serde(default)]
    pub position: Option<Vertex>,
    /// The sign elements on this post, e.g. country-specific sign codes
    #[serde(default)]
    pub elements: Vec<String>,
}

/// A traffic light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficLight {
    /// This light's id
    pub id: ElementId,
    /// Where the light stands
    #[serde(default)]
    pub position: Option<Vertex>,
}

/// One incoming approach of an intersection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncomingGroup {
    /// This group's id
    pub id: ElementId,
    /// The lanelets entering the intersection through this approach
    #[serde(default)]
    pub incoming_lanelets: BTreeSet<ElementId>,
}

/// An intersection: a set of incoming approaches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    /// This intersection's id
    pub id: ElementId,
    /// The incoming approaches
    #[serde(default)]
    pub incomings: Vec<IncomingGroup>,
}

/// A free-form drivable area bounded by a closed polyline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// This area's id
    pub id: ElementId,
    /// The boundary polyline
    #[serde(default)]
    pub boundary: Vec<Vertex>,
}

/// A road network: id-indexed collections of all entity kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct RoadNetwork {
    /// The benchmark id identifying this map in reports
    #[serde(default)]
    pub benchmark_id: String,
    /// All lanelets, by id
    #[serde(default)]
    pub lanelets: BTreeMap<ElementId, Lanelet>,
    /// All traffic signs, by id
    #[serde(default)]
    pub traffic_signs: BTreeMap<ElementId, TrafficSign>,
    /// All traffic lights, by id
    #[serde(default)]
    pub traffic_lights: BTreeMap<ElementId, TrafficLight>,
    /// All intersections, by id
    #[serde(default)]
    pub intersections: BTreeMap<ElementId, Intersection>,
    /// All areas, by id
    #[serde(default)]
    pub areas: BTreeMap<ElementId, Area>,
}

impl RoadNetwork {
    /// An empty network with the given benchmark id.
    pub fn new(benchmark_id: &str) -> Self {
        Self {
            benchmark_id: benchmark_id.to_string(),
            ..Self::default()
        }
    }

    /// Insert a lanelet, keyed by its id.
    pub fn add_lanelet(&mut self, l: Lanelet) {
        self.lanelets.insert(l.id, l);
    }

    /// Insert a traffic sign, keyed by its id.
    pub fn add_traffic_sign(&mut self, s: TrafficSign) {
        self.traffic_signs.insert(s.id, s);
    }

    /// Insert a traffic light, keyed by its id.
    pub fn add_traffic_light(&mut self, l: TrafficLight) {
        self.traffic_lights.insert(l.id, l);
    }

    /// Insert an intersection, keyed by its id.
    pub fn add_intersection(&mut self, i: Intersection) {
        self.intersections.insert(i.id, i);
    }

    /// Insert an area, keyed by its id.
    pub fn add_area(&mut self, a: Area) {
        self.areas.insert(a.id, a);
    }

    /// All element ids across every collection, sorted. An id used by more
    /// than one entity appears once; use [`Self::id_multiplicity`] to detect
    /// duplicates.
    pub fn all_ids(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = self.id_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// How many entities carry the given id across all collections.
    pub fn id_multiplicity(&self, id: ElementId) -> usize {
        self.id_iter().filter(|i| *i == id).count()
    }

    /// The smallest id strictly greater than every id in use.
    pub fn next_free_id(&self) -> ElementId {
        self.id_iter().max().map_or(1, |id| id + 1)
    }

    fn id_iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.lanelets
            .keys()
            .chain(self.traffic_signs.keys())
            .chain(self.traffic_lights.keys())
            .chain(self.intersections.keys())
            .chain(self.areas.keys())
            .copied()
    }

    /// The lanelets that reference the given sign.
    pub fn lanelets_with_sign(&self, sign: ElementId) -> Vec<ElementId> {
        self.lanelets
            .values()
            .filter(|l| l.traffic_signs.contains(&sign))
            .map(|l| l.id)
            .collect()
    }

    /// The lanelets that reference the given light.
    pub fn lanelets_with_light(&self, light: ElementId) -> Vec<ElementId> {
        self.lanelets
            .values()
            .filter(|l| l.traffic_lights.contains(&light))
            .map(|l| l.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rol::semantics::Vertex;

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    #[test]
    fn test_id_multiplicity() {
        let mut net = RoadNetwork::new("test");
        net.add_lanelet(Lanelet::new(1, vec![v(0.0, 1.0)], vec![v(0.0, 0.0)]));
        net.add_traffic_sign(TrafficSign {
            id: 1,
            position: None,
            elements: vec!["274".to_string()],
        });
        net.add_traffic_light(TrafficLight {
            id: 3,
            position: Some(v(1.0, 1.0)),
        });

        assert_eq!(net.id_multiplicity(1), 2);
        assert_eq!(net.id_multiplicity(3), 1);
        assert_eq!(net.all_ids(), vec![1, 3]);
        assert_eq!(net.next_free_id(), 4);
    }

    #[test]
    fn test_referenced_ids() {
        let mut l = Lanelet::new(7, vec![v(0.0, 1.0)], vec![v(0.0, 0.0)]);
        l.adj_left = Some(Adjacency {
            lanelet: 8,
            same_direction: true,
        });
        l.predecessors = vec![5];
        l.successors = vec![6];
        l.traffic_signs.insert(20);
        assert_eq!(l.referenced_ids(), vec![8, 5, 6, 20]);
    }
}
