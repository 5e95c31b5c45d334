// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Local neighborhood extraction for bounded re-verification.
//!
//! After a repair, only the neighborhood of the repaired location needs to be
//! checked again. [`extract`] walks one hop of references from the seed
//! elements, adds every lanelet within a geometric buffer, and prunes
//! references that leave the extracted copy so the sub-map is
//! self-consistent. Ids that no longer resolve are tolerated by skipping:
//! the input may be imperfect before repair has run.

use crate::geometry::BoundingBox;
use crate::model::RoadNetwork;
use rol::semantics::ElementId;
use std::collections::BTreeSet;

/// Extract the one-hop-plus-buffer neighborhood around the seed elements.
pub fn extract(net: &RoadNetwork, seeds: &[ElementId], buffer: f64) -> RoadNetwork {
    let mut lanelets: BTreeSet<ElementId> = BTreeSet::new();
    let mut signs: BTreeSet<ElementId> = BTreeSet::new();
    let mut lights: BTreeSet<ElementId> = BTreeSet::new();
    let mut intersections: BTreeSet<ElementId> = BTreeSet::new();
    let mut areas: BTreeSet<ElementId> = BTreeSet::new();

    // one hop of references from every seed, whatever kind the seed is
    for &seed in seeds {
        if let Some(l) = net.lanelets.get(&seed) {
            lanelets.insert(seed);
            for id in l.referenced_ids() {
                if net.lanelets.contains_key(&id) {
                    lanelets.insert(id);
                }
                if net.traffic_signs.contains_key(&id) {
                    signs.insert(id);
                }
                if net.traffic_lights.contains_key(&id) {
                    lights.insert(id);
                }
            }
        }
        if net.traffic_signs.contains_key(&seed) {
            signs.insert(seed);
            lanelets.extend(net.lanelets_with_sign(seed));
        }
        if net.traffic_lights.contains_key(&seed) {
            lights.insert(seed);
            lanelets.extend(net.lanelets_with_light(seed));
        }
        if let Some(i) = net.intersections.get(&seed) {
            intersections.insert(seed);
            for g in &i.incomings {
                lanelets.extend(
                    g.incoming_lanelets
                        .iter()
                        .filter(|l| net.lanelets.contains_key(l)),
                );
            }
        }
        if net.areas.contains_key(&seed) {
            areas.insert(seed);
        }
    }

    // geometric buffer: lanelets whose footprint touches the inflated
    // footprint of any seed lanelet
    let seed_boxes: Vec<BoundingBox> = seeds
        .iter()
        .filter_map(|id| net.lanelets.get(id))
        .map(|l| {
            BoundingBox::around(l.left_vertices.iter().chain(&l.right_vertices)).inflate(buffer)
        })
        .collect();
    for (id, l) in &net.lanelets {
        if lanelets.contains(id) {
            continue;
        }
        let bb = BoundingBox::around(l.left_vertices.iter().chain(&l.right_vertices));
        if seed_boxes.iter().any(|sb| sb.intersects(&bb)) {
            lanelets.insert(*id);
        }
    }

    // membership sets of the included lanelets keep their targets resolvable
    for id in &lanelets {
        let l = &net.lanelets[id];
        signs.extend(l.traffic_signs.iter().filter(|s| net.traffic_signs.contains_key(s)));
        lights.extend(l.traffic_lights.iter().filter(|t| net.traffic_lights.contains_key(t)));
    }
    intersections.extend(
        net.intersections
            .iter()
            .filter(|(_, i)| {
                i.incomings
                    .iter()
                    .any(|g| g.incoming_lanelets.iter().any(|l| lanelets.contains(l)))
            })
            .map(|(&id, _)| id),
    );

    let mut sub = RoadNetwork::new(&net.benchmark_id);
    sub.lanelets = lanelets
        .iter()
        .map(|id| (*id, net.lanelets[id].clone()))
        .collect();
    sub.traffic_signs = signs
        .iter()
        .map(|id| (*id, net.traffic_signs[id].clone()))
        .collect();
    sub.traffic_lights = lights
        .iter()
        .map(|id| (*id, net.traffic_lights[id].clone()))
        .collect();
    sub.intersections = intersections
        .iter()
        .map(|id| (*id, net.intersections[id].clone()))
        .collect();
    sub.areas = areas.iter().map(|id| (*id, net.areas[id].clone())).collect();

    prune_dangling(&mut sub);
    sub
}

/// Remove references that point at entities not present in the network, so
/// an extracted or restricted copy is self-consistent. The original network
/// is never pruned; dangling references there are exactly what the
/// existence formulas report.
pub fn prune_dangling(net: &mut RoadNetwork) {
    let lanelet_ids: BTreeSet<ElementId> = net.lanelets.keys().copied().collect();
    let sign_ids: BTreeSet<ElementId> = net.traffic_signs.keys().copied().collect();
    let light_ids: BTreeSet<ElementId> = net.traffic_lights.keys().copied().collect();

    for l in net.lanelets.values_mut() {
        l.predecessors.retain(|id| lanelet_ids.contains(id));
        l.successors.retain(|id| lanelet_ids.contains(id));
        if l.adj_left.is_some_and(|a| !lanelet_ids.contains(&a.lanelet)) {
            l.adj_left = None;
        }
        if l.adj_right.is_some_and(|a| !lanelet_ids.contains(&a.lanelet)) {
            l.adj_right = None;
        }
        l.traffic_signs.retain(|id| sign_ids.contains(id));
        l.traffic_lights.retain(|id| light_ids.contains(id));
        if let Some(sl) = &mut l.stop_line {
            sl.traffic_sign_refs.retain(|id| sign_ids.contains(id));
            sl.traffic_light_refs.retain(|id| light_ids.contains(id));
        }
    }
    for i in net.intersections.values_mut() {
        for g in &mut i.incomings {
            g.incoming_lanelets.retain(|id| lanelet_ids.contains(id));
        }
    }
}
