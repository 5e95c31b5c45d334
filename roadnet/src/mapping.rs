// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Binding a road network to the rol logic.
//!
//! A [`Mapping`] is built once per verification call (whole-map or per
//! partition block) from an immutable snapshot of the network. It owns the
//! evaluation [`Context`]: the domain value sets, every predicate and
//! function implementation, and the [`Preprocessing`] pass that computes the
//! geometry-heavy answers up front, since those are hit inside the innermost
//! loop of quantifier evaluation.

use crate::geometry;
use crate::hashmap::HashMap;
use crate::model::{Lanelet, RoadNetwork};
use itertools::Itertools;
use rayon::prelude::*;
use rol::semantics::{Context, ElementId, Value, Vertex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numeric tolerances for the geometric predicates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Two vertices within this distance are considered equal
    pub equality: f64,
    /// Orientation slack for segment-crossing tests
    pub intersection: f64,
    /// Fréchet threshold for polyline similarity, and the margin for
    /// classifying an adjacency as parallel rather than merging/forking
    pub parallelism: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            equality: 0.01,
            intersection: 1e-9,
            parallelism: 0.5,
        }
    }
}

/// How a lanelet relates to a declared lateral neighbor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdjKind {
    /// The lanelets run alongside each other
    Parallel,
    /// The lanelets converge at their ends
    Merging,
    /// The lanelets diverge from a shared start
    Forking,
}

impl AdjKind {
    fn as_str(&self) -> &'static str {
        match self {
            AdjKind::Parallel => "parallel",
            AdjKind::Merging => "merging",
            AdjKind::Forking => "forking",
        }
    }
}

/// Which polyline of a lanelet a value refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Side {
    Left,
    Right,
    Center,
}

/// Identity of a lanelet polyline: owner, side, and whether it is the
/// reversed variant.
type PolyKey = (ElementId, Side, bool);

/// Whether two polylines follow each other within `threshold`. The discrete
/// Fréchet distance is bounded below by both endpoint distances, so the
/// endpoint check is an exact prefilter for the quadratic computation.
fn similar_polylines(p: &[Vertex], q: &[Vertex], threshold: f64) -> bool {
    if p.is_empty() || q.is_empty() {
        return false;
    }
    if p[0].distance(&q[0]) > threshold || p[p.len() - 1].distance(&q[q.len() - 1]) > threshold {
        return false;
    }
    geometry::discrete_frechet(p, q) <= threshold
}

/// The geometry answers computed once at mapping construction and memoized
/// by polyline identity.
struct Preprocessing {
    /// Self-crossing per forward polyline
    self_crossing: HashMap<(ElementId, Side), bool>,
    /// Left-against-right boundary crossing per lanelet
    boundary_crossing: HashMap<ElementId, bool>,
    /// Adjacency classification per declared (lanelet, neighbor) pair
    adj_kind: HashMap<(ElementId, ElementId), AdjKind>,
    /// Similarity per boundary pair implied by a declared adjacency
    similar: HashMap<(PolyKey, PolyKey), bool>,
}

/// The immutable per-run snapshot shared by every predicate and function
/// closure.
struct Prepared {
    network: RoadNetwork,
    tol: Tolerances,
    /// Owner and orientation of every lanelet polyline handed out by the
    /// accessor functions, so results can be memoized by entity id even
    /// though predicates receive polyline values
    polys: HashMap<PolyKey, Arc<Vec<Vertex>>>,
    ptr_index: HashMap<usize, PolyKey>,
    pre: Preprocessing,
    empty_poly: Arc<Vec<Vertex>>,
}

impl Prepared {
    fn new(network: RoadNetwork, tol: Tolerances) -> Self {
        let mut polys: HashMap<PolyKey, Arc<Vec<Vertex>>> = HashMap::default();
        for l in network.lanelets.values() {
            let center = if !l.center_vertices.is_empty() {
                l.center_vertices.clone()
            } else if l.left_vertices.len() == l.right_vertices.len() {
                l.left_vertices
                    .iter()
                    .zip(&l.right_vertices)
                    .map(|(a, b)| Vertex::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0))
                    .collect()
            } else {
                vec![]
            };
            for (side, vertices) in [
                (Side::Left, &l.left_vertices),
                (Side::Right, &l.right_vertices),
                (Side::Center, &center),
            ] {
                let forward = Arc::new(vertices.clone());
                let reversed = Arc::new(vertices.iter().rev().copied().collect::<Vec<_>>());
                polys.insert((l.id, side, false), forward);
                polys.insert((l.id, side, true), reversed);
            }
        }

        let ptr_index = polys
            .iter()
            .map(|(key, arc)| (Arc::as_ptr(arc) as usize, *key))
            .collect();

        let eps = tol.intersection;
        let lanelets: Vec<&Lanelet> = network.lanelets.values().collect();

        let self_crossing: HashMap<(ElementId, Side), bool> = lanelets
            .par_iter()
            .flat_map_iter(|l| {
                [Side::Left, Side::Right, Side::Center].into_iter().map(|side| {
                    let p = &polys[&(l.id, side, false)];
                    ((l.id, side), geometry::polyline_self_intersects(p, eps))
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let boundary_crossing: HashMap<ElementId, bool> = lanelets
            .par_iter()
            .map(|l| {
                (
                    l.id,
                    geometry::polylines_intersect(&l.left_vertices, &l.right_vertices, eps),
                )
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        // the boundary pairs a declared adjacency makes comparable: for a
        // same-direction neighbor the shared boundary, for an
        // opposite-direction neighbor the reversed counterpart
        let adjacency_pairs: Vec<(PolyKey, PolyKey)> = lanelets
            .iter()
            .flat_map(|l| {
                let mut pairs = vec![];
                if let Some(a) = l.adj_left {
                    pairs.push(if a.same_direction {
                        ((l.id, Side::Left, false), (a.lanelet, Side::Right, false))
                    } else {
                        ((l.id, Side::Left, false), (a.lanelet, Side::Left, true))
                    });
                }
                if let Some(a) = l.adj_right {
                    pairs.push(if a.same_direction {
                        ((l.id, Side::Right, false), (a.lanelet, Side::Left, false))
                    } else {
                        ((l.id, Side::Right, false), (a.lanelet, Side::Right, true))
                    });
                }
                pairs
            })
            .collect();

        let similar: HashMap<(PolyKey, PolyKey), bool> = adjacency_pairs
            .par_iter()
            .filter(|(_, (other, _, _))| network.lanelets.contains_key(other))
            .map(|&(k1, k2)| {
                let result = similar_polylines(&polys[&k1], &polys[&k2], tol.parallelism);
                ((k1, k2), result)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let adj_kind: HashMap<(ElementId, ElementId), AdjKind> = adjacency_pairs
            .iter()
            .filter(|(_, (other, _, _))| network.lanelets.contains_key(other))
            .filter_map(|&((own, side, _), k2)| {
                let b1 = &polys[&(own, side, false)];
                let b2 = &polys[&k2];
                if b1.is_empty() || b2.is_empty() {
                    return None;
                }
                let ds = b1[0].distance(&b2[0]);
                let de = b1[b1.len() - 1].distance(&b2[b2.len() - 1]);
                let kind = if (ds - de).abs() <= tol.parallelism {
                    AdjKind::Parallel
                } else if ds < de {
                    AdjKind::Forking
                } else {
                    AdjKind::Merging
                };
                Some(((own, k2.0), kind))
            })
            .collect();

        Self {
            network,
            tol,
            polys,
            ptr_index,
            pre: Preprocessing {
                self_crossing,
                boundary_crossing,
                adj_kind,
                similar,
            },
            empty_poly: Arc::new(vec![]),
        }
    }

    fn lanelet(&self, id: ElementId) -> Option<&Lanelet> {
        self.network.lanelets.get(&id)
    }

    fn poly(&self, id: ElementId, side: Side, reversed: bool) -> Arc<Vec<Vertex>> {
        self.polys
            .get(&(id, side, reversed))
            .unwrap_or(&self.empty_poly)
            .clone()
    }

    fn poly_key(&self, p: &Arc<Vec<Vertex>>) -> Option<PolyKey> {
        self.ptr_index.get(&(Arc::as_ptr(p) as usize)).copied()
    }

    fn self_crossing(&self, p: &Arc<Vec<Vertex>>) -> bool {
        // a polyline crosses itself independently of orientation
        match self.poly_key(p) {
            Some((id, side, _)) => self.pre.self_crossing[&(id, side)],
            None => geometry::polyline_self_intersects(p, self.tol.intersection),
        }
    }

    fn crossing(&self, p: &Arc<Vec<Vertex>>, q: &Arc<Vec<Vertex>>) -> bool {
        match (self.poly_key(p), self.poly_key(q)) {
            (Some((id1, Side::Left, false)), Some((id2, Side::Right, false))) if id1 == id2 => {
                self.pre.boundary_crossing[&id1]
            }
            _ => geometry::polylines_intersect(p, q, self.tol.intersection),
        }
    }

    fn similar(&self, p: &Arc<Vec<Vertex>>, q: &Arc<Vec<Vertex>>) -> bool {
        if let (Some(k1), Some(k2)) = (self.poly_key(p), self.poly_key(q)) {
            if let Some(result) = self.pre.similar.get(&(k1, k2)) {
                return *result;
            }
        }
        similar_polylines(p, q, self.tol.parallelism)
    }

    fn entities(&self, ids: impl IntoIterator<Item = ElementId>) -> Value {
        let mut ids: Vec<ElementId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Value::Entities(Arc::new(ids))
    }
}

fn entity(args: &[Value], i: usize) -> ElementId {
    args[i].as_entity()
}

fn polyline(args: &[Value], i: usize) -> &Arc<Vec<Vertex>> {
    match &args[i] {
        Value::Polyline(p) => p,
        other => panic!("expected a polyline argument, got {other}"),
    }
}

fn vertex(args: &[Value], i: usize) -> Vertex {
    match &args[i] {
        Value::Vertex(v) => *v,
        other => panic!("expected a vertex argument, got {other}"),
    }
}

fn string(args: &[Value], i: usize) -> &str {
    match &args[i] {
        Value::Str(s) => s,
        other => panic!("expected a string argument, got {other}"),
    }
}

/// The point an empty polyline accessor hands out: all comparisons against
/// it fail, which makes the geometric predicates reject degenerate input
/// instead of panicking.
const NOWHERE: Vertex = Vertex {
    x: f64::NAN,
    y: f64::NAN,
};

/// Translates one road network into an evaluation context.
pub struct Mapping {
    context: Context,
}

impl Mapping {
    /// Build the mapping for a network snapshot. All geometry preprocessing
    /// happens here; the resulting context is read-only.
    pub fn new(network: &RoadNetwork, tolerances: &Tolerances) -> Self {
        let p = Arc::new(Prepared::new(network.clone(), *tolerances));
        let mut ctx = Context::new();

        Self::add_domains(&mut ctx, &p.network);
        Self::add_predicates(&mut ctx, &p);
        Self::add_functions(&mut ctx, &p);

        Self { context: ctx }
    }

    /// The evaluation context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The domain names every mapping registers.
    pub fn domain_names() -> &'static [&'static str] {
        &["L", "TS", "TL", "I", "AR", "M"]
    }

    fn add_domains(ctx: &mut Context, net: &RoadNetwork) {
        ctx.add_domain("L", net.lanelets.keys().map(|&id| Value::Entity(id)).collect());
        ctx.add_domain(
            "TS",
            net.traffic_signs.keys().map(|&id| Value::Entity(id)).collect(),
        );
        ctx.add_domain(
            "TL",
            net.traffic_lights.keys().map(|&id| Value::Entity(id)).collect(),
        );
        ctx.add_domain(
            "I",
            net.intersections.keys().map(|&id| Value::Entity(id)).collect(),
        );
        ctx.add_domain("AR", net.areas.keys().map(|&id| Value::Entity(id)).collect());
        ctx.add_domain("M", net.all_ids().into_iter().map(Value::Entity).collect());
    }

    fn add_predicates(ctx: &mut Context, prepared: &Arc<Prepared>) {
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_lanelet", move |args| {
            p.network.lanelets.contains_key(&entity(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_traffic_sign", move |args| {
            p.network.traffic_signs.contains_key(&entity(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_traffic_light", move |args| {
            p.network.traffic_lights.contains_key(&entity(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_intersection", move |args| {
            p.network.intersections.contains_key(&entity(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_area", move |args| {
            p.network.areas.contains_key(&entity(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_unique_id", move |args| {
            p.network.id_multiplicity(entity(args, 0)) <= 1
        });

        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_left_adj", move |args| {
            p.lanelet(entity(args, 0)).is_some_and(|l| l.adj_left.is_some())
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_right_adj", move |args| {
            p.lanelet(entity(args, 0)).is_some_and(|l| l.adj_right.is_some())
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_left_adj", move |args| {
            p.lanelet(entity(args, 0))
                .and_then(|l| l.adj_left)
                .is_some_and(|a| a.lanelet == entity(args, 1))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_right_adj", move |args| {
            p.lanelet(entity(args, 0))
                .and_then(|l| l.adj_right)
                .is_some_and(|a| a.lanelet == entity(args, 1))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_adj_same_dir", move |args| {
            let other = entity(args, 1);
            p.lanelet(entity(args, 0)).is_some_and(|l| {
                [l.adj_left, l.adj_right]
                    .into_iter()
                    .flatten()
                    .any(|a| a.lanelet == other && a.same_direction)
            })
        });

        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_predecessor", move |args| {
            p.lanelet(entity(args, 0)).is_some_and(|l| !l.predecessors.is_empty())
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_successor", move |args| {
            p.lanelet(entity(args, 0)).is_some_and(|l| !l.successors.is_empty())
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_predecessor", move |args| {
            p.lanelet(entity(args, 0))
                .is_some_and(|l| l.predecessors.contains(&entity(args, 1)))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_successor", move |args| {
            p.lanelet(entity(args, 0))
                .is_some_and(|l| l.successors.contains(&entity(args, 1)))
        });

        let p = Arc::clone(prepared);
        ctx.add_predicate("Are_equal_vertices", move |args| {
            vertex(args, 0).distance(&vertex(args, 1)) <= p.tol.equality
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_polylines_intersection", move |args| {
            p.crossing(polyline(args, 0), polyline(args, 1))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_polyline_self_intersection", move |args| {
            p.self_crossing(polyline(args, 0))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Are_similar_polylines", move |args| {
            p.similar(polyline(args, 0), polyline(args, 1))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_adj_type", move |args| {
            p.pre
                .adj_kind
                .get(&(entity(args, 0), entity(args, 1)))
                .is_some_and(|kind| kind.as_str() == string(args, 2))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_correct_left_right_boundary_assignment", move |args| {
            p.lanelet(entity(args, 0)).map_or(true, correct_boundary_assignment)
        });

        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_stop_line", move |args| {
            p.lanelet(entity(args, 0)).is_some_and(|l| l.stop_line.is_some())
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_stop_line_inside", move |args| {
            p.lanelet(entity(args, 0)).map_or(true, |l| {
                let Some(sl) = &l.stop_line else { return true };
                let bb = geometry::BoundingBox::around(
                    l.left_vertices.iter().chain(&l.right_vertices),
                )
                .inflate(p.tol.equality);
                bb.contains(&sl.start) && bb.contains(&sl.end)
            })
        });

        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_traffic_sign", move |args| {
            p.lanelet(entity(args, 0))
                .is_some_and(|l| l.traffic_signs.contains(&entity(args, 1)))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_traffic_light", move |args| {
            p.lanelet(entity(args, 0))
                .is_some_and(|l| l.traffic_lights.contains(&entity(args, 1)))
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Has_position", move |args| {
            let id = entity(args, 0);
            p.network
                .traffic_signs
                .get(&id)
                .map(|s| s.position.is_some())
                .or_else(|| p.network.traffic_lights.get(&id).map(|l| l.position.is_some()))
                .unwrap_or(false)
        });
        let p = Arc::clone(prepared);
        ctx.add_predicate("Is_incoming_lanelet", move |args| {
            let lanelet = entity(args, 1);
            p.network
                .intersections
                .get(&entity(args, 0))
                .is_some_and(|i| {
                    i.incomings
                        .iter()
                        .any(|g| g.incoming_lanelets.contains(&lanelet))
                })
        });
    }

    fn add_functions(ctx: &mut Context, prepared: &Arc<Prepared>) {
        let p = Arc::clone(prepared);
        ctx.add_function("left_polyline", move |args| {
            Value::Polyline(p.poly(entity(args, 0), Side::Left, false))
        });
        let p = Arc::clone(prepared);
        ctx.add_function("right_polyline", move |args| {
            Value::Polyline(p.poly(entity(args, 0), Side::Right, false))
        });
        let p = Arc::clone(prepared);
        ctx.add_function("center_polyline", move |args| {
            Value::Polyline(p.poly(entity(args, 0), Side::Center, false))
        });
        let p = Arc::clone(prepared);
        ctx.add_function("reverse", move |args| {
            let poly = polyline(args, 0);
            match p.poly_key(poly) {
                Some((id, side, reversed)) => Value::Polyline(p.poly(id, side, !reversed)),
                None => Value::Polyline(Arc::new(poly.iter().rev().copied().collect())),
            }
        });
        ctx.add_function("start_vertex", |args| {
            Value::Vertex(polyline(args, 0).first().copied().unwrap_or(NOWHERE))
        });
        ctx.add_function("end_vertex", |args| {
            Value::Vertex(polyline(args, 0).last().copied().unwrap_or(NOWHERE))
        });
        ctx.add_function("size", |args| Value::Int(polyline(args, 0).len() as i64));

        let p = Arc::clone(prepared);
        ctx.add_function("left_adj", move |args| {
            Value::Entity(
                p.lanelet(entity(args, 0))
                    .and_then(|l| l.adj_left)
                    .map_or(0, |a| a.lanelet),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("right_adj", move |args| {
            Value::Entity(
                p.lanelet(entity(args, 0))
                    .and_then(|l| l.adj_right)
                    .map_or(0, |a| a.lanelet),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("predecessors", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .map(|l| l.predecessors.clone())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("successors", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .map(|l| l.successors.clone())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("ref_traffic_signs", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .map(|l| l.traffic_signs.iter().copied().collect_vec())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("ref_traffic_lights", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .map(|l| l.traffic_lights.iter().copied().collect_vec())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("stop_line_traffic_signs", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .and_then(|l| l.stop_line.as_ref())
                    .map(|sl| sl.traffic_sign_refs.iter().copied().collect_vec())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("stop_line_traffic_lights", move |args| {
            p.entities(
                p.lanelet(entity(args, 0))
                    .and_then(|l| l.stop_line.as_ref())
                    .map(|sl| sl.traffic_light_refs.iter().copied().collect_vec())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("sign_elements_count", move |args| {
            Value::Int(
                p.network
                    .traffic_signs
                    .get(&entity(args, 0))
                    .map_or(0, |s| s.elements.len() as i64),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("incoming_elements", move |args| {
            p.entities(
                p.network
                    .intersections
                    .get(&entity(args, 0))
                    .map(|i| i.incomings.iter().map(|g| g.id).collect_vec())
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("incoming_lanelets", move |args| {
            p.entities(
                p.network
                    .intersections
                    .get(&entity(args, 0))
                    .map(|i| {
                        i.incomings
                            .iter()
                            .flat_map(|g| g.incoming_lanelets.iter().copied())
                            .collect_vec()
                    })
                    .unwrap_or_default(),
            )
        });
        let p = Arc::clone(prepared);
        ctx.add_function("area_boundary", move |args| {
            Value::Polyline(Arc::new(
                p.network
                    .areas
                    .get(&entity(args, 0))
                    .map(|a| a.boundary.clone())
                    .unwrap_or_default(),
            ))
        });
        let p = Arc::clone(prepared);
        ctx.add_function("distance_to", move |args| {
            let c1 = p.poly(entity(args, 0), Side::Center, false);
            let c2 = p.poly(entity(args, 1), Side::Center, false);
            Value::Float(geometry::polyline_distance(&c1, &c2))
        });
    }
}

/// Whether the boundary labeled left actually lies to the left of the
/// driving direction. Degenerate boundaries are not judged. Exposed because
/// the boundary-swap repair uses the same test as the predicate.
pub fn correct_boundary_assignment(l: &Lanelet) -> bool {
    if l.left_vertices.len() < 2 || l.right_vertices.len() < 2 {
        return true;
    }
    let a = l.right_vertices[0];
    let b = l.right_vertices[l.right_vertices.len() - 1];
    if a.distance(&b) == 0.0 {
        return true;
    }
    let probe = l.left_vertices[l.left_vertices.len() / 2];
    (b.x - a.x) * (probe.y - a.y) - (b.y - a.y) * (probe.x - a.x) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use rol::parser;
    use rol::semantics::Assignment;

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    /// Two side-by-side lanelets: lanelet 2 lies to the left of lanelet 1
    /// and both run in +x direction.
    fn two_lane_network() -> RoadNetwork {
        let mut net = RoadNetwork::new("two_lanes");
        let mut l1 = Lanelet::new(
            1,
            vec![v(0.0, 1.0), v(10.0, 1.0)],
            vec![v(0.0, 0.0), v(10.0, 0.0)],
        );
        l1.adj_left = Some(Adjacency {
            lanelet: 2,
            same_direction: true,
        });
        let mut l2 = Lanelet::new(
            2,
            vec![v(0.0, 2.0), v(10.0, 2.0)],
            vec![v(0.0, 1.0), v(10.0, 1.0)],
        );
        l2.adj_right = Some(Adjacency {
            lanelet: 1,
            same_direction: true,
        });
        net.add_lanelet(l1);
        net.add_lanelet(l2);
        net
    }

    fn eval(net: &RoadNetwork, formula: &str) -> bool {
        let mapping = Mapping::new(net, &Tolerances::default());
        mapping
            .context()
            .eval_bool(&parser::parse_expr(formula), &Assignment::new())
    }

    #[test]
    fn test_domains() {
        let net = two_lane_network();
        let mapping = Mapping::new(&net, &Tolerances::default());
        assert_eq!(
            mapping.context().domain("L"),
            Some(&vec![Value::Entity(1), Value::Entity(2)])
        );
        assert_eq!(mapping.context().domain("TS"), Some(&vec![]));
        for name in Mapping::domain_names() {
            assert!(mapping.context().domain(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_adjacency_predicates() {
        let net = two_lane_network();
        assert!(eval(&net, "A l1 in L. Has_left_adj(l1) -> Is_lanelet(left_adj(l1))"));

        let mapping = Mapping::new(&net, &Tolerances::default());
        let ctx = mapping.context();
        let mut a = Assignment::new();
        a.insert("l1".to_string(), Value::Entity(1));
        a.insert("l2".to_string(), Value::Entity(2));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_left_adj(l1, l2)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_adj_same_dir(l1, l2)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_right_adj(l2, l1)"), &a));
        assert!(!ctx.eval_bool(&parser::parse_expr("Is_left_adj(l2, l1)"), &a));
    }

    #[test]
    fn test_shared_boundary_is_similar() {
        let net = two_lane_network();
        // lanelet 1's left boundary coincides with lanelet 2's right boundary
        assert!(eval(
            &net,
            "A l1, l2 in L. Is_left_adj(l1, l2) & Is_adj_same_dir(l1, l2) \
             -> Are_similar_polylines(left_polyline(l1), right_polyline(l2))"
        ));
    }

    #[test]
    fn test_adj_type_parallel() {
        let net = two_lane_network();
        let mapping = Mapping::new(&net, &Tolerances::default());
        let ctx = mapping.context();
        let mut a = Assignment::new();
        a.insert("l1".to_string(), Value::Entity(1));
        a.insert("l2".to_string(), Value::Entity(2));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_adj_type(l1, l2, 'parallel')"), &a));
        assert!(!ctx.eval_bool(&parser::parse_expr("Is_adj_type(l1, l2, 'merging')"), &a));
    }

    #[test]
    fn test_boundary_assignment() {
        let mut net = two_lane_network();
        assert!(eval(&net, "A l in L. Is_correct_left_right_boundary_assignment(l)"));

        // swap the boundaries of lanelet 1
        let l1 = net.lanelets.get_mut(&1).unwrap();
        std::mem::swap(&mut l1.left_vertices, &mut l1.right_vertices);
        assert!(!eval(&net, "A l in L. Is_correct_left_right_boundary_assignment(l)"));
    }

    #[test]
    fn test_reverse_round_trips() {
        let net = two_lane_network();
        let mapping = Mapping::new(&net, &Tolerances::default());
        let ctx = mapping.context();
        let mut a = Assignment::new();
        a.insert("l".to_string(), Value::Entity(1));
        assert!(ctx.eval_bool(
            &parser::parse_expr(
                "Are_equal_vertices(start_vertex(reverse(left_polyline(l))), \
                 end_vertex(left_polyline(l)))"
            ),
            &a
        ));
    }

    #[test]
    fn test_auxiliary_predicates_and_functions() {
        let mut net = two_lane_network();
        net.lanelets.get_mut(&1).unwrap().successors = vec![2];
        net.lanelets.get_mut(&2).unwrap().predecessors = vec![1];
        net.add_intersection(Intersection {
            id: 5,
            incomings: vec![IncomingGroup {
                id: 6,
                incoming_lanelets: [1].into_iter().collect(),
            }],
        });
        net.add_area(Area {
            id: 9,
            boundary: vec![v(20.0, 0.0), v(21.0, 0.0), v(21.0, 1.0)],
        });

        let mapping = Mapping::new(&net, &Tolerances::default());
        let ctx = mapping.context();
        let mut a = Assignment::new();
        a.insert("l1".to_string(), Value::Entity(1));
        a.insert("l2".to_string(), Value::Entity(2));
        a.insert("i".to_string(), Value::Entity(5));
        a.insert("ar".to_string(), Value::Entity(9));

        assert!(ctx.eval_bool(&parser::parse_expr("Is_area(ar)"), &a));
        assert!(!ctx.eval_bool(&parser::parse_expr("Is_area(l1)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("size(area_boundary(ar)) >= 3"), &a));

        assert!(ctx.eval_bool(&parser::parse_expr("Has_successor(l1)"), &a));
        assert!(!ctx.eval_bool(&parser::parse_expr("Has_predecessor(l1)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("Has_predecessor(l2)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_successor(l1, l2)"), &a));
        assert!(ctx.eval_bool(&parser::parse_expr("Is_incoming_lanelet(i, l1)"), &a));
        assert!(!ctx.eval_bool(&parser::parse_expr("Is_incoming_lanelet(i, l2)"), &a));
        // the center lines run a lane apart
        assert!(ctx.eval_bool(
            &parser::parse_expr("distance_to(l1, l1) <= 0.0 & distance_to(l1, l2) <= 1.0"),
            &a
        ));
        assert!(ctx.eval_bool(&parser::parse_expr("distance_to(l1, l2) > 0.5"), &a));
    }

    #[test]
    fn test_dynamic_successor_domain() {
        let mut net = two_lane_network();
        net.lanelets.get_mut(&1).unwrap().successors = vec![2];
        assert!(eval(&net, "A l in L. A s in successors(l). Is_lanelet(s)"));

        net.lanelets.get_mut(&1).unwrap().successors = vec![99];
        assert!(!eval(&net, "A l in L. A s in successors(l). Is_lanelet(s)"));
    }
}
