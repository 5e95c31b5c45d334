// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The built-in formula catalogue.
//!
//! Formulas are grouped by the element type their free variables range over.
//! The string ids are stable: callers select formulas by them and reports
//! reference them, so they must never change. Shared subformulas are written
//! as macros and textually inlined before parsing.

use crate::error::CatalogueError;
use lazy_static::lazy_static;
use rol::parser;
use rol::syntax::Formula;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The element type a formula's free variables range over, which decides the
/// partitioning strategy used when verifying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    /// Formulas over the union domain `M`
    General,
    /// Formulas over lanelets
    Lanelet,
    /// Formulas over traffic signs
    TrafficSign,
    /// Formulas over traffic lights
    TrafficLight,
    /// Formulas over intersections
    Intersection,
    /// Formulas over areas
    Area,
}

/// The closed set of built-in formulas. Each variant corresponds to exactly
/// one catalogue entry; the `as_str` names are the external contract.
#[allow(missing_docs)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FormulaId {
    // general
    UniqueId,
    // lanelet sanity
    LeftRightBoundaryAssignment,
    PolylineSelfIntersection,
    BoundariesIntersection,
    VerticesMoreThanOne,
    NoSelfPredecessor,
    NoSelfSuccessor,
    NoSelfLeftAdj,
    NoSelfRightAdj,
    // lanelet reference existence
    ExistenceLeftAdj,
    ExistenceRightAdj,
    ExistencePredecessor,
    ExistenceSuccessor,
    ExistenceTrafficSign,
    ExistenceTrafficLight,
    ExistenceStopLineTrafficSign,
    ExistenceStopLineTrafficLight,
    StopLineReferencesTrafficSign,
    StopLineReferencesTrafficLight,
    // lanelet potential references
    PotentialLeftSameDirParallelAdj,
    PotentialLeftOppositeDirParallelAdj,
    PotentialRightSameDirParallelAdj,
    PotentialRightOppositeDirParallelAdj,
    PotentialPredecessor,
    PotentialSuccessor,
    // lanelet geometric consistency
    ConnectionsPredecessor,
    ConnectionsSuccessor,
    PolylinesLeftSameDirParallelAdj,
    PolylinesLeftOppositeDirParallelAdj,
    PolylinesRightSameDirParallelAdj,
    PolylinesRightOppositeDirParallelAdj,
    LeftMergingAdj,
    LeftForkingAdj,
    RightMergingAdj,
    RightForkingAdj,
    StopLineBetweenBoundaries,
    // traffic signs
    AtLeastOneSignElement,
    SignPositionExists,
    ReferencedTrafficSign,
    // traffic lights
    LightPositionExists,
    ReferencedTrafficLight,
    // intersections
    AtLeastOneIncoming,
    ExistenceIncomingLanelets,
    // areas
    AreaMinVertices,
}

use FormulaId::*;

impl FormulaId {
    /// Every formula, in catalogue order.
    pub const ALL: &'static [FormulaId] = &[
        UniqueId,
        LeftRightBoundaryAssignment,
        PolylineSelfIntersection,
        BoundariesIntersection,
        VerticesMoreThanOne,
        NoSelfPredecessor,
        NoSelfSuccessor,
        NoSelfLeftAdj,
        NoSelfRightAdj,
        ExistenceLeftAdj,
        ExistenceRightAdj,
        ExistencePredecessor,
        ExistenceSuccessor,
        ExistenceTrafficSign,
        ExistenceTrafficLight,
        ExistenceStopLineTrafficSign,
        ExistenceStopLineTrafficLight,
        StopLineReferencesTrafficSign,
        StopLineReferencesTrafficLight,
        PotentialLeftSameDirParallelAdj,
        PotentialLeftOppositeDirParallelAdj,
        PotentialRightSameDirParallelAdj,
        PotentialRightOppositeDirParallelAdj,
        PotentialPredecessor,
        PotentialSuccessor,
        ConnectionsPredecessor,
        ConnectionsSuccessor,
        PolylinesLeftSameDirParallelAdj,
        PolylinesLeftOppositeDirParallelAdj,
        PolylinesRightSameDirParallelAdj,
        PolylinesRightOppositeDirParallelAdj,
        LeftMergingAdj,
        LeftForkingAdj,
        RightMergingAdj,
        RightForkingAdj,
        StopLineBetweenBoundaries,
        AtLeastOneSignElement,
        SignPositionExists,
        ReferencedTrafficSign,
        LightPositionExists,
        ReferencedTrafficLight,
        AtLeastOneIncoming,
        ExistenceIncomingLanelets,
        AreaMinVertices,
    ];

    /// The stable string id of this formula.
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueId => "unique_id",
            LeftRightBoundaryAssignment => "left_right_boundary_assignment",
            PolylineSelfIntersection => "polyline_self_intersection",
            BoundariesIntersection => "boundaries_intersection",
            VerticesMoreThanOne => "vertices_more_than_one",
            NoSelfPredecessor => "no_self_predecessor",
            NoSelfSuccessor => "no_self_successor",
            NoSelfLeftAdj => "no_self_left_adj",
            NoSelfRightAdj => "no_self_right_adj",
            ExistenceLeftAdj => "existence_left_adj",
            ExistenceRightAdj => "existence_right_adj",
            ExistencePredecessor => "existence_predecessor",
            ExistenceSuccessor => "existence_successor",
            ExistenceTrafficSign => "existence_traffic_sign",
            ExistenceTrafficLight => "existence_traffic_light",
            ExistenceStopLineTrafficSign => "existence_stop_line_traffic_sign",
            ExistenceStopLineTrafficLight => "existence_stop_line_traffic_light",
            StopLineReferencesTrafficSign => "stop_line_references_traffic_sign",
            StopLineReferencesTrafficLight => "stop_line_references_traffic_light",
            PotentialLeftSameDirParallelAdj => "potential_left_same_dir_parallel_adj",
            PotentialLeftOppositeDirParallelAdj => "potential_left_opposite_dir_parallel_adj",
            PotentialRightSameDirParallelAdj => "potential_right_same_dir_parallel_adj",
            PotentialRightOppositeDirParallelAdj => "potential_right_opposite_dir_parallel_adj",
            PotentialPredecessor => "potential_predecessor",
            PotentialSuccessor => "potential_successor",
            ConnectionsPredecessor => "connections_predecessor",
            ConnectionsSuccessor => "connections_successor",
            PolylinesLeftSameDirParallelAdj => "polylines_left_same_dir_parallel_adj",
            PolylinesLeftOppositeDirParallelAdj => "polylines_left_opposite_dir_parallel_adj",
            PolylinesRightSameDirParallelAdj => "polylines_right_same_dir_parallel_adj",
            PolylinesRightOppositeDirParallelAdj => "polylines_right_opposite_dir_parallel_adj",
            LeftMergingAdj => "left_merging_adj",
            LeftForkingAdj => "left_forking_adj",
            RightMergingAdj => "right_merging_adj",
            RightForkingAdj => "right_forking_adj",
            StopLineBetweenBoundaries => "stop_line_between_boundaries",
            AtLeastOneSignElement => "at_least_one_sign_element",
            SignPositionExists => "sign_position_exists",
            ReferencedTrafficSign => "referenced_traffic_sign",
            LightPositionExists => "light_position_exists",
            ReferencedTrafficLight => "referenced_traffic_light",
            AtLeastOneIncoming => "at_least_one_incoming",
            ExistenceIncomingLanelets => "existence_incoming_lanelets",
            AreaMinVertices => "area_min_vertices",
        }
    }

    /// Look a formula up by its string id.
    pub fn from_str(s: &str) -> Option<FormulaId> {
        Self::ALL.iter().copied().find(|id| id.as_str() == s)
    }

    /// The element type this formula ranges over.
    pub fn element_type(&self) -> ElementType {
        match self {
            UniqueId => ElementType::General,
            AtLeastOneSignElement | SignPositionExists | ReferencedTrafficSign => {
                ElementType::TrafficSign
            }
            LightPositionExists | ReferencedTrafficLight => ElementType::TrafficLight,
            AtLeastOneIncoming | ExistenceIncomingLanelets => ElementType::Intersection,
            AreaMinVertices => ElementType::Area,
            _ => ElementType::Lanelet,
        }
    }

    /// The formula text, before macro expansion.
    fn text(&self) -> &'static str {
        match self {
            UniqueId => "Is_unique_id(m) || m in M",
            LeftRightBoundaryAssignment => {
                "Is_correct_left_right_boundary_assignment(l) || l in L"
            }
            PolylineSelfIntersection => {
                "!Is_polyline_self_intersection(left_polyline(l)) \
                 & !Is_polyline_self_intersection(right_polyline(l)) || l in L"
            }
            BoundariesIntersection => {
                "!Is_polylines_intersection(left_polyline(l), right_polyline(l)) || l in L"
            }
            VerticesMoreThanOne => {
                "size(left_polyline(l)) >= 2 & size(right_polyline(l)) >= 2 || l in L"
            }
            NoSelfPredecessor => "!Is_predecessor(l, l) || l in L",
            NoSelfSuccessor => "!Is_successor(l, l) || l in L",
            NoSelfLeftAdj => "Has_left_adj(l) -> !(left_adj(l) = l) || l in L",
            NoSelfRightAdj => "Has_right_adj(l) -> !(right_adj(l) = l) || l in L",
            ExistenceLeftAdj => "Has_left_adj(l) -> Is_lanelet(left_adj(l)) || l in L",
            ExistenceRightAdj => "Has_right_adj(l) -> Is_lanelet(right_adj(l)) || l in L",
            ExistencePredecessor => "A p in predecessors(l). Is_lanelet(p) || l in L",
            ExistenceSuccessor => "A s in successors(l). Is_lanelet(s) || l in L",
            ExistenceTrafficSign => "A ts in ref_traffic_signs(l). Is_traffic_sign(ts) || l in L",
            ExistenceTrafficLight => {
                "A tl in ref_traffic_lights(l). Is_traffic_light(tl) || l in L"
            }
            ExistenceStopLineTrafficSign => {
                "A ts in stop_line_traffic_signs(l). Is_traffic_sign(ts) || l in L"
            }
            ExistenceStopLineTrafficLight => {
                "A tl in stop_line_traffic_lights(l). Is_traffic_light(tl) || l in L"
            }
            StopLineReferencesTrafficSign => {
                "A ts in stop_line_traffic_signs(l). \
                 Is_traffic_sign(ts) -> Has_traffic_sign(l, ts) || l in L"
            }
            StopLineReferencesTrafficLight => {
                "A tl in stop_line_traffic_lights(l). \
                 Is_traffic_light(tl) -> Has_traffic_light(l, tl) || l in L"
            }
            PotentialLeftSameDirParallelAdj => {
                "!(l1 = l2) & !Has_left_adj(l1) -> \
                 !Are_similar_polylines(left_polyline(l1), right_polyline(l2)) \
                 || l1 in L, l2 in L"
            }
            PotentialLeftOppositeDirParallelAdj => {
                "!(l1 = l2) & !Has_left_adj(l1) -> \
                 !Are_similar_polylines(left_polyline(l1), reverse(left_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            PotentialRightSameDirParallelAdj => {
                "!(l1 = l2) & !Has_right_adj(l1) -> \
                 !Are_similar_polylines(right_polyline(l1), left_polyline(l2)) \
                 || l1 in L, l2 in L"
            }
            PotentialRightOppositeDirParallelAdj => {
                "!(l1 = l2) & !Has_right_adj(l1) -> \
                 !Are_similar_polylines(right_polyline(l1), reverse(right_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            PotentialPredecessor => {
                "!(l1 = l2) & !Is_predecessor(l1, l2) -> \
                 !are_predecessor_connections(l1, l2) || l1 in L, l2 in L"
            }
            PotentialSuccessor => {
                "!(l1 = l2) & !Is_successor(l1, l2) -> \
                 !are_successor_connections(l1, l2) || l1 in L, l2 in L"
            }
            ConnectionsPredecessor => {
                "Is_predecessor(l1, l2) -> are_predecessor_connections(l1, l2) \
                 || l1 in L, l2 in L"
            }
            ConnectionsSuccessor => {
                "Is_successor(l1, l2) -> are_successor_connections(l1, l2) \
                 || l1 in L, l2 in L"
            }
            PolylinesLeftSameDirParallelAdj => {
                "Is_left_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'parallel') \
                 -> Are_similar_polylines(left_polyline(l1), right_polyline(l2)) \
                 || l1 in L, l2 in L"
            }
            PolylinesLeftOppositeDirParallelAdj => {
                "Is_left_adj(l1, l2) & !Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'parallel') \
                 -> Are_similar_polylines(left_polyline(l1), reverse(left_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            PolylinesRightSameDirParallelAdj => {
                "Is_right_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'parallel') \
                 -> Are_similar_polylines(right_polyline(l1), left_polyline(l2)) \
                 || l1 in L, l2 in L"
            }
            PolylinesRightOppositeDirParallelAdj => {
                "Is_right_adj(l1, l2) & !Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'parallel') \
                 -> Are_similar_polylines(right_polyline(l1), reverse(right_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            LeftMergingAdj => {
                "Is_left_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'merging') \
                 -> Are_equal_vertices(end_vertex(left_polyline(l1)), end_vertex(right_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            LeftForkingAdj => {
                "Is_left_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'forking') \
                 -> Are_equal_vertices(start_vertex(left_polyline(l1)), start_vertex(right_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            RightMergingAdj => {
                "Is_right_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'merging') \
                 -> Are_equal_vertices(end_vertex(right_polyline(l1)), end_vertex(left_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            RightForkingAdj => {
                "Is_right_adj(l1, l2) & Is_adj_same_dir(l1, l2) & Is_adj_type(l1, l2, 'forking') \
                 -> Are_equal_vertices(start_vertex(right_polyline(l1)), start_vertex(left_polyline(l2))) \
                 || l1 in L, l2 in L"
            }
            StopLineBetweenBoundaries => "Has_stop_line(l) -> Is_stop_line_inside(l) || l in L",
            AtLeastOneSignElement => "sign_elements_count(ts) >= 1 || ts in TS",
            SignPositionExists => "Has_position(ts) || ts in TS",
            ReferencedTrafficSign => "E l in L. Has_traffic_sign(l, ts) || ts in TS",
            LightPositionExists => "Has_position(tl) || tl in TL",
            ReferencedTrafficLight => "E l in L. Has_traffic_light(l, tl) || tl in TL",
            AtLeastOneIncoming => "C>=1 inc in incoming_elements(i). true || i in I",
            ExistenceIncomingLanelets => "A l in incoming_lanelets(i). Is_lanelet(l) || i in I",
            AreaMinVertices => "size(area_boundary(a)) >= 3 || a in AR",
        }
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named subformulas shared between catalogue entries, inlined textually
/// before parsing: `(name, parameters, body)`.
const MACROS: &[(&str, &[&str], &str)] = &[
    (
        "are_predecessor_connections",
        &["x", "y"],
        "(Are_equal_vertices(start_vertex(left_polyline(x)), end_vertex(left_polyline(y))) \
         & Are_equal_vertices(start_vertex(right_polyline(x)), end_vertex(right_polyline(y))))",
    ),
    (
        "are_successor_connections",
        &["x", "y"],
        "(Are_equal_vertices(end_vertex(left_polyline(x)), start_vertex(left_polyline(y))) \
         & Are_equal_vertices(end_vertex(right_polyline(x)), start_vertex(right_polyline(y))))",
    ),
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace whole-word occurrences of `from` with `to`.
fn replace_word(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let preceded = i > 0 && is_ident_char(bytes[i - 1] as char);
        if !preceded && rest.starts_with(from) {
            let after = rest[from.len()..].chars().next();
            if !after.map_or(false, is_ident_char) {
                out.push_str(to);
                i += from.len();
                continue;
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Split a macro argument list on top-level commas.
fn split_args(s: &str) -> Vec<String> {
    let mut args = vec![];
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// Inline one occurrence of a macro call, if any. Returns None when the text
/// contains no call of this macro.
fn expand_one(text: &str, name: &str, params: &[&str], body: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(name) {
        let start = search_from + pos;
        let preceded = start > 0 && is_ident_char(text.as_bytes()[start - 1] as char);
        let after = start + name.len();
        if preceded || !text[after..].starts_with('(') {
            search_from = after;
            continue;
        }
        // find the matching closing parenthesis
        let mut depth = 0usize;
        let mut end = None;
        for (off, c) in text[after..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(after + off);
                        break;
                    }
                }
                _ => (),
            }
        }
        let end = end?;
        let args = split_args(&text[after + 1..end]);
        assert_eq!(
            args.len(),
            params.len(),
            "macro {name} expects {} arguments",
            params.len()
        );
        let mut expansion = body.to_string();
        for (param, arg) in params.iter().zip(&args) {
            expansion = replace_word(&expansion, param, arg);
        }
        return Some(format!("{}{expansion}{}", &text[..start], &text[end + 1..]));
    }
    None
}

/// Inline every macro call in a formula text.
pub fn expand_macros(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let mut changed = false;
        for (name, params, body) in MACROS {
            while let Some(next) = expand_one(&out, name, params, body) {
                out = next;
                changed = true;
            }
        }
        if !changed {
            return out;
        }
    }
}

/// The parsed catalogue: every built-in formula, keyed by id. Built once at
/// process start and never mutated.
pub struct Catalogue {
    formulas: BTreeMap<FormulaId, Formula>,
}

impl Catalogue {
    /// Parse every built-in formula. A malformed formula is a build-time
    /// defect and fails catalogue construction.
    pub fn new() -> Result<Self, CatalogueError> {
        let mut formulas = BTreeMap::new();
        for &id in FormulaId::ALL {
            let text = expand_macros(id.text());
            let formula =
                parser::parse(id.as_str(), &text).map_err(|e| CatalogueError {
                    id: id.as_str(),
                    detail: e.to_string(),
                })?;
            formulas.insert(id, formula);
        }
        Ok(Self { formulas })
    }

    /// The parsed formula for an id.
    pub fn formula(&self, id: FormulaId) -> &Formula {
        &self.formulas[&id]
    }

    /// Every formula with its id, in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = (FormulaId, &Formula)> {
        self.formulas.iter().map(|(&id, f)| (id, f))
    }

    /// The domain names formulas may reference; the concrete values come
    /// from the mapping layer per network.
    pub fn domain_names(&self) -> &'static [&'static str] {
        roadnet::mapping::Mapping::domain_names()
    }
}

lazy_static! {
    /// The catalogue, parsed once per process. The built-in texts are a
    /// fixed build-time artifact, so failing to parse is a programming
    /// error and panics here.
    pub static ref CATALOGUE: Catalogue =
        Catalogue::new().expect("built-in formula catalogue must parse");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_formulas_parse() {
        let catalogue = Catalogue::new().expect("catalogue should build");
        assert_eq!(catalogue.iter().count(), FormulaId::ALL.len());
        for (id, formula) in catalogue.iter() {
            assert_eq!(formula.name, id.as_str());
            assert!(
                !formula.free.is_empty(),
                "{id} has no free variables to report locations with"
            );
        }
        // every fixed domain a formula mentions is one the mapping registers
        let known = catalogue.domain_names();
        for (id, formula) in catalogue.iter() {
            for binder in &formula.free {
                if let rol::syntax::Domain::Fixed(name) = &binder.domain {
                    assert!(known.contains(&name.as_str()), "{id} uses unknown domain {name}");
                }
            }
        }
    }

    #[test]
    fn test_string_ids_are_unique_and_stable() {
        let mut seen = std::collections::BTreeSet::new();
        for id in FormulaId::ALL {
            assert!(seen.insert(id.as_str()), "duplicate id {id}");
            assert_eq!(FormulaId::from_str(id.as_str()), Some(*id));
        }
        // spot-check the externally referenced names
        assert_eq!(ExistenceLeftAdj.as_str(), "existence_left_adj");
        assert_eq!(
            PolylinesLeftSameDirParallelAdj.as_str(),
            "polylines_left_same_dir_parallel_adj"
        );
    }

    #[test]
    fn test_macro_expansion() {
        let expanded = expand_macros("!are_predecessor_connections(l1, l2)");
        assert!(expanded.contains("start_vertex(left_polyline(l1))"));
        assert!(expanded.contains("end_vertex(right_polyline(l2))"));
        assert!(!expanded.contains("are_predecessor_connections"));

        // nested arguments survive
        let expanded = expand_macros("are_successor_connections(f(a, b), c)");
        assert!(expanded.contains("left_polyline(f(a, b))"));

        // untouched text comes back unchanged
        assert_eq!(expand_macros("Even(x)"), "Even(x)");
    }

    #[test]
    fn test_catalogue_roundtrip() {
        // printing and reparsing preserves evaluation-relevant structure
        let catalogue = Catalogue::new().unwrap();
        for (id, formula) in catalogue.iter() {
            let printed = rol::printer::formula(formula);
            let reparsed = rol::parser::parse(id.as_str(), &printed)
                .unwrap_or_else(|e| panic!("{id} failed to reparse: {e}"));
            assert_eq!(formula, &reparsed, "{id} changed under print/reparse");
        }
    }
}
