// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Priority-ordered formula batches.
//!
//! The group table encodes dependency order: identity and boundary sanity
//! first, then shape sanity, then reference existence, and only then the
//! expensive geometric-consistency formulas that presuppose a valid
//! reference. A handler drains the table exactly once per run.

use crate::catalogue::FormulaId::{self, *};
use std::collections::BTreeMap;

/// The fixed group table: `(priority, members)`, lower priority first.
pub const GROUPS: &[(u32, &[FormulaId])] = &[
    // global uniqueness and boundary-assignment sanity
    (0, &[UniqueId, LeftRightBoundaryAssignment]),
    // self/mutual polyline-intersection sanity
    (1, &[PolylineSelfIntersection, BoundariesIntersection]),
    // minimal-shape existence
    (
        2,
        &[
            VerticesMoreThanOne,
            NoSelfPredecessor,
            NoSelfSuccessor,
            NoSelfLeftAdj,
            NoSelfRightAdj,
            AtLeastOneSignElement,
            SignPositionExists,
            LightPositionExists,
            AtLeastOneIncoming,
            AreaMinVertices,
        ],
    ),
    // reference existence and geometrically implied "potential" references
    (
        15,
        &[
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
            ReferencedTrafficSign,
            ReferencedTrafficLight,
            ExistenceIncomingLanelets,
        ],
    ),
    // geometric consistency, assuming the reference itself is valid
    (
        20,
        &[
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
        ],
    ),
];

/// Drains the group table once, lowest priority first.
pub struct GroupsHandler {
    queue: BTreeMap<u32, Vec<FormulaId>>,
}

impl GroupsHandler {
    /// A handler over the full group table.
    pub fn new() -> Self {
        Self {
            queue: GROUPS
                .iter()
                .map(|(priority, members)| (*priority, members.to_vec()))
                .collect(),
        }
    }

    /// Whether another group remains.
    pub fn is_next_group(&self) -> bool {
        !self.queue.is_empty()
    }

    /// The next group, by ascending priority. Panics when drained; guard
    /// with [`Self::is_next_group`].
    pub fn next_group(&mut self) -> Vec<FormulaId> {
        self.queue
            .pop_first()
            .expect("no groups left to drain")
            .1
    }
}

impl Default for GroupsHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_groups_cover_catalogue_exactly_once() {
        let mut seen = BTreeSet::new();
        for (_, members) in GROUPS {
            for id in *members {
                assert!(seen.insert(*id), "{id} appears in more than one group");
            }
        }
        assert_eq!(seen.len(), FormulaId::ALL.len());
    }

    #[test]
    fn test_handler_drains_in_priority_order() {
        let mut handler = GroupsHandler::new();
        let mut priorities = vec![];
        while handler.is_next_group() {
            let group = handler.next_group();
            assert!(!group.is_empty());
            priorities.push(group);
        }
        assert_eq!(priorities.len(), GROUPS.len());
        assert_eq!(priorities[0], vec![UniqueId, LeftRightBoundaryAssignment]);
        assert!(!handler.is_next_group());
    }
}
