// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Verification configuration, passed in as a value and threaded through
//! the verifier, repairer and driver. There is no process-wide state.

use crate::catalogue::FormulaId;
use roadnet::mapping::Tolerances;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for one verification/repair run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// The formulas to verify; `None` means the whole catalogue
    #[serde(default)]
    pub selected: Option<BTreeSet<FormulaId>>,
    /// Formulas excluded from verification
    #[serde(default)]
    pub excluded: BTreeSet<FormulaId>,
    /// Bound on repair/re-verify iterations per location
    pub max_iterations: usize,
    /// Maximum number of concurrently verified partition blocks
    pub num_threads: usize,
    /// Whether to partition large maps for verification
    pub partitioned: bool,
    /// Target lanelets per partition block
    pub lanelet_chunk_size: usize,
    /// Target signs per partition block
    pub sign_chunk_size: usize,
    /// Target lights per partition block
    pub light_chunk_size: usize,
    /// Target intersections per partition block
    pub intersection_chunk_size: usize,
    /// Whether blocks are augmented with footprint neighbors
    pub buffered: bool,
    /// Buffer distance in meters, used for footprint augmentation, the
    /// intersection partition radius, and sub-map extraction
    pub buffer: f64,
    /// Numeric tolerances for the geometric predicates
    pub tolerances: Tolerances,
    /// Whether to mutate the input network in place or work on a copy
    pub overwrite: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            selected: None,
            excluded: BTreeSet::new(),
            max_iterations: 10,
            num_threads: 1,
            partitioned: false,
            lanelet_chunk_size: 500,
            sign_chunk_size: 200,
            light_chunk_size: 200,
            intersection_chunk_size: 50,
            buffered: true,
            buffer: 50.0,
            tolerances: Tolerances::default(),
            overwrite: true,
        }
    }
}

impl VerificationConfig {
    /// The formulas this run verifies: the selection (or whole catalogue)
    /// minus the exclusions.
    pub fn requested(&self) -> BTreeSet<FormulaId> {
        let base: BTreeSet<FormulaId> = match &self.selected {
            Some(sel) => sel.clone(),
            None => FormulaId::ALL.iter().copied().collect(),
        };
        base.difference(&self.excluded).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::FormulaId::*;

    #[test]
    fn test_requested() {
        let config = VerificationConfig::default();
        assert_eq!(config.requested().len(), FormulaId::ALL.len());

        let config = VerificationConfig {
            selected: Some([ExistenceLeftAdj, UniqueId].into_iter().collect()),
            excluded: [UniqueId].into_iter().collect(),
            ..VerificationConfig::default()
        };
        assert_eq!(
            config.requested().into_iter().collect::<Vec<_>>(),
            vec![ExistenceLeftAdj]
        );
    }
}
