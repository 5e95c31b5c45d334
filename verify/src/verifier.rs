// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Instantiating formulas over a network and collecting counterexamples.
//!
//! In partitioned mode every formula type gets its own partition; blocks run
//! on scoped worker threads in waves of at most `num_threads`, each worker
//! building its own mapping from an immutable sub-network, so verification
//! shares no mutable state. Workers report their result lists over a
//! channel; the only synchronization is the join barrier between waves.

use crate::catalogue::{Catalogue, ElementType, FormulaId};
use crate::config::VerificationConfig;
use crate::error::VerifyError;
use itertools::Itertools;
use roadnet::mapping::Mapping;
use roadnet::model::RoadNetwork;
use roadnet::partition::{self, LaneletStrategy, Partition};
use rol::semantics::{Assignment, Context, DomainProduct, ElementId};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

/// The element ids of one failing combination: the formula's free-variable
/// values in declaration order.
pub type Location = Vec<ElementId>;

/// All failing combinations of a run, keyed by formula. Location lists are
/// sorted and deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct InvalidStates(pub BTreeMap<FormulaId, Vec<Location>>);

impl InvalidStates {
    /// Whether no formula failed.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|locs| locs.is_empty())
    }

    /// The total number of invalid locations.
    pub fn len(&self) -> usize {
        self.0.values().map(|locs| locs.len()).sum()
    }

    /// Record a failing location.
    pub fn insert(&mut self, formula: FormulaId, location: Location) {
        self.0.entry(formula).or_default().push(location);
    }

    /// Merge another result set into this one.
    pub fn extend(&mut self, other: InvalidStates) {
        for (formula, locs) in other.0 {
            self.0.entry(formula).or_default().extend(locs);
        }
        self.normalize();
    }

    /// The locations recorded for a formula.
    pub fn get(&self, formula: FormulaId) -> &[Location] {
        self.0.get(&formula).map_or(&[], |locs| locs.as_slice())
    }

    /// All `(formula, location)` pairs in deterministic order.
    pub fn flatten(&self) -> Vec<(FormulaId, Location)> {
        self.0
            .iter()
            .flat_map(|(&f, locs)| locs.iter().map(move |loc| (f, loc.clone())))
            .collect()
    }

    /// Sort and deduplicate every location list, and drop empty entries.
    pub fn normalize(&mut self) {
        for locs in self.0.values_mut() {
            locs.sort_unstable();
            locs.dedup();
        }
        self.0.retain(|_, locs| !locs.is_empty());
    }
}

/// Evaluates formulas over a network according to a configuration.
pub struct Verifier<'a> {
    catalogue: &'a Catalogue,
    config: &'a VerificationConfig,
}

impl<'a> Verifier<'a> {
    /// A verifier borrowing the catalogue and configuration.
    pub fn new(catalogue: &'a Catalogue, config: &'a VerificationConfig) -> Self {
        Self { catalogue, config }
    }

    /// Verify the given formulas, partitioned or not per the configuration.
    pub fn verify(
        &self,
        net: &RoadNetwork,
        ids: &[FormulaId],
    ) -> Result<InvalidStates, VerifyError> {
        if self.config.partitioned {
            self.verify_partitioned(net, ids)
        } else {
            self.verify_local(net, ids)
        }
    }

    /// Verify against a single mapping of the whole (sub-)network. Used
    /// directly for the bounded re-verification after a repair, which is
    /// always local.
    pub fn verify_local(
        &self,
        net: &RoadNetwork,
        ids: &[FormulaId],
    ) -> Result<InvalidStates, VerifyError> {
        let mapping = Mapping::new(net, &self.config.tolerances);
        self.verify_with_context(mapping.context(), ids)
    }

    fn verify_with_context(
        &self,
        ctx: &Context,
        ids: &[FormulaId],
    ) -> Result<InvalidStates, VerifyError> {
        let mut invalid = InvalidStates::default();
        for &id in ids {
            let formula = self.catalogue.formula(id);
            // binding happens once per formula; an unresolved name is a
            // configuration error, not an evaluation failure
            ctx.check_formula(formula)
                .map_err(|source| VerifyError::UnboundName {
                    formula: id,
                    source,
                })?;
            log::debug!("checking {}", formula.name);
            let names = formula.free_names();
            for assignment in DomainProduct::new(ctx, &formula.free, &Assignment::new()) {
                if !ctx.eval_bool(&formula.body, &assignment) {
                    let location = names.iter().map(|n| assignment[*n].as_entity()).collect();
                    invalid.insert(id, location);
                }
            }
        }
        invalid.normalize();
        Ok(invalid)
    }

    fn verify_partitioned(
        &self,
        net: &RoadNetwork,
        ids: &[FormulaId],
    ) -> Result<InvalidStates, VerifyError> {
        let by_type: BTreeMap<ElementType, Vec<FormulaId>> = ids
            .iter()
            .map(|&id| (id.element_type(), id))
            .into_group_map()
            .into_iter()
            .collect();

        let mut all = InvalidStates::default();
        for (element_type, type_ids) in by_type {
            let partition = self.partition_for(net, element_type);
            if partition.blocks.len() <= 1 {
                all.extend(self.verify_local(net, &type_ids)?);
                continue;
            }
            log::info!(
                "verifying {} {element_type:?} formulas over {} blocks",
                type_ids.len(),
                partition.blocks.len()
            );
            all.extend(self.verify_blocks(net, &partition, &type_ids)?);
        }
        all.normalize();
        Ok(all)
    }

    /// Run the blocks of one partition in waves of at most `num_threads`
    /// scoped workers. Each worker owns its restricted sub-network and
    /// mapping; results come back over a channel.
    fn verify_blocks(
        &self,
        net: &RoadNetwork,
        partition: &Partition,
        ids: &[FormulaId],
    ) -> Result<InvalidStates, VerifyError> {
        let mut all = InvalidStates::default();
        let wave_size = self.config.num_threads.max(1);
        for wave in partition.blocks.chunks(wave_size) {
            let (tx, rx) = mpsc::channel();
            thread::scope(|s| {
                for block in wave {
                    let tx = tx.clone();
                    s.spawn(move || {
                        let sub = block.restrict(net);
                        let result = self.verify_local(&sub, ids);
                        // the receiver outlives the scope, so send cannot fail
                        tx.send(result).expect("result channel closed");
                    });
                }
            });
            drop(tx);
            for result in rx {
                all.extend(result?);
            }
        }
        Ok(all)
    }

    fn partition_for(&self, net: &RoadNetwork, element_type: ElementType) -> Partition {
        let cfg = self.config;
        match element_type {
            ElementType::Lanelet => partition::lanelet_blocks(
                net,
                cfg.lanelet_chunk_size,
                LaneletStrategy::Strips,
                cfg.buffered.then_some(cfg.buffer),
            )
            .unwrap_or_else(|e| {
                log::warn!("lanelet partitioning unavailable ({e}); verifying unpartitioned");
                partition::one_block(net)
            }),
            ElementType::TrafficSign => partition::sign_blocks(net, cfg.sign_chunk_size),
            ElementType::TrafficLight => partition::light_blocks(net, cfg.light_chunk_size),
            ElementType::Intersection => {
                partition::intersection_blocks(net, cfg.intersection_chunk_size, cfg.buffer)
            }
            // the union domain cannot be split soundly
            ElementType::General | ElementType::Area => partition::one_block(net),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;
    use crate::catalogue::FormulaId::*;
    use roadnet::model::{Adjacency, Lanelet, RoadNetwork, TrafficSign};
    use rol::semantics::Vertex;

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    fn straight_lanelet(id: ElementId, x: f64, y: f64) -> Lanelet {
        Lanelet::new(
            id,
            vec![v(x, y + 1.0), v(x + 10.0, y + 1.0)],
            vec![v(x, y), v(x + 10.0, y)],
        )
    }

    fn catalogue() -> Catalogue {
        Catalogue::new().expect("catalogue should build")
    }

    #[test]
    fn test_clean_network_has_no_invalid_states() {
        let mut net = RoadNetwork::new("clean");
        let mut l1 = straight_lanelet(1, 0.0, 0.0);
        let mut l2 = straight_lanelet(2, 10.0, 0.0);
        l1.successors = vec![2];
        l2.predecessors = vec![1];
        net.add_lanelet(l1);
        net.add_lanelet(l2);

        let catalogue = catalogue();
        let config = VerificationConfig::default();
        let verifier = Verifier::new(&catalogue, &config);
        let invalid = verifier.verify(&net, FormulaId::ALL).unwrap();
        assert!(invalid.is_empty(), "unexpected invalid states: {invalid:?}");
    }

    #[test]
    fn test_dangling_adjacency_is_reported() {
        let mut net = RoadNetwork::new("dangling");
        let mut l1 = straight_lanelet(1, 0.0, 0.0);
        l1.adj_left = Some(Adjacency {
            lanelet: 42,
            same_direction: true,
        });
        net.add_lanelet(l1);

        let catalogue = catalogue();
        let config = VerificationConfig::default();
        let verifier = Verifier::new(&catalogue, &config);
        let invalid = verifier.verify(&net, &[ExistenceLeftAdj]).unwrap();
        assert_eq!(invalid.get(ExistenceLeftAdj), &[vec![1]]);
    }

    #[test]
    fn test_unreferenced_sign_is_reported() {
        let mut net = RoadNetwork::new("signs");
        net.add_lanelet(straight_lanelet(1, 0.0, 0.0));
        net.add_traffic_sign(TrafficSign {
            id: 10,
            position: Some(v(0.0, 0.0)),
            elements: vec!["206".to_string()],
        });

        let catalogue = catalogue();
        let config = VerificationConfig::default();
        let verifier = Verifier::new(&catalogue, &config);
        let invalid = verifier.verify(&net, &[ReferencedTrafficSign]).unwrap();
        assert_eq!(invalid.get(ReferencedTrafficSign), &[vec![10]]);

        // referencing the sign fixes it
        net.lanelets.get_mut(&1).unwrap().traffic_signs.insert(10);
        let invalid = verifier.verify(&net, &[ReferencedTrafficSign]).unwrap();
        assert!(invalid.is_empty());
    }

    #[test]
    fn test_verification_is_deterministic() {
        let mut net = RoadNetwork::new("determinism");
        for i in 0..6u64 {
            let mut l = straight_lanelet(i + 1, i as f64 * 10.0, 0.0);
            l.adj_left = Some(Adjacency {
                lanelet: 100 + i,
                same_direction: true,
            });
            net.add_lanelet(l);
        }
        let catalogue = catalogue();
        let config = VerificationConfig::default();
        let verifier = Verifier::new(&catalogue, &config);
        let first = verifier.verify(&net, FormulaId::ALL).unwrap();
        let second = verifier.verify(&net, FormulaId::ALL).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.get(ExistenceLeftAdj),
            (1..=6u64).map(|i| vec![i]).collect::<Vec<_>>().as_slice()
        );
    }

    #[test]
    fn test_partitioned_matches_unpartitioned_for_block_local_relations() {
        // a strips-partitionable corridor with one dangling successor
        let mut net = RoadNetwork::new("partitioned");
        for i in 0..8u64 {
            let mut right = straight_lanelet(1 + i, i as f64 * 10.0, 0.0);
            let mut left = straight_lanelet(11 + i, i as f64 * 10.0, 1.0);
            right.adj_left = Some(Adjacency {
                lanelet: 11 + i,
                same_direction: true,
            });
            left.adj_right = Some(Adjacency {
                lanelet: 1 + i,
                same_direction: true,
            });
            if i > 0 {
                right.predecessors = vec![i];
                left.predecessors = vec![10 + i];
            }
            if i < 7 {
                right.successors = vec![2 + i];
                left.successors = vec![12 + i];
            }
            net.add_lanelet(right);
            net.add_lanelet(left);
        }
        net.lanelets.get_mut(&8).unwrap().adj_right = Some(Adjacency {
            lanelet: 999,
            same_direction: true,
        });

        let catalogue = catalogue();
        let sequential = VerificationConfig::default();
        let partitioned = VerificationConfig {
            partitioned: true,
            num_threads: 4,
            lanelet_chunk_size: 4,
            buffer: 5.0,
            ..VerificationConfig::default()
        };
        let ids = [ExistenceLeftAdj, ExistenceRightAdj, NoSelfLeftAdj];
        let a = Verifier::new(&catalogue, &sequential).verify(&net, &ids).unwrap();
        let b = Verifier::new(&catalogue, &partitioned).verify(&net, &ids).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(ExistenceRightAdj), &[vec![8]]);
    }
}
