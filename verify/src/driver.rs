// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The verify → repair → re-verify control loop.
//!
//! Groups run in priority order. Every invalid location found by a group's
//! verification is repaired and locally re-verified over a sub-map around
//! the location, bounded by `max_iterations`; a location that does not
//! converge aborts the whole run. Repair runs strictly sequentially, after
//! verification of a group has completed, because it mutates the one shared
//! network.

use crate::catalogue::{Catalogue, FormulaId};
use crate::config::VerificationConfig;
use crate::error::DriverError;
use crate::groups::GroupsHandler;
use crate::repair::Repairer;
use crate::verifier::{InvalidStates, Verifier};
use roadnet::model::RoadNetwork;
use roadnet::submap;
use serde::Serialize;
use std::time::Instant;

/// The outcome of one verification/repair run.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    /// The benchmark id of the verified map
    pub benchmark_id: String,
    /// Wall-clock runtime in seconds
    pub runtime_secs: f64,
    /// The invalid states found before any repair
    pub initial: InvalidStates,
    /// Locations still invalid after the run; empty unless repair is
    /// disabled, since an unrepairable location aborts with an error
    pub remaining: InvalidStates,
}

/// Runs the verification groups and drives repair.
pub struct Driver<'a> {
    catalogue: &'a Catalogue,
    config: &'a VerificationConfig,
}

impl<'a> Driver<'a> {
    /// A driver borrowing the catalogue and configuration.
    pub fn new(catalogue: &'a Catalogue, config: &'a VerificationConfig) -> Self {
        Self { catalogue, config }
    }

    /// Verify only: run all requested groups without repairing anything.
    pub fn verify(&self, net: &RoadNetwork) -> Result<VerificationResult, DriverError> {
        let start = Instant::now();
        let verifier = Verifier::new(self.catalogue, self.config);
        let requested = self.config.requested();
        let mut initial = InvalidStates::default();
        let mut groups = GroupsHandler::new();
        while groups.is_next_group() {
            let batch: Vec<FormulaId> = groups
                .next_group()
                .into_iter()
                .filter(|f| requested.contains(f))
                .collect();
            if batch.is_empty() {
                continue;
            }
            initial.extend(verifier.verify(net, &batch)?);
        }
        Ok(VerificationResult {
            benchmark_id: net.benchmark_id.clone(),
            runtime_secs: start.elapsed().as_secs_f64(),
            remaining: initial.clone(),
            initial,
        })
    }

    /// Verify and repair the network in place.
    pub fn verify_and_repair(
        &self,
        net: &mut RoadNetwork,
    ) -> Result<VerificationResult, DriverError> {
        let start = Instant::now();
        let verifier = Verifier::new(self.catalogue, self.config);
        let repairer = Repairer::new(self.config);
        let requested = self.config.requested();
        let mut initial = InvalidStates::default();
        let mut remaining = InvalidStates::default();

        let mut groups = GroupsHandler::new();
        while groups.is_next_group() {
            let batch: Vec<FormulaId> = groups
                .next_group()
                .into_iter()
                .filter(|f| requested.contains(f))
                .collect();
            if batch.is_empty() {
                continue;
            }
            let invalid = verifier.verify(net, &batch)?;
            for (formula, location) in invalid.flatten() {
                log::info!("{}: {formula} invalid at {location:?}", net.benchmark_id);
                let mut errors = vec![(formula, location)];
                let mut iteration = 0;
                while !errors.is_empty() && iteration < self.config.max_iterations {
                    let (formula, location) = errors.pop().unwrap();
                    repairer.repair_one(net, formula, &location);
                    // re-verification is local: a one-hop-plus-buffer
                    // neighborhood bounds the cost independent of map size
                    let sub = submap::extract(net, &location, self.config.buffer);
                    let recheck = verifier.verify_local(&sub, &[formula])?;
                    if recheck.get(formula).contains(&location) {
                        errors.push((formula, location));
                    }
                    iteration += 1;
                }
                if let Some((formula, location)) = errors.pop() {
                    return Err(DriverError::RepairExhausted {
                        map_id: net.benchmark_id.clone(),
                        formula,
                        location,
                        iterations: self.config.max_iterations,
                    });
                }
            }
            initial.extend(invalid);
        }

        remaining.normalize();
        Ok(VerificationResult {
            benchmark_id: net.benchmark_id.clone(),
            runtime_secs: start.elapsed().as_secs_f64(),
            initial,
            remaining,
        })
    }

    /// Verify and repair a copy, leaving the input untouched. This is the
    /// `overwrite = false` entry point.
    pub fn verify_and_repair_copied(
        &self,
        net: &RoadNetwork,
    ) -> Result<(RoadNetwork, VerificationResult), DriverError> {
        let mut copy = net.clone();
        let result = self.verify_and_repair(&mut copy)?;
        Ok((copy, result))
    }
}
