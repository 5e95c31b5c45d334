// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Error types for catalogue construction, verification and repair.

use crate::catalogue::FormulaId;
use rol::semantics::{ElementId, UnboundName};
use thiserror::Error;

/// A built-in formula failed to parse. Fatal at catalogue build time; the
/// catalogue is a fixed artifact, so this is a defect, not an input error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("formula `{id}` failed to parse: {detail}")]
pub struct CatalogueError {
    /// The string id of the offending formula
    pub id: &'static str,
    /// The parser's message
    pub detail: String,
}

/// Verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// A formula mentions a predicate, function or domain name with no
    /// registered implementation. Raised when the formula is bound to the
    /// context, before any combination is evaluated.
    #[error("formula `{formula}`: {source}")]
    UnboundName {
        /// The formula being bound
        formula: FormulaId,
        /// The unresolved name
        source: UnboundName,
    },
}

/// Failures of the verify → repair → re-verify loop.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Verification failed.
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// A location could not be repaired within the configured iteration
    /// bound. Fatal: an invalid state must never be silently dropped.
    #[error(
        "map `{map_id}`: `{formula}` still invalid at {location:?} after {iterations} repair iterations"
    )]
    RepairExhausted {
        /// The map being repaired
        map_id: String,
        /// The formula that keeps failing
        formula: FormulaId,
        /// The element ids of the failing combination
        location: Vec<ElementId>,
        /// The configured iteration bound
        iterations: usize,
    },
}
