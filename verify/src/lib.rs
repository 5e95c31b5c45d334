// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Verify and repair the structural invariants of a road network.
//!
//! The [`catalogue`] holds the built-in formulas, the [`verifier`] evaluates
//! them over a network (optionally partitioned and parallel), the [`repair`]
//! module applies the per-formula corrective mutations, and the [`driver`]
//! runs the verify → repair → re-verify loop group by group.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod catalogue;
pub mod config;
pub mod driver;
pub mod error;
pub mod groups;
pub mod repair;
pub mod verifier;
