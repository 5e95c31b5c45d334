// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The road-network data model and its binding to the rol logic.
//!
//! This crate owns the entity arena ([`model::RoadNetwork`]), the geometry
//! kernel used by the structural predicates, the [`mapping::Mapping`] that
//! turns one network into an evaluation context, the [`partition`] strategies
//! for bounded-cost verification, and [`submap`] extraction for local
//! re-verification around a repair target.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod geometry;
pub mod hashmap;
pub mod mapping;
pub mod model;
pub mod partition;
pub mod submap;
