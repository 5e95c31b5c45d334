// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The rol (road-network logic) formula language.
//!
//! A small first-order language interpreted over the entities of a road
//! network: formulas quantify over named domains of element ids, and all
//! predicate and function symbols are resolved against a per-run
//! [`semantics::Context`] supplied by the caller.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod parser;
pub mod printer;
pub mod semantics;
pub mod syntax;
