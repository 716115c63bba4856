// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Action registry, type model, validator and projections for the appliance RPC compiler.
// Author: Lukas Bower
#![forbid(unsafe_code)]

//! Single source of truth for the appliance RPC protocol.
//!
//! Raw per-topic action lists are merged, validated and frozen by
//! [`build_registry`]. Every downstream stage (wire layouts, the dispatch
//! table and the binding backends) reads the frozen [`Registry`] and never
//! mutates it.

pub mod action;
pub mod derive;
pub mod error;
pub mod load;
pub mod proc_table;
pub mod projection;
pub mod registry;
pub mod testcase;
pub mod types;
mod validate;

pub use action::{Action, DerivedNames, RawAction};
pub use derive::Naming;
pub use error::RegistryError;
pub use load::{load_config, load_source, RegistryConfig};
pub use proc_table::ProcTable;
pub use projection::{is_documented, is_external, is_interactive, is_tested, Projection};
pub use registry::{build_registry, Registry, RegistrySource, Topic};
pub use testcase::{Fixture, Guard, Invocation, Outcome, Predicate, TestCase};
pub use types::{
    ActionKind, FieldKind, OptParam, OptParamType, Param, ParamType, ReturnShape,
    StreamDirection, StructDef, StructField, Visibility, MAX_OPTARGS,
};
