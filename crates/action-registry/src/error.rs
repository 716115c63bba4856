// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Registry build failures reported with the offending action or number.
// Author: Lukas Bower

use std::io;
use std::path::PathBuf;

/// Fatal registry build failure. Any of these aborts code generation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two actions share a name.
    #[error("duplicate action name {name} (topics {first_topic} and {second_topic})")]
    DuplicateName {
        name: String,
        first_topic: String,
        second_topic: String,
    },
    /// An action or parameter name is not a lowercase identifier.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    /// Two parameters or optional arguments of one action share a name.
    #[error("action {action}: parameter name {param} is used twice")]
    DuplicateParam { action: String, param: String },
    /// An action declares more optional arguments than the bitmask can carry.
    #[error("action {action}: {count} optional arguments exceeds the limit of {limit}")]
    TooManyOptargs {
        action: String,
        count: usize,
        limit: usize,
    },
    /// A parameter kind is not allowed in this position.
    #[error("action {action}: parameter {param}: {reason}")]
    InvalidParam {
        action: String,
        param: String,
        reason: &'static str,
    },
    /// Action flags contradict each other or the parameter list.
    #[error("action {action}: {reason}")]
    InvalidAttribute { action: String, reason: &'static str },
    /// A procedure number was written into the action list by hand.
    #[error("action {action}: proc_nr {proc_nr} must not be set in the action list; add it to the number table instead")]
    PreassignedProcNr { action: String, proc_nr: u32 },
    /// A daemon action has no entry in the number table.
    #[error("daemon action {action} has no entry in the procedure number table")]
    MissingProcNr { action: String },
    /// Two table entries use the same number.
    #[error("procedure number {proc_nr} is assigned to both {first} and {second}")]
    DuplicateProcNr {
        proc_nr: u32,
        first: String,
        second: String,
    },
    /// Procedure number zero is reserved for replies to undecodable calls.
    #[error("procedure number table entry {name} uses reserved number 0")]
    ReservedProcNr { name: String },
    /// A retired number is assigned to an active entry again.
    #[error("procedure number {proc_nr} was retired with {retired} and cannot be reused by {active}")]
    ReusedProcNr {
        proc_nr: u32,
        retired: String,
        active: String,
    },
    /// A table entry names no registered action.
    #[error("procedure number table entry {name} = {proc_nr} has no matching daemon action")]
    StaleProcEntry { name: String, proc_nr: u32 },
    /// A table entry names a registered action that does not run in the daemon.
    #[error("procedure number table entry {name} = {proc_nr} names a non-daemon action")]
    NotADaemonAction { name: String, proc_nr: u32 },
    /// `deprecated_by` names no registered action.
    #[error("action {action} is deprecated by unknown action {target}")]
    DanglingDeprecation { action: String, target: String },
    /// `deprecated_by` names the action itself.
    #[error("action {action} cannot be deprecated by itself")]
    SelfDeprecation { action: String },
    /// A derived identifier clashes with another action's identifiers.
    #[error("action {action}: derived name {derived} collides with action {other}")]
    DerivationCollision {
        action: String,
        derived: String,
        other: String,
    },
    /// A struct tag names no struct definition.
    #[error("action {action} returns unknown struct {tag}")]
    UnknownStruct { action: String, tag: String },
    /// Two struct definitions share a name, or a struct repeats a field name.
    #[error("struct {name}: {reason}")]
    InvalidStruct { name: String, reason: String },
    /// A test step cannot be resolved against the registry.
    #[error("action {action}: test {test} step '{step}': {reason}")]
    InvalidTestStep {
        action: String,
        test: usize,
        step: String,
        reason: String,
    },
    /// A registry source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A registry source file is not valid TOML for its schema.
    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
