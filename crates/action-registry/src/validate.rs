// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Whole-registry validation passes; the first failure aborts the build.
// Author: Lukas Bower

use std::collections::{BTreeMap, BTreeSet};

use crate::action::{Action, RawAction};
use crate::derive::display_name;
use crate::error::RegistryError;
use crate::proc_table::ProcTable;
use crate::testcase::Invocation;
use crate::types::{ParamType, StreamDirection, StructDef, MAX_OPTARGS};
use crate::Topic;

pub(crate) fn check_identifier(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason| {
        Err(RegistryError::InvalidName {
            name: name.to_owned(),
            reason,
        })
    };
    let Some(first) = name.chars().next() else {
        return invalid("name must not be empty");
    };
    if !first.is_ascii_lowercase() {
        return invalid("name must start with a lowercase letter");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return invalid("name may only contain lowercase letters, digits and '_'");
    }
    if name.ends_with('_') || name.contains("__") {
        return invalid("name must not end with '_' or contain '__'");
    }
    Ok(())
}

pub(crate) fn check_unique_names(topics: &[Topic]) -> Result<(), RegistryError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for topic in topics {
        for raw in &topic.actions {
            if let Some(first_topic) = seen.insert(raw.name.as_str(), topic.name.as_str()) {
                return Err(RegistryError::DuplicateName {
                    name: raw.name.clone(),
                    first_topic: first_topic.to_owned(),
                    second_topic: topic.name.clone(),
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn check_structs(structs: &[StructDef]) -> Result<(), RegistryError> {
    let mut names = BTreeSet::new();
    for def in structs {
        check_identifier(&def.name)?;
        if !names.insert(def.name.as_str()) {
            return Err(RegistryError::InvalidStruct {
                name: def.name.clone(),
                reason: "defined more than once".to_owned(),
            });
        }
        if def.fields.is_empty() {
            return Err(RegistryError::InvalidStruct {
                name: def.name.clone(),
                reason: "struct has no fields".to_owned(),
            });
        }
        let mut fields = BTreeSet::new();
        for field in &def.fields {
            check_identifier(&field.name)?;
            if !fields.insert(field.name.as_str()) {
                return Err(RegistryError::InvalidStruct {
                    name: def.name.clone(),
                    reason: format!("field {} is declared twice", field.name),
                });
            }
        }
    }
    Ok(())
}

/// Per-action structural checks that need no other action.
pub(crate) fn check_action_shape(
    raw: &RawAction,
    structs: &BTreeSet<&str>,
) -> Result<(), RegistryError> {
    check_identifier(&raw.name)?;
    let attribute = |reason| {
        Err(RegistryError::InvalidAttribute {
            action: raw.name.clone(),
            reason,
        })
    };

    if raw.optargs.len() > MAX_OPTARGS {
        return Err(RegistryError::TooManyOptargs {
            action: raw.name.clone(),
            count: raw.optargs.len(),
            limit: MAX_OPTARGS,
        });
    }

    let mut names = BTreeSet::new();
    let all_names = raw
        .params
        .iter()
        .map(|p| p.name.as_str())
        .chain(raw.optargs.iter().map(|o| o.name.as_str()));
    for name in all_names {
        check_identifier(name)?;
        if !names.insert(name) {
            return Err(RegistryError::DuplicateParam {
                action: raw.name.clone(),
                param: name.to_owned(),
            });
        }
    }

    let daemon = matches!(raw.kind, crate::types::ActionKind::Daemon);
    let mut uploads = 0usize;
    let mut downloads = 0usize;
    for param in &raw.params {
        let invalid = |reason| {
            Err(RegistryError::InvalidParam {
                action: raw.name.clone(),
                param: param.name.clone(),
                reason,
            })
        };
        match &param.kind {
            ParamType::StreamIn | ParamType::StreamOut if !daemon => {
                return invalid("streaming parameters are only allowed on daemon actions");
            }
            ParamType::OpaqueHandle(_) if daemon => {
                return invalid("opaque handles have no wire form and cannot reach the daemon");
            }
            ParamType::OpaqueHandle(tag) if tag.trim().is_empty() => {
                return invalid("opaque handle needs a type tag");
            }
            _ => {}
        }
        match param.kind.stream_direction() {
            Some(StreamDirection::Upload) => uploads += 1,
            Some(StreamDirection::Download) => downloads += 1,
            None => {}
        }
    }
    if uploads > 1 {
        return attribute("at most one upload stream is allowed");
    }
    if downloads > 1 {
        return attribute("at most one download stream is allowed");
    }
    if uploads > 0 && downloads > 0 {
        return attribute("an action cannot both upload and download a stream");
    }
    if raw.cancellable && uploads + downloads == 0 {
        return attribute("cancellable requires an upload or download stream");
    }
    if raw.legacy_no_optargs && raw.optargs.is_empty() {
        return attribute("legacy_no_optargs is set but the action has no optional arguments");
    }
    if let Some(tag) = raw.returns.struct_tag() {
        if !structs.contains(tag) {
            return Err(RegistryError::UnknownStruct {
                action: raw.name.clone(),
                tag: tag.to_owned(),
            });
        }
    }
    if raw.deprecated_by.as_deref() == Some(raw.name.as_str()) {
        return Err(RegistryError::SelfDeprecation {
            action: raw.name.clone(),
        });
    }
    for alias in &raw.shell_aliases {
        check_identifier(alias)?;
    }
    Ok(())
}

/// Pass 3: numbers are never authored inline.
pub(crate) fn reject_preassigned(raw: &RawAction) -> Result<(), RegistryError> {
    match raw.proc_nr {
        Some(proc_nr) => Err(RegistryError::PreassignedProcNr {
            action: raw.name.clone(),
            proc_nr,
        }),
        None => Ok(()),
    }
}

/// Pass 4: every daemon action takes its number from the table.
pub(crate) fn assign_numbers(actions: &mut [Action], table: &ProcTable) -> Result<(), RegistryError> {
    for action in actions.iter_mut().filter(|action| action.is_daemon()) {
        let proc_nr = table
            .lookup(&action.name)
            .ok_or_else(|| RegistryError::MissingProcNr {
                action: action.name.clone(),
            })?;
        action.proc_nr = Some(proc_nr);
    }
    Ok(())
}

/// Pass 5: every table entry resolves to exactly one daemon action.
pub(crate) fn check_completeness(
    actions: &[Action],
    by_name: &BTreeMap<String, usize>,
    table: &ProcTable,
) -> Result<(), RegistryError> {
    for (name, &proc_nr) in &table.procedures {
        match by_name.get(name).map(|&index| &actions[index]) {
            None => {
                return Err(RegistryError::StaleProcEntry {
                    name: name.clone(),
                    proc_nr,
                })
            }
            Some(action) if !action.is_daemon() => {
                return Err(RegistryError::NotADaemonAction {
                    name: name.clone(),
                    proc_nr,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Derived names, aliases and shell aliases must not shadow another action.
pub(crate) fn check_collisions(actions: &[Action]) -> Result<(), RegistryError> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for action in actions {
        owners.insert(action.name.as_str(), action.name.as_str());
    }
    for action in actions {
        let derived = std::iter::once(action.derived.native_name.as_str())
            .chain(action.derived.aliases.iter().map(String::as_str))
            .chain(action.shell_aliases.iter().map(String::as_str));
        for ident in derived {
            match owners.get(ident) {
                Some(owner) if *owner != action.name.as_str() => {
                    return Err(RegistryError::DerivationCollision {
                        action: action.name.clone(),
                        derived: ident.to_owned(),
                        other: (*owner).to_owned(),
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(ident, action.name.as_str());
                }
            }
        }
    }
    Ok(())
}

/// Generated CamelCase type names (procedure variants, optarg structs and
/// record types) must be unique within their namespace.
pub(crate) fn check_type_names(
    actions: &[Action],
    structs: &[StructDef],
) -> Result<(), RegistryError> {
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for action in actions {
        let mut names = vec![action.derived.display_name.clone()];
        if action.has_optargs() {
            names.push(format!("{}Optargs", action.derived.display_name));
        }
        for type_name in names {
            if let Some(owner) = owners.insert(type_name.clone(), action.name.as_str()) {
                return Err(RegistryError::DerivationCollision {
                    action: action.name.clone(),
                    derived: type_name,
                    other: owner.to_owned(),
                });
            }
        }
    }
    let mut struct_owners: BTreeMap<String, &str> = BTreeMap::new();
    for def in structs {
        let type_name = display_name(&def.name);
        if let Some(other) = struct_owners.insert(type_name.clone(), def.name.as_str()) {
            return Err(RegistryError::InvalidStruct {
                name: def.name.clone(),
                reason: format!("type name {type_name} is also derived from struct {other}"),
            });
        }
        if let Some(action) = owners.get(&type_name).filter(|_| type_name.ends_with("Optargs")) {
            return Err(RegistryError::InvalidStruct {
                name: def.name.clone(),
                reason: format!(
                    "type name {type_name} collides with the optional arguments of {action}"
                ),
            });
        }
    }
    Ok(())
}

/// `deprecated_by` is resolved against the complete name index.
pub(crate) fn check_deprecations(
    actions: &[Action],
    by_name: &BTreeMap<String, usize>,
) -> Result<(), RegistryError> {
    for action in actions {
        if let Some(target) = &action.deprecated_by {
            if !by_name.contains_key(target) {
                return Err(RegistryError::DanglingDeprecation {
                    action: action.name.clone(),
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Test steps must call registered actions with a valid argument list.
pub(crate) fn check_tests(
    actions: &[Action],
    callable: &BTreeMap<String, usize>,
) -> Result<(), RegistryError> {
    for action in actions {
        for (test_index, case) in action.tests.iter().enumerate() {
            if case.steps.is_empty() {
                return Err(RegistryError::InvalidTestStep {
                    action: action.name.clone(),
                    test: test_index,
                    step: String::new(),
                    reason: "test has no steps".to_owned(),
                });
            }
            for step in case.steps.iter().chain(case.cleanup.iter()) {
                check_invocation(step, actions, callable).map_err(|reason| {
                    RegistryError::InvalidTestStep {
                        action: action.name.clone(),
                        test: test_index,
                        step: step.to_string(),
                        reason,
                    }
                })?;
            }
        }
    }
    Ok(())
}

fn check_invocation(
    step: &Invocation,
    actions: &[Action],
    callable: &BTreeMap<String, usize>,
) -> Result<(), String> {
    let target = callable
        .get(&step.action)
        .map(|&index| &actions[index])
        .ok_or_else(|| format!("unknown action {}", step.action))?;
    let required = target.params.len();
    if step.args.len() < required {
        return Err(format!(
            "expected at least {required} arguments, got {}",
            step.args.len()
        ));
    }
    let (_, optional) = step.split_args(required);
    let mut seen = BTreeSet::new();
    for entry in optional {
        let Some((name, _value)) = entry.split_once(':') else {
            return Err(format!(
                "unexpected extra argument '{entry}' (optional arguments are written name:value)"
            ));
        };
        if target.optarg_bit(name).is_none() {
            return Err(format!("{} has no optional argument {name}", target.name));
        }
        if !seen.insert(name) {
            return Err(format!("optional argument {name} given twice"));
        }
    }
    Ok(())
}
