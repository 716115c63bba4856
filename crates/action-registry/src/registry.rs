// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Assemble, validate and freeze the action registry with its lookup indices.
// Author: Lukas Bower

use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::action::Action;
use crate::derive::{derive_names, Naming};
use crate::error::RegistryError;
use crate::proc_table::ProcTable;
use crate::types::{StructDef, Visibility};
use crate::validate;

/// One authored action list, in file order.
#[derive(Debug, Clone, Default)]
pub struct Topic {
    pub name: String,
    pub actions: Vec<crate::action::RawAction>,
}

/// Everything the registry is built from.
#[derive(Debug, Clone, Default)]
pub struct RegistrySource {
    pub naming: Naming,
    pub topics: Vec<Topic>,
    pub structs: Vec<StructDef>,
    pub proc_table: ProcTable,
}

/// Frozen, validated registry. Actions are ordered by name.
#[derive(Debug, Serialize)]
pub struct Registry {
    naming: Naming,
    actions: Vec<Action>,
    structs: Vec<StructDef>,
    #[serde(skip)]
    by_name: BTreeMap<String, usize>,
    #[serde(skip)]
    callable: BTreeMap<String, usize>,
    #[serde(skip)]
    by_proc_nr: BTreeMap<u32, usize>,
    #[serde(skip)]
    by_visibility: BTreeMap<Visibility, Vec<usize>>,
    #[serde(skip)]
    cancellable: Vec<usize>,
    #[serde(skip)]
    with_progress: Vec<usize>,
}

/// Build the registry from its sources. Either every pass succeeds or
/// nothing is produced.
pub fn build_registry(source: RegistrySource) -> Result<Registry, RegistryError> {
    let RegistrySource {
        naming,
        topics,
        mut structs,
        proc_table,
    } = source;

    validate::check_identifier(&naming.prefix)?;
    validate::check_structs(&structs)?;
    structs.sort_by(|a, b| a.name.cmp(&b.name));
    let struct_names: BTreeSet<&str> = structs.iter().map(|def| def.name.as_str()).collect();

    validate::check_unique_names(&topics)?;
    proc_table.check_numbers()?;

    let mut actions = Vec::new();
    for topic in topics {
        debug!(
            "[registry] topic {} contributes {} actions",
            topic.name,
            topic.actions.len()
        );
        for raw in topic.actions {
            validate::check_action_shape(&raw, &struct_names)?;
            // Passes 1 and 2.
            let derived = derive_names(&raw, &naming);
            // Pass 3.
            validate::reject_preassigned(&raw)?;
            actions.push(Action::from_raw(raw, &topic.name, derived));
        }
    }
    actions.sort_by(|a, b| a.name.cmp(&b.name));

    // Pass 4.
    validate::assign_numbers(&mut actions, &proc_table)?;

    let by_name: BTreeMap<String, usize> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| (action.name.clone(), index))
        .collect();

    // Pass 5.
    validate::check_completeness(&actions, &by_name, &proc_table)?;

    validate::check_collisions(&actions)?;
    validate::check_type_names(&actions, &structs)?;
    validate::check_deprecations(&actions, &by_name)?;

    let mut callable = BTreeMap::new();
    for (index, action) in actions.iter().enumerate() {
        callable.insert(action.name.clone(), index);
        for name in action.callable_names() {
            callable.insert(name.to_owned(), index);
        }
    }
    validate::check_tests(&actions, &callable)?;

    let mut by_proc_nr = BTreeMap::new();
    let mut by_visibility: BTreeMap<Visibility, Vec<usize>> = BTreeMap::new();
    let mut cancellable = Vec::new();
    let mut with_progress = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        if let Some(proc_nr) = action.proc_nr {
            by_proc_nr.insert(proc_nr, index);
        }
        by_visibility
            .entry(action.visibility)
            .or_default()
            .push(index);
        if action.cancellable {
            cancellable.push(index);
        }
        if action.has_progress {
            with_progress.push(index);
        }
    }

    info!(
        "[registry] frozen {} actions ({} daemon, max proc_nr {})",
        actions.len(),
        by_proc_nr.len(),
        by_proc_nr.keys().next_back().copied().unwrap_or(0)
    );

    Ok(Registry {
        naming,
        actions,
        structs,
        by_name,
        callable,
        by_proc_nr,
        by_visibility,
        cancellable,
        with_progress,
    })
}

impl Registry {
    /// Freeze for sharing with every emitter.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.naming.prefix
    }

    /// All actions, ordered by name.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    #[must_use]
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|def| def.name == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.by_name.get(name).map(|&index| &self.actions[index])
    }

    /// Look up by action name, public native name or compatibility alias.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Action> {
        self.callable.get(name).map(|&index| &self.actions[index])
    }

    #[must_use]
    pub fn by_proc_nr(&self, proc_nr: u32) -> Option<&Action> {
        self.by_proc_nr.get(&proc_nr).map(|&index| &self.actions[index])
    }

    /// Daemon actions in ascending `proc_nr` order.
    pub fn daemon_actions(&self) -> impl Iterator<Item = &Action> {
        self.by_proc_nr.values().map(move |&index| &self.actions[index])
    }

    pub fn with_visibility(&self, visibility: Visibility) -> impl Iterator<Item = &Action> {
        self.by_visibility
            .get(&visibility)
            .into_iter()
            .flatten()
            .map(move |&index| &self.actions[index])
    }

    pub fn cancellable(&self) -> impl Iterator<Item = &Action> {
        self.cancellable.iter().map(move |&index| &self.actions[index])
    }

    pub fn with_progress(&self) -> impl Iterator<Item = &Action> {
        self.with_progress
            .iter()
            .map(move |&index| &self.actions[index])
    }

    /// Highest assigned procedure number; the ABI version surrogate.
    #[must_use]
    pub fn max_proc_nr(&self) -> u32 {
        self.by_proc_nr.keys().next_back().copied().unwrap_or(0)
    }
}
